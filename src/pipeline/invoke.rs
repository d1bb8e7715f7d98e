//! Conversion invoker: run soffice headlessly against one staged file.
//!
//! ## Command line
//!
//! The engine is executed directly with a structured argument list, never
//! through a shell, so object keys containing spaces, quotes or `$` reach it
//! verbatim:
//!
//! ```text
//! soffice.bin --headless --norestore --invisible --nodefault
//!             --nofirststartwizard --nolockcheck --nologo
//!             --convert-to pdf:writer_pdf_Export --outdir <dir> <input>
//! ```
//!
//! `HOME` is overridden because LibreOffice creates its user profile there,
//! and on Lambda only the scratch directory is writable.
//!
//! ## Failure policy
//!
//! A run either produces `<outdir>/<stem>.pdf` or fails with a
//! [`ConversionError`] carrying the exit code and stderr. Only transient
//! failures (see [`ConversionError::is_transient`]) are retried, a bounded
//! number of times; re-running a deterministic failure cannot succeed.

use crate::config::HandlerConfig;
use crate::error::ConversionError;
use crate::pipeline::naming::pdf_file_name;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const HEADLESS_FLAGS: [&str; 7] = [
    "--headless",
    "--norestore",
    "--invisible",
    "--nodefault",
    "--nofirststartwizard",
    "--nolockcheck",
    "--nologo",
];

/// Runs the conversion engine.
#[derive(Debug, Clone)]
pub struct ConversionInvoker {
    engine: PathBuf,
    home_dir: PathBuf,
    export_filter: String,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ConversionInvoker {
    pub fn from_config(config: &HandlerConfig) -> Self {
        Self {
            engine: config.engine_path(),
            home_dir: config.home_dir().to_path_buf(),
            export_filter: config.export_filter.clone(),
            timeout: config.conversion_timeout(),
            max_retries: config.max_conversion_retries,
            retry_backoff: config.retry_backoff(),
        }
    }

    pub fn engine(&self) -> &Path {
        &self.engine
    }

    /// Arguments passed to the engine for one conversion.
    pub fn command_args(&self, input: &Path, out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = HEADLESS_FLAGS.iter().map(OsString::from).collect();
        args.push("--convert-to".into());
        args.push(self.export_filter.as_str().into());
        args.push("--outdir".into());
        args.push(out_dir.as_os_str().to_owned());
        args.push(input.as_os_str().to_owned());
        args
    }

    /// Where the engine will write the PDF for `input`.
    pub fn expected_output(input: &Path, out_dir: &Path) -> PathBuf {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out_dir.join(pdf_file_name(&name))
    }

    /// Convert `input` into a PDF inside `out_dir` and return its path.
    pub async fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
        let expected = Self::expected_output(input, out_dir);
        if expected == input {
            return Err(ConversionError::OutputIsInput {
                input: input.to_path_buf(),
            });
        }

        // A PDF left by an earlier invocation must not pass for this run's output.
        match tokio::fs::remove_file(&expected).await {
            Ok(()) => debug!("Removed stale output {}", expected.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove stale output {}: {e}", expected.display()),
        }

        let start = Instant::now();
        let mut attempt = 0;
        loop {
            match self.run_once(input, out_dir).await {
                Ok(()) => break,
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{}: transient engine failure, retry {}/{} after {}ms: {e}",
                        input.display(),
                        attempt,
                        self.max_retries,
                        self.retry_backoff.as_millis()
                    );
                    sleep(self.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }

        match tokio::fs::metadata(&expected).await {
            Ok(meta) if meta.is_file() => {
                info!(
                    "Converted {} → {} ({} bytes) in {}ms",
                    input.display(),
                    expected.display(),
                    meta.len(),
                    start.elapsed().as_millis()
                );
                Ok(expected)
            }
            _ => Err(ConversionError::MissingOutput {
                input: input.to_path_buf(),
                expected,
            }),
        }
    }

    async fn run_once(&self, input: &Path, out_dir: &Path) -> Result<(), ConversionError> {
        let mut command = Command::new(&self.engine);
        command
            .args(self.command_args(input, out_dir))
            .env("HOME", &self.home_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(
            "Running {} {:?}",
            self.engine.display(),
            self.command_args(input, out_dir)
        );

        let output = match timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Err(ConversionError::Timeout {
                    input: input.to_path_buf(),
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(source)) => {
                return Err(ConversionError::Spawn {
                    program: self.engine.clone(),
                    source,
                })
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("soffice stdout: {}", stdout.trim());
        }

        if !output.status.success() {
            return Err(ConversionError::Failed {
                input: input.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoker() -> ConversionInvoker {
        ConversionInvoker::from_config(&HandlerConfig::default())
    }

    #[test]
    fn command_line_matches_engine_contract() {
        let args = invoker().command_args(
            Path::new("/tmp/folder/My File.docx"),
            Path::new("/tmp/folder"),
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();

        assert_eq!(
            args,
            vec![
                "--headless",
                "--norestore",
                "--invisible",
                "--nodefault",
                "--nofirststartwizard",
                "--nolockcheck",
                "--nologo",
                "--convert-to",
                "pdf:writer_pdf_Export",
                "--outdir",
                "/tmp/folder",
                // A single argument, spaces and all.
                "/tmp/folder/My File.docx",
            ]
        );
    }

    #[test]
    fn custom_filter_is_passed_through() {
        let config = HandlerConfig::builder()
            .export_filter("pdf:calc_pdf_Export")
            .build()
            .unwrap();
        let args = ConversionInvoker::from_config(&config)
            .command_args(Path::new("a.xlsx"), Path::new("."));
        assert!(args.contains(&OsString::from("pdf:calc_pdf_Export")));
    }

    #[test]
    fn expected_output_replaces_extension() {
        assert_eq!(
            ConversionInvoker::expected_output(
                Path::new("/tmp/folder/My File.docx"),
                Path::new("/tmp/folder")
            ),
            PathBuf::from("/tmp/folder/My File.pdf")
        );
    }

    #[tokio::test]
    async fn pdf_input_is_left_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.pdf");
        std::fs::write(&input, b"%PDF-1.7").unwrap();

        let err = invoker().convert(&input, dir.path()).await.unwrap_err();
        assert!(matches!(err, ConversionError::OutputIsInput { .. }), "got {err:?}");
        assert_eq!(std::fs::read(&input).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn missing_engine_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = HandlerConfig::builder()
            .scratch_dir(dir.path())
            .build()
            .unwrap();
        let input = dir.path().join("a.docx");
        std::fs::write(&input, b"doc").unwrap();

        let err = ConversionInvoker::from_config(&config)
            .convert(&input, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }), "got {err:?}");
    }
}
