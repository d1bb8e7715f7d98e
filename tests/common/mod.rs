//! Shared helpers: a fake `soffice.bin` shell script that honours the real
//! engine's command line, and scratch-directory setup.

#![allow(dead_code)]

use office2pdf_lambda::HandlerConfig;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const ENGINE_PATH: &str = "lo/instdir/program/soffice.bin";

/// Every fake engine records one line per run in `$HOME/attempts` and parses
/// `--outdir` and the input path the way soffice does.
const PARSE_ARGS: &str = r#"#!/bin/sh
echo run >> "$HOME/attempts"
outdir=""
input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --outdir) outdir="$2"; shift 2 ;;
    --convert-to) shift 2 ;;
    --*) shift ;;
    *) input="$1"; shift ;;
  esac
done
"#;

const WRITE_PDF: &str = r#"name=$(basename "$input")
stem="${name%.*}"
{ printf '%%PDF-fake\n'; cat "$input"; } > "$outdir/$stem.pdf"
"#;

fn script(body: &str) -> String {
    format!("{PARSE_ARGS}{body}")
}

/// Writes `<outdir>/<stem>.pdf` = `%PDF-fake\n` + input bytes.
pub fn converting() -> String {
    script(WRITE_PDF)
}

pub fn failing() -> String {
    script("echo 'Error: source file could not be loaded' >&2\nexit 1\n")
}

/// Exits 0 without writing anything.
pub fn silent() -> String {
    script("exit 0\n")
}

/// Behaves like a first start: exits 81 once per HOME, then converts.
pub fn restart_once() -> String {
    script(&format!(
        "if [ ! -f \"$HOME/.profile-ready\" ]; then\n  touch \"$HOME/.profile-ready\"\n  exit 81\nfi\n{WRITE_PDF}"
    ))
}

pub fn always_restart() -> String {
    script("exit 81\n")
}

pub fn hanging() -> String {
    script("exec sleep 30\n")
}

/// Pdf bytes the `converting` engine produces for `source`.
pub fn fake_pdf(source: &[u8]) -> Vec<u8> {
    let mut pdf = b"%PDF-fake\n".to_vec();
    pdf.extend_from_slice(source);
    pdf
}

/// Install `script` as an already-unpacked engine under `scratch`.
pub fn install_engine(scratch: &Path, script: &str) -> PathBuf {
    let path = scratch.join(ENGINE_PATH);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A `.tar.gz` holding `script` at the engine path, like a Lambda layer.
pub fn engine_archive(dir: &Path, script: &str) -> PathBuf {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    builder
        .append_data(&mut header, ENGINE_PATH, script.as_bytes())
        .unwrap();
    let tar_bytes = builder.into_inner().unwrap();

    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    std::io::Write::write_all(&mut gz, &tar_bytes).unwrap();
    let path = dir.join("lo.tar.gz");
    std::fs::write(&path, gz.finish().unwrap()).unwrap();
    path
}

/// Config rooted at `scratch` with short timeouts and backoff.
pub fn config_for(scratch: &Path) -> HandlerConfig {
    HandlerConfig::builder()
        .scratch_dir(scratch)
        .archive_path(scratch.join("not-shipped.tar.br"))
        .conversion_timeout_secs(10)
        .retry_backoff_ms(10)
        .build()
        .unwrap()
}

pub fn attempts(home: &Path) -> usize {
    std::fs::read_to_string(home.join("attempts"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// Log to the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
