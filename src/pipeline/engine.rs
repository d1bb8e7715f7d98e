//! The conversion engine as a whole: unpack on cold start, then invoke.

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::pipeline::invoke::ConversionInvoker;
use crate::pipeline::staging::StagingArea;
use lo_unpack::RuntimeUnpacker;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// LibreOffice installation plus the command that drives it.
#[derive(Debug, Clone)]
pub struct Engine {
    unpacker: Arc<RuntimeUnpacker>,
    invoker: ConversionInvoker,
}

impl Engine {
    pub fn from_config(config: &HandlerConfig) -> Self {
        Self {
            unpacker: Arc::new(RuntimeUnpacker::new(
                &config.archive_path,
                &config.scratch_dir,
                &config.engine_relative_path,
            )),
            invoker: ConversionInvoker::from_config(config),
        }
    }

    pub fn invoker(&self) -> &ConversionInvoker {
        &self.invoker
    }

    pub fn is_ready(&self) -> bool {
        self.unpacker.is_ready()
    }

    /// Unpack LibreOffice unless it is already present.
    ///
    /// Extraction is blocking I/O, so it runs on the blocking thread pool.
    pub async fn ensure_ready(&self) -> Result<PathBuf, HandlerError> {
        if self.unpacker.is_ready() {
            return Ok(self.unpacker.engine_path().to_path_buf());
        }
        let unpacker = Arc::clone(&self.unpacker);
        tokio::task::spawn_blocking(move || unpacker.ensure_ready())
            .await
            .map_err(|e| HandlerError::Internal(format!("Unpack task panicked: {e}")))?
            .map_err(HandlerError::from)
    }

    /// Convert a staged file; the PDF lands in `out_dir`.
    ///
    /// Logs directory listings of `out_dir` around the run at debug level.
    pub async fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, HandlerError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                "{} before conversion:\n{}",
                out_dir.display(),
                StagingArea::listing(out_dir).await.join("\n")
            );
        }

        let result = self.invoker.convert(input, out_dir).await;

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                "{} after conversion:\n{}",
                out_dir.display(),
                StagingArea::listing(out_dir).await.join("\n")
            );
        }

        Ok(result?)
    }

    /// Convert a file already on disk, writing the PDF next to it.
    pub async fn convert_file(&self, input: &Path) -> Result<PathBuf, HandlerError> {
        self.ensure_ready().await?;
        let out_dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        self.convert(input, out_dir).await
    }
}
