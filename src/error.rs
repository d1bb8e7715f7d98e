//! Error types for the office2pdf-lambda library.
//!
//! Every failure is terminal for the current invocation. Errors propagate to
//! [`crate::handler::EventHandler::handle`], which converts them into the
//! structured failure response instead of letting the runtime report a crash.
//!
//! * [`HandlerError`]: one variant per failing component. [`HandlerError::kind`]
//!   is the stable tag placed in the response body.
//! * [`ConversionError`]: why the external engine did not produce a PDF.
//!   Kept separate so the invoker can decide which failures are worth a retry.

use std::path::PathBuf;
use thiserror::Error;

pub use lo_unpack::UnpackError;

/// All errors returned by the office2pdf-lambda library.
#[derive(Debug, Error)]
pub enum HandlerError {
    // ── Event errors ──────────────────────────────────────────────────────
    /// The trigger payload is not a usable S3 notification.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    // ── Object storage ────────────────────────────────────────────────────
    /// Object missing, bucket unreachable, or access denied on read.
    #[error("Failed to fetch s3://{bucket}/{key}: {reason}")]
    StoreRead {
        bucket: String,
        key: String,
        reason: String,
    },

    /// Transport or permission failure on write.
    #[error("Failed to upload s3://{bucket}/{key}: {reason}")]
    StoreWrite {
        bucket: String,
        key: String,
        reason: String,
    },

    // ── Staging area ──────────────────────────────────────────────────────
    /// A staged file could not be read back (usually: never produced).
    #[error("Failed to read staged file '{path}': {source}")]
    StagingRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A staged file could not be written (read-only dir, disk full).
    #[error("Failed to write staged file '{path}': {source}")]
    StagingWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Engine ────────────────────────────────────────────────────────────
    /// The LibreOffice runtime could not be unpacked.
    #[error("Failed to prepare LibreOffice: {0}")]
    Unpack(#[from] UnpackError),

    /// The engine ran but did not produce a PDF.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Stable error tag for the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidEvent(_) => "InvalidEvent",
            Self::StoreRead { .. } => "StoreReadError",
            Self::StoreWrite { .. } => "StoreWriteError",
            Self::StagingRead { .. } => "StagingReadError",
            Self::StagingWrite { .. } => "StagingWriteError",
            Self::Unpack(_) => "UnpackError",
            Self::Conversion(_) => "ConversionError",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::Internal(_) => "InternalError",
        }
    }
}

/// Why a conversion run failed.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The engine executable could not be started at all.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine exited unsuccessfully.
    #[error("Conversion of '{input}' failed (exit code {code:?}): {stderr}")]
    Failed {
        input: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The engine exceeded the configured time budget and was killed.
    #[error("Conversion of '{input}' timed out after {secs}s")]
    Timeout { input: PathBuf, secs: u64 },

    /// The output path is the input itself (converting a `.pdf`).
    #[error("Conversion of '{input}' would overwrite the input with its output")]
    OutputIsInput { input: PathBuf },

    /// The engine reported success but wrote no output file.
    #[error("Conversion of '{input}' produced no output at '{expected}'")]
    MissingOutput { input: PathBuf, expected: PathBuf },
}

/// Exit code LibreOffice uses to request a restart after initialising a
/// fresh user profile. A second run against the same profile succeeds.
pub const RESTART_EXIT_CODE: i32 = 81;

impl ConversionError {
    /// Whether re-running the identical command can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                code: Some(RESTART_EXIT_CODE),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_response_tags() {
        let read = HandlerError::StoreRead {
            bucket: "docs".into(),
            key: "a.docx".into(),
            reason: "NoSuchKey".into(),
        };
        assert_eq!(read.kind(), "StoreReadError");

        let conv: HandlerError = ConversionError::MissingOutput {
            input: "/tmp/a.docx".into(),
            expected: "/tmp/a.pdf".into(),
        }
        .into();
        assert_eq!(conv.kind(), "ConversionError");

        let unpack: HandlerError = UnpackError::ArchiveMissing {
            path: "/opt/lo.tar.br".into(),
        }
        .into();
        assert_eq!(unpack.kind(), "UnpackError");
    }

    #[test]
    fn store_read_display() {
        let e = HandlerError::StoreRead {
            bucket: "docs".into(),
            key: "folder/My File.docx".into(),
            reason: "NoSuchKey".into(),
        };
        assert_eq!(
            e.to_string(),
            "Failed to fetch s3://docs/folder/My File.docx: NoSuchKey"
        );
    }

    #[test]
    fn only_restart_exit_is_transient() {
        let restart = ConversionError::Failed {
            input: "a.docx".into(),
            code: Some(RESTART_EXIT_CODE),
            stderr: String::new(),
        };
        assert!(restart.is_transient());

        let general = ConversionError::Failed {
            input: "a.docx".into(),
            code: Some(1),
            stderr: "Error: source file could not be loaded".into(),
        };
        assert!(!general.is_transient());

        let timeout = ConversionError::Timeout {
            input: "a.docx".into(),
            secs: 120,
        };
        assert!(!timeout.is_transient());
    }

    #[test]
    fn conversion_display_is_transparent() {
        let e: HandlerError = ConversionError::Timeout {
            input: "/tmp/a.docx".into(),
            secs: 5,
        }
        .into();
        assert!(e.to_string().contains("timed out after 5s"), "got: {e}");
    }
}
