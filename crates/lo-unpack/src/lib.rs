//! # lo-unpack
//!
//! Unpack a compressed LibreOffice installation (as shipped in a Lambda layer
//! or container image) into a writable scratch directory, once per execution
//! environment.
//!
//! ## How it works
//!
//! On each call to [`RuntimeUnpacker::ensure_ready`]:
//!
//! 1. Checks for the engine executable at `<target>/lo/instdir/program/soffice.bin`.
//!    Its presence is the only readiness signal; nothing else is verified.
//! 2. If absent, decompresses the archive (`.tar.br`, `.tar.gz`/`.tgz` or
//!    `.tar`) into a private temporary directory inside the target.
//! 3. Moves each top-level entry into the target with `rename(2)`, which is
//!    atomic on a single filesystem. A warm environment running two
//!    invocations at once therefore never observes a half-written tree.
//!
//! Staging directories left behind by a process killed mid-extract are
//! removed on the next cold start.
//!
//! Warm invocations take the fast path: one `stat` and no archive access.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lo_unpack::RuntimeUnpacker;
//!
//! let unpacker = RuntimeUnpacker::with_defaults();
//! let soffice = unpacker.ensure_ready().expect("LibreOffice unavailable");
//! println!("engine at {}", soffice.display());
//! ```

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

// ── Public constants ─────────────────────────────────────────────────────────

/// Where the deployment package places the compressed installation.
pub const DEFAULT_ARCHIVE_PATH: &str = "/opt/lo.tar.br";

/// The writable scratch root reused across warm invocations.
pub const DEFAULT_TARGET_DIR: &str = "/tmp";

/// Engine executable, relative to the target directory.
pub const DEFAULT_ENGINE_PATH: &str = "lo/instdir/program/soffice.bin";

const STAGING_PREFIX: &str = ".lo-unpack-";

// Held for the whole slow path, so within one process at most one extraction
// (and one sweep of abandoned staging dirs) runs at a time.
static UNPACK_LOCK: Mutex<()> = Mutex::new(());

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned while preparing the LibreOffice runtime.
#[derive(Error, Debug)]
pub enum UnpackError {
    /// The bundled archive is not where the deployment package should put it.
    #[error("LibreOffice archive not found at '{path}'")]
    ArchiveMissing { path: PathBuf },

    /// The archive file name does not map to a known compression.
    #[error("Unsupported archive format: '{path}' (expected .tar.br, .tar.gz, .tgz or .tar)")]
    UnsupportedFormat { path: PathBuf },

    /// Filesystem operation on the target directory failed.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decompression or tar extraction failed (corrupt archive, disk full).
    #[error("Failed to extract '{archive}': {detail}")]
    Extract { archive: PathBuf, detail: String },

    /// Extraction finished but the engine executable is still absent.
    #[error("Archive extracted but engine executable is missing at '{path}'")]
    MarkerMissing { path: PathBuf },
}

// ── Archive formats ──────────────────────────────────────────────────────────

/// Compression wrapping the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarBrotli,
    TarGzip,
    Tar,
}

impl ArchiveFormat {
    /// Detect the format from the archive's file name.
    pub fn from_path(path: &Path) -> Result<Self, UnpackError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.br") {
            Ok(Self::TarBrotli)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGzip)
        } else if name.ends_with(".tar") {
            Ok(Self::Tar)
        } else {
            Err(UnpackError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    }

    fn decoder<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Self::TarBrotli => Box::new(brotli::Decompressor::new(reader, 64 * 1024)),
            Self::TarGzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Self::Tar => Box::new(reader),
        }
    }
}

// ── Unpacker ─────────────────────────────────────────────────────────────────

/// Ensures the LibreOffice installation exists under a target directory.
///
/// Extractions within one process are serialized. Separate processes sharing
/// a target are safe as well: extraction never writes into the final location
/// directly.
#[derive(Debug)]
pub struct RuntimeUnpacker {
    archive: PathBuf,
    target: PathBuf,
    engine: PathBuf,
}

impl RuntimeUnpacker {
    /// `engine_relative` is the executable's path relative to `target`.
    pub fn new(
        archive: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        engine_relative: impl AsRef<Path>,
    ) -> Self {
        let target = target.into();
        let engine = target.join(engine_relative);
        Self {
            archive: archive.into(),
            target,
            engine,
        }
    }

    /// `/opt/lo.tar.br` unpacked into `/tmp`.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_ARCHIVE_PATH, DEFAULT_TARGET_DIR, DEFAULT_ENGINE_PATH)
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    pub fn target_dir(&self) -> &Path {
        &self.target
    }

    /// Absolute path of the engine executable (whether or not it exists yet).
    pub fn engine_path(&self) -> &Path {
        &self.engine
    }

    /// `true` when the engine executable is present.
    pub fn is_ready(&self) -> bool {
        self.engine.is_file()
    }

    /// Make sure the engine is installed, extracting the archive if needed.
    ///
    /// Returns the engine executable path. Blocking; call it from
    /// `spawn_blocking` inside async code.
    pub fn ensure_ready(&self) -> Result<PathBuf, UnpackError> {
        if self.is_ready() {
            debug!("LibreOffice already unpacked at {}", self.engine.display());
            return Ok(self.engine.clone());
        }

        let _guard = UNPACK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited.
        if self.is_ready() {
            return Ok(self.engine.clone());
        }

        info!(
            "No LibreOffice found at {}. Unpacking {}",
            self.engine.display(),
            self.archive.display()
        );
        let start = Instant::now();
        self.unpack()?;

        if !self.is_ready() {
            return Err(UnpackError::MarkerMissing {
                path: self.engine.clone(),
            });
        }

        info!(
            "Unpacked LibreOffice in {}ms",
            start.elapsed().as_millis()
        );
        Ok(self.engine.clone())
    }

    fn unpack(&self) -> Result<(), UnpackError> {
        let format = ArchiveFormat::from_path(&self.archive)?;

        let file = File::open(&self.archive).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => UnpackError::ArchiveMissing {
                path: self.archive.clone(),
            },
            _ => UnpackError::Io {
                path: self.archive.clone(),
                source: e,
            },
        })?;

        fs::create_dir_all(&self.target).map_err(|e| UnpackError::Io {
            path: self.target.clone(),
            source: e,
        })?;

        self.sweep_abandoned();

        // Same filesystem as the target, so the final rename stays atomic.
        let staging = self.staging_dir()?;

        let reader = format.decoder(BufReader::new(file));
        let mut archive = tar::Archive::new(reader);
        archive.set_preserve_permissions(true);
        archive
            .unpack(staging.path())
            .map_err(|e| UnpackError::Extract {
                archive: self.archive.clone(),
                detail: e.to_string(),
            })?;

        let entries = fs::read_dir(staging.path()).map_err(|e| UnpackError::Io {
            path: staging.path().to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| UnpackError::Io {
                path: staging.path().to_path_buf(),
                source: e,
            })?;
            let dest = self.target.join(entry.file_name());
            self.move_into_place(&entry.path(), &dest)?;
        }

        // `staging` is removed on drop, along with anything left behind.
        Ok(())
    }

    fn move_into_place(&self, src: &Path, dest: &Path) -> Result<(), UnpackError> {
        let first = match fs::rename(src, dest) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !dest.exists() {
            return Err(UnpackError::Io {
                path: dest.to_path_buf(),
                source: first,
            });
        }

        // Lost the race to a concurrent unpack: its tree is complete.
        if self.is_ready() {
            debug!(
                "{} already moved into place by a concurrent unpack",
                dest.display()
            );
            return Ok(());
        }

        warn!(
            "Replacing incomplete LibreOffice tree at {}",
            dest.display()
        );
        // Move the incomplete tree aside instead of deleting it in place. If a
        // concurrent unpack completes it meanwhile, the complete tree is
        // swapped for ours rather than lost. `aside` is removed on drop.
        let aside = self.staging_dir()?;
        match fs::rename(dest, aside.path().join("stale")) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(UnpackError::Io {
                    path: dest.to_path_buf(),
                    source: e,
                })
            }
        }

        match fs::rename(src, dest) {
            Ok(()) => Ok(()),
            Err(_) if self.is_ready() => Ok(()),
            Err(e) => Err(UnpackError::Io {
                path: dest.to_path_buf(),
                source: e,
            }),
        }
    }

    /// A fresh private directory inside the target, tagged with our PID.
    fn staging_dir(&self) -> Result<tempfile::TempDir, UnpackError> {
        tempfile::Builder::new()
            .prefix(&staging_prefix())
            .tempdir_in(&self.target)
            .map_err(|e| UnpackError::Io {
                path: self.target.clone(),
                source: e,
            })
    }

    /// Remove staging directories left by a process killed mid-extract.
    ///
    /// Must be called with `UNPACK_LOCK` held: any directory tagged with our
    /// own PID is then known to be abandoned.
    fn sweep_abandoned(&self) {
        let Ok(entries) = fs::read_dir(&self.target) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(tag) = name.to_string_lossy().strip_prefix(STAGING_PREFIX).map(str::to_owned)
            else {
                continue;
            };
            if !owner_is_gone(&tag) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => info!("Removed abandoned staging dir {}", entry.path().display()),
                Err(e) => warn!(
                    "Could not remove abandoned staging dir {}: {e}",
                    entry.path().display()
                ),
            }
        }
    }
}

fn staging_prefix() -> String {
    format!("{STAGING_PREFIX}{}-", std::process::id())
}

/// Whether the process that created a staging dir (`<pid>-<random>`) is gone.
///
/// Untagged names and processes we cannot check are treated as alive.
fn owner_is_gone(tag: &str) -> bool {
    let Some(pid) = tag.split('-').next().and_then(|p| p.parse::<u32>().ok()) else {
        return false;
    };
    if pid == std::process::id() {
        return true;
    }
    let proc_root = Path::new("/proc");
    proc_root.is_dir() && !proc_root.join(pid.to_string()).exists()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
