//! Local staging area: the scratch directory files pass through on their way
//! to and from the engine.
//!
//! Nothing here deletes files. A warm execution environment keeps whatever
//! earlier invocations staged; because every path is derived from the
//! invocation's own object key, a repeat of the same event simply overwrites
//! its previous files.

use crate::error::HandlerError;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A scratch directory addressed by object-key-like relative names.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative name (`folder/My File.docx`) to its path under the root.
    ///
    /// Names that would escape the root (`..`, absolute paths) are rejected.
    pub fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let mut has_file = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_file = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("'{name}' escapes the staging directory"),
                    ));
                }
            }
        }
        if !has_file {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{name}' does not name a file"),
            ));
        }
        Ok(self.root.join(relative))
    }

    /// Create or overwrite `name` with `bytes`, creating parent directories.
    ///
    /// Returns the absolute path written.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, HandlerError> {
        let path = self
            .resolve(name)
            .map_err(|source| HandlerError::StagingWrite {
                path: self.root.join(name),
                source,
            })?;

        debug!("Writing {} bytes to {}", bytes.len(), path.display());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| HandlerError::StagingWrite {
                    path: path.clone(),
                    source,
                })?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| HandlerError::StagingWrite {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }

    /// Read `name` back in full.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, HandlerError> {
        let path = self
            .resolve(name)
            .map_err(|source| HandlerError::StagingRead {
                path: self.root.join(name),
                source,
            })?;

        debug!("Reading {}", path.display());

        tokio::fs::read(&path)
            .await
            .map_err(|source| HandlerError::StagingRead { path, source })
    }

    /// One `<size> <name>` line per entry of `dir`, sorted by name.
    /// Directories carry a trailing `/`.
    ///
    /// Diagnostics only: an unreadable directory yields a single line
    /// describing the error rather than failing.
    pub async fn listing(dir: &Path) -> Vec<String> {
        let mut reader = match tokio::fs::read_dir(dir).await {
            Ok(r) => r,
            Err(e) => return vec![format!("<cannot list {}: {e}>", dir.display())],
        };

        let mut lines = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let line = match entry.metadata().await {
                        Ok(meta) if meta.is_dir() => format!("{:>10} {name}/", "-"),
                        Ok(meta) => format!("{:>10} {name}", meta.len()),
                        Err(_) => format!("{:>10} {name}", "?"),
                    };
                    lines.push((name, line));
                }
                Ok(None) => break,
                Err(e) => {
                    lines.push((String::new(), format!("<listing interrupted: {e}>")));
                    break;
                }
            }
        }

        lines.sort_by(|a, b| a.0.cmp(&b.0));
        lines.into_iter().map(|(_, line)| line).collect()
    }
}
