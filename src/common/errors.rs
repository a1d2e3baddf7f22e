use std::path::PathBuf;
use thiserror::Error;

/// Typed errors for Mole operations.
/// The binary uses `anyhow` at the top level; library modules stay precise.
#[derive(Debug, Error)]
pub enum MoleError {
    /// File system operation failed
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// App is not (or no longer) present on disk
    #[error("App '{name}' not found at '{}'", path.display())]
    AppNotFound { name: String, path: PathBuf },

    /// A path could not be moved to the trash
    #[error("Failed to trash '{}': {message}", path.display())]
    Trash { path: PathBuf, message: String },

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl MoleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MoleError::Io {
            path: path.into(),
            source,
        }
    }
}
