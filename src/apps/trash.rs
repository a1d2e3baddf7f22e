use std::path::Path;
use tracing::debug;

use crate::common::errors::MoleError;

/// Recoverable delete: move an entry somewhere the user can restore it from
pub trait Trash: Send + Sync + std::fmt::Debug {
    fn trash(&self, path: &Path) -> Result<(), MoleError>;
}

/// The platform trash, with Finder's "Put Back" on macOS
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTrash;

impl Trash for SystemTrash {
    fn trash(&self, path: &Path) -> Result<(), MoleError> {
        trash::delete(path).map_err(|e| MoleError::Trash {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "moved to trash");
        Ok(())
    }
}
