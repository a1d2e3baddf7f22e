use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::common::safety::{self, ALLOWED_SYSTEM_ROOTS};
use crate::privilege::{ElevationError, Elevator};
use crate::scanner::catalog::ReclaimPathCatalog;
use crate::scanner::walker;
use crate::signals::Signals;

/// Joins the per-root clauses of the batched system command
pub const SYSTEM_SEPARATOR: &str = "; ";

/// Default floor on clean duration so progress stays visible
pub const MIN_CLEAN_DURATION: Duration = Duration::from_secs(1);

/// What happened to the system tier during a clean
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemPhase {
    /// No allow-listed root exists
    NotNeeded,
    /// The batched command succeeded
    Cleaned,
    /// No credential cached; deferred until one is supplied
    NeedsAuthorization,
    /// The cached credential failed and was discarded
    CredentialRejected,
    /// The elevation helper could not run
    Failed(String),
}

/// Report from a clean operation
#[derive(Debug, Clone, Serialize)]
pub struct CleanOutcome {
    pub user_bytes_freed: u64,
    pub user_items_removed: usize,
    pub user_items_failed: usize,
    pub system: SystemPhase,
    pub system_bytes_freed: u64,
}

impl CleanOutcome {
    /// Bytes actually freed across both tiers
    pub fn freed_bytes(&self) -> u64 {
        self.user_bytes_freed + self.system_bytes_freed
    }

    pub fn needs_authorization(&self) -> bool {
        matches!(
            self.system,
            SystemPhase::NeedsAuthorization | SystemPhase::CredentialRejected
        )
    }
}

#[derive(Debug, Default)]
struct ChildSweep {
    bytes: u64,
    removed: usize,
    failed: usize,
}

fn path_exists(path: &Path) -> bool {
    path.exists()
}

/// The allow-listed roots that are both catalogued and present
pub fn eligible_system_roots(
    catalog: &ReclaimPathCatalog,
    exists: impl Fn(&Path) -> bool,
) -> Vec<&'static str> {
    ALLOWED_SYSTEM_ROOTS
        .iter()
        .copied()
        .filter(|root| catalog.system_paths().iter().any(|p| p.path == Path::new(root)))
        .filter(|root| exists(Path::new(root)))
        .collect()
}

/// Build the one elevated command that empties the system tier.
///
/// Only the hard-coded allow-list literals are interpolated; catalog
/// entries merely select which of them apply.
pub fn system_clean_command(
    catalog: &ReclaimPathCatalog,
    exists: impl Fn(&Path) -> bool,
) -> Option<String> {
    let clauses: Vec<String> = eligible_system_roots(catalog, exists)
        .into_iter()
        .map(|root| format!("rm -rf \"{}\"/*", root))
        .collect();
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(SYSTEM_SEPARATOR))
    }
}

/// Delete every immediate child of `root`, keeping `root` itself.
/// Children that refuse to go are counted and skipped.
fn delete_children(root: &Path) -> ChildSweep {
    let mut sweep = ChildSweep::default();
    if !safety::is_safe_user_root(root) {
        warn!(path = %root.display(), "refusing to sweep protected root");
        return sweep;
    }
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %root.display(), error = %e, "cannot list root");
            return sweep;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let child = entry.path();
        if safety::is_protected(&child) || !safety::is_direct_child(&child, root) {
            warn!(path = %child.display(), "refusing to delete protected path");
            sweep.failed += 1;
            continue;
        }

        let size = walker::entry_size(&child);
        let result = match entry.file_type() {
            Ok(ft) if ft.is_dir() => std::fs::remove_dir_all(&child),
            _ => std::fs::remove_file(&child),
        };
        match result {
            Ok(()) => {
                sweep.bytes += size;
                sweep.removed += 1;
            }
            Err(e) => {
                debug!(path = %child.display(), error = %e, "skipping busy or protected child");
                sweep.failed += 1;
            }
        }
    }
    sweep
}

/// Deletes reclaimable content: user tier directly, system tier through
/// one batched elevated command.
#[derive(Debug, Clone)]
pub struct CleanEngine {
    catalog: ReclaimPathCatalog,
    elevator: Elevator,
    signals: Signals,
    min_duration: Duration,
    exists: fn(&Path) -> bool,
}

impl CleanEngine {
    pub fn new(catalog: ReclaimPathCatalog, elevator: Elevator, signals: Signals) -> Self {
        Self {
            catalog,
            elevator,
            signals,
            min_duration: MIN_CLEAN_DURATION,
            exists: path_exists,
        }
    }

    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration = min_duration;
        self
    }

    /// Replace the existence check used for the system tier
    pub fn with_existence_probe(mut self, exists: fn(&Path) -> bool) -> Self {
        self.exists = exists;
        self
    }

    pub async fn clean(&self) -> CleanOutcome {
        let start = Instant::now();
        self.signals.set_busy(true);

        let sweep = self.clean_user_tier().await;
        info!(
            bytes = sweep.bytes,
            removed = sweep.removed,
            failed = sweep.failed,
            "user tier cleaned"
        );

        let mut outcome = CleanOutcome {
            user_bytes_freed: sweep.bytes,
            user_items_removed: sweep.removed,
            user_items_failed: sweep.failed,
            system: SystemPhase::NotNeeded,
            system_bytes_freed: 0,
        };

        let (phase, system_bytes) = self.clean_system_tier().await;
        outcome.system = phase;
        outcome.system_bytes_freed = system_bytes;

        if matches!(outcome.system, SystemPhase::NotNeeded | SystemPhase::Cleaned) {
            let elapsed = start.elapsed();
            if elapsed < self.min_duration {
                tokio::time::sleep(self.min_duration - elapsed).await;
            }
            self.signals.set_bytes(0);
            self.signals.log("Cleaned");
        }

        self.signals.set_busy(false);
        info!(
            freed = outcome.freed_bytes(),
            system = ?outcome.system,
            "clean finished"
        );
        outcome
    }

    async fn clean_user_tier(&self) -> ChildSweep {
        let mut total = ChildSweep::default();
        for reclaim in self.catalog.user_paths() {
            if !reclaim.path.exists() {
                continue;
            }
            self.signals.log(format!("Cleaning {}...", reclaim.label()));

            let root: PathBuf = reclaim.path.clone();
            let sweep = match tokio::task::spawn_blocking(move || delete_children(&root)).await {
                Ok(sweep) => sweep,
                Err(e) => {
                    warn!(path = %reclaim.path.display(), error = %e, "user-tier sweep aborted");
                    ChildSweep::default()
                }
            };
            total.bytes += sweep.bytes;
            total.removed += sweep.removed;
            total.failed += sweep.failed;
        }
        total
    }

    async fn clean_system_tier(&self) -> (SystemPhase, u64) {
        let roots = eligible_system_roots(&self.catalog, self.exists);
        let Some(command) = system_clean_command(&self.catalog, self.exists) else {
            return (SystemPhase::NotNeeded, 0);
        };

        self.signals.log("Authorizing System Cleanup...");
        let pending = tokio::task::spawn_blocking(move || {
            roots.iter().map(|r| walker::dir_size(Path::new(r))).sum::<u64>()
        })
        .await
        .unwrap_or(0);

        match self.elevator.run(&command).await {
            Ok(_) => (SystemPhase::Cleaned, pending),
            Err(ElevationError::AuthorizationRequired) => {
                self.signals.log("Requires Authorization");
                (SystemPhase::NeedsAuthorization, 0)
            }
            Err(ElevationError::Rejected(e)) => {
                warn!(error = %e, "system cleanup rejected");
                self.signals.log("Password Incorrect/Expired");
                (SystemPhase::CredentialRejected, 0)
            }
            Err(ElevationError::Failed(e)) => {
                warn!(error = %e, "system cleanup could not run");
                if e.is_user_cancelled() {
                    self.signals.log("Cleanup Cancelled by User");
                } else {
                    self.signals.log(format!("Error: {}", e));
                }
                (SystemPhase::Failed(e.to_string()), 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::catalog::ReclaimPath;

    fn all_present(_: &Path) -> bool {
        true
    }

    #[test]
    fn test_unsafe_root_is_never_swept() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("keep"), b"x").unwrap();

        let sweep = delete_children(&tmp.path().join("sub/.."));
        assert_eq!(sweep.removed, 0);
        assert!(tmp.path().join("keep").exists());

        let sweep = delete_children(tmp.path());
        assert_eq!(sweep.removed, 2);
        assert!(!tmp.path().join("keep").exists());
    }

    #[test]
    fn test_system_command_has_exactly_two_clauses() {
        let catalog = ReclaimPathCatalog::standard(Path::new("/Users/me"));
        let command = system_clean_command(&catalog, all_present).unwrap();
        assert_eq!(
            command,
            "rm -rf \"/Library/Caches\"/*; rm -rf \"/Library/Logs\"/*"
        );
        assert_eq!(command.matches(SYSTEM_SEPARATOR).count(), 1);
        assert_eq!(command.matches("rm -rf").count(), 2);
    }

    #[test]
    fn test_system_command_ignores_foreign_system_entries() {
        let catalog = ReclaimPathCatalog::from_paths([
            ReclaimPath::system("/Library/Caches"),
            ReclaimPath::system("/etc"),
            ReclaimPath::system("/Library/Logs/../../"),
            ReclaimPath::system("/Library/Logs"),
        ]);
        let command = system_clean_command(&catalog, all_present).unwrap();
        assert_eq!(command.matches("rm -rf").count(), 2);
        assert!(!command.contains("/etc"));
        assert!(!command.contains(".."));
    }

    #[test]
    fn test_system_command_skips_missing_roots() {
        let catalog = ReclaimPathCatalog::standard(Path::new("/Users/me"));
        let command =
            system_clean_command(&catalog, |p| p == Path::new("/Library/Logs")).unwrap();
        assert_eq!(command, "rm -rf \"/Library/Logs\"/*");

        assert!(system_clean_command(&catalog, |_| false).is_none());
    }

    #[test]
    fn test_system_command_requires_catalog_entry() {
        let catalog = ReclaimPathCatalog::from_paths([ReclaimPath::user("/tmp/x")]);
        assert!(system_clean_command(&catalog, all_present).is_none());
    }
}
