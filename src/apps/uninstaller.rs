use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::detector::{self, ResidualKind};
use super::inventory::{AppRecord, ApplicationInventory};
use super::trash::Trash;
use crate::common::errors::MoleError;
use crate::common::format;
use crate::scanner::walker;
use crate::signals::Signals;

/// Default pause between trashed items
pub const REMOVAL_PACING: Duration = Duration::from_millis(100);

/// One path slated for the trash
#[derive(Debug, Clone, Serialize)]
pub struct RemovalTarget {
    pub path: PathBuf,
    /// `None` for the bundle itself
    pub kind: Option<ResidualKind>,
    pub size_bytes: u64,
}

/// Everything an uninstall would touch, residuals first, bundle last
#[derive(Debug, Clone, Serialize)]
pub struct RemovalPlan {
    pub app_name: String,
    pub bundle_id: Option<String>,
    pub targets: Vec<RemovalTarget>,
}

impl RemovalPlan {
    pub fn total_bytes(&self) -> u64 {
        self.targets.iter().map(|t| t.size_bytes).sum()
    }
}

/// Result of an app uninstall operation
#[derive(Debug, Clone, Serialize)]
pub struct UninstallReport {
    pub app_name: String,
    pub bundle_id: Option<String>,
    pub trashed: Vec<PathBuf>,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
    /// False when the bundle itself could not be moved
    pub bundle_removed: bool,
}

/// Work out removal targets for a bundle under `library` (~/Library)
pub fn plan_removal(library: &Path, app: &AppRecord) -> RemovalPlan {
    let bundle_id = detector::resolve_bundle_id(&app.path);

    let mut targets: Vec<RemovalTarget> = bundle_id
        .as_deref()
        .map(|id| detector::existing_residuals(library, id))
        .unwrap_or_default()
        .into_iter()
        .map(|c| RemovalTarget {
            size_bytes: walker::entry_size(&c.path),
            path: c.path,
            kind: Some(c.kind),
        })
        .collect();

    // App bundle itself (last)
    targets.push(RemovalTarget {
        path: app.path.clone(),
        kind: None,
        size_bytes: app.size_bytes.unwrap_or_else(|| walker::dir_size(&app.path)),
    });

    RemovalPlan {
        app_name: app.name.clone(),
        bundle_id,
        targets,
    }
}

/// Uninstalls applications by trashing the bundle and its leftovers.
/// Everything it touches is user-owned; no elevation involved.
#[derive(Debug, Clone)]
pub struct RemovalEngine {
    inventory: ApplicationInventory,
    trash: Arc<dyn Trash>,
    signals: Signals,
    library: PathBuf,
    pacing: Duration,
}

impl RemovalEngine {
    pub fn new(inventory: ApplicationInventory, trash: Arc<dyn Trash>, signals: Signals) -> Self {
        let library = dirs::home_dir().unwrap_or_default().join("Library");
        Self {
            inventory,
            trash,
            signals,
            library,
            pacing: REMOVAL_PACING,
        }
    }

    /// Look for residuals under this Library directory instead of ~/Library
    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = library.into();
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// The inventory's own copy of `app`, provided its bundle still exists
    fn verified(&self, app: &AppRecord) -> Result<AppRecord, MoleError> {
        let record = self
            .inventory
            .get(app.id)
            .ok_or_else(|| MoleError::AppNotFound {
                name: app.name.clone(),
                path: app.path.clone(),
            })?;
        if record.path.symlink_metadata().is_err() {
            return Err(MoleError::AppNotFound {
                name: record.name,
                path: record.path,
            });
        }
        Ok(record)
    }

    /// What `remove` would trash, without touching anything
    pub async fn plan(&self, app: &AppRecord) -> Result<RemovalPlan, MoleError> {
        let record = self.verified(app)?;
        let library = self.library.clone();
        tokio::task::spawn_blocking(move || plan_removal(&library, &record))
            .await
            .map_err(|e| MoleError::Other {
                message: format!("planning removal failed: {}", e),
            })
    }

    /// Trash the app's residual files, then the bundle, one at a time.
    /// A failure on one item is recorded and the rest still proceed.
    pub async fn remove(&self, app: &AppRecord) -> Result<UninstallReport, MoleError> {
        let record = self.verified(app)?;
        self.signals.set_busy(true);
        self.signals.log(format!("Analyzing {}...", record.name));

        let plan = match self.plan(&record).await {
            Ok(plan) => plan,
            Err(e) => {
                self.signals.set_busy(false);
                return Err(e);
            }
        };

        let mut report = UninstallReport {
            app_name: record.name.clone(),
            bundle_id: plan.bundle_id.clone(),
            trashed: Vec::new(),
            bytes_freed: 0,
            errors: Vec::new(),
            bundle_removed: false,
        };

        for target in plan.targets {
            self.signals
                .log(format!("Removing {}...", format::format_path(&target.path)));

            let trash = Arc::clone(&self.trash);
            let path = target.path.clone();
            let moved = tokio::task::spawn_blocking(move || trash.trash(&path))
                .await
                .unwrap_or_else(|e| {
                    Err(MoleError::Other {
                        message: e.to_string(),
                    })
                });

            match moved {
                Ok(_) => {
                    if target.kind.is_none() {
                        report.bundle_removed = true;
                    }
                    report.bytes_freed += target.size_bytes;
                    report.trashed.push(target.path);
                }
                Err(e) => {
                    warn!(path = %target.path.display(), error = %e, "failed to trash item");
                    report.errors.push(e.to_string());
                }
            }
            tokio::time::sleep(self.pacing).await;
        }

        if report.bundle_removed {
            self.inventory.remove(record.id).await?;
            self.signals.log(format!("Uninstalled {}", record.name));
        } else {
            self.signals.log(format!("Failed to remove {}", record.name));
        }
        self.signals.set_busy(false);

        info!(
            app = %report.app_name,
            trashed = report.trashed.len(),
            errors = report.errors.len(),
            "uninstall finished"
        );
        Ok(report)
    }
}
