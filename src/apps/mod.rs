pub mod detector;
pub mod inventory;
pub mod trash;
pub mod uninstaller;

pub use detector::{
    existing_residuals, residual_candidates, resolve_bundle_id, ResidualCandidate, ResidualKind,
};
pub use inventory::{list_bundles, AppRecord, ApplicationInventory};
pub use trash::{SystemTrash, Trash};
pub use uninstaller::{plan_removal, RemovalEngine, RemovalPlan, RemovalTarget, UninstallReport};
