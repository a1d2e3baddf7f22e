//! # Mole
//!
//! Reclaim disk space on a Mac and keep it tidy.
//!
//! Mole measures and clears cache and log directories, uninstalls
//! applications together with their leftover files, and runs a short
//! list of administrative maintenance steps. It features:
//!
//! - **Two-Tier Cleaning**: user-owned caches are cleared directly, the two
//!   allow-listed system roots go through one batched elevated command
//! - **Recoverable Uninstalls**: bundles and residuals are moved to the Trash
//! - **Cached Authorization**: the admin password is asked for once and
//!   discarded the moment it stops working
//! - **CLI as Unix Citizen**: JSON output, pipe-friendly

pub mod apps;
pub mod cleaner;
pub mod cli;
pub mod common;
pub mod optimizer;
pub mod privilege;
pub mod scanner;
pub mod signals;
