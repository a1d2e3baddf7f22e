use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::common::safety::{self, ALLOWED_SYSTEM_ROOTS};

/// Who owns a reclaimable root, and therefore whether deleting from it
/// needs elevation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Owned by the invoking account
    User,
    /// Owned by root, deleted only through one batched elevated command
    System,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::User => write!(f, "User"),
            Tier::System => write!(f, "System"),
        }
    }
}

/// A directory whose contents may be reclaimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimPath {
    pub path: PathBuf,
    pub tier: Tier,
}

impl ReclaimPath {
    pub fn user(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tier: Tier::User,
        }
    }

    pub fn system(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tier: Tier::System,
        }
    }

    /// Last path component, used in progress labels
    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Ordered set of reclaimable roots: user tier first, then system tier
#[derive(Debug, Clone, Default)]
pub struct ReclaimPathCatalog {
    user: Vec<ReclaimPath>,
    system: Vec<ReclaimPath>,
}

/// User-owned locations under ~/Library, relative to it
const USER_LIBRARY_PATHS: &[&str] = &[
    "Caches",
    "Logs",
    "Developer/Xcode/DerivedData",
    "Developer/Xcode/Archives",
    "Developer/Xcode/iOS DeviceSupport",
    "Developer/CoreSimulator/Caches",
];

impl ReclaimPathCatalog {
    /// The standard catalog for a home directory
    pub fn standard(home: &Path) -> Self {
        let library = home.join("Library");
        Self {
            user: USER_LIBRARY_PATHS
                .iter()
                .map(|rel| ReclaimPath::user(library.join(rel)))
                .collect(),
            system: ALLOWED_SYSTEM_ROOTS
                .iter()
                .map(|root| ReclaimPath::system(*root))
                .collect(),
        }
    }

    /// The standard catalog for the current user plus configured extras.
    /// A leading `~/` in an extra is expanded to the home directory.
    pub fn for_current_user(extra_user_paths: &[PathBuf]) -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        let mut catalog = Self::standard(&home);
        for extra in extra_user_paths {
            let path = match extra.strip_prefix("~") {
                Ok(rest) => home.join(rest),
                Err(_) => extra.clone(),
            };
            catalog.push(ReclaimPath::user(path));
        }
        catalog
    }

    /// Build a catalog from explicit entries, keeping tier order
    pub fn from_paths(paths: impl IntoIterator<Item = ReclaimPath>) -> Self {
        let mut catalog = Self::default();
        for p in paths {
            catalog.push(p);
        }
        catalog
    }

    /// Add an entry unless it is a duplicate or unsafe to sweep.
    ///
    /// User roots must pass [`safety::is_safe_user_root`]; system roots
    /// must be one of the allow-listed literals.
    pub fn push(&mut self, path: ReclaimPath) {
        let accepted = match path.tier {
            Tier::User => safety::is_safe_user_root(&path.path),
            Tier::System => safety::is_allowed_system_root(&path.path),
        };
        if !accepted {
            warn!(path = %path.path.display(), tier = %path.tier, "ignoring unsafe reclaim root");
            return;
        }

        let tier = match path.tier {
            Tier::User => &mut self.user,
            Tier::System => &mut self.system,
        };
        if !tier.contains(&path) {
            tier.push(path);
        }
    }

    pub fn user_paths(&self) -> &[ReclaimPath] {
        &self.user
    }

    pub fn system_paths(&self) -> &[ReclaimPath] {
        &self.system
    }

    /// Every entry in scan order
    pub fn iter(&self) -> impl Iterator<Item = &ReclaimPath> {
        self.user.iter().chain(self.system.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_tiers() {
        let catalog = ReclaimPathCatalog::standard(Path::new("/Users/me"));
        assert_eq!(catalog.user_paths().len(), USER_LIBRARY_PATHS.len());
        assert_eq!(
            catalog.user_paths()[0].path,
            PathBuf::from("/Users/me/Library/Caches")
        );
        let system: Vec<_> = catalog.system_paths().iter().map(|p| p.path.clone()).collect();
        assert_eq!(
            system,
            vec![PathBuf::from("/Library/Caches"), PathBuf::from("/Library/Logs")]
        );
    }

    #[test]
    fn test_iter_puts_user_tier_first() {
        let catalog = ReclaimPathCatalog::from_paths([
            ReclaimPath::system("/Library/Logs"),
            ReclaimPath::user("/tmp/a"),
        ]);
        let tiers: Vec<_> = catalog.iter().map(|p| p.tier).collect();
        assert_eq!(tiers, vec![Tier::User, Tier::System]);
    }

    #[test]
    fn test_duplicates_ignored() {
        let mut catalog = ReclaimPathCatalog::default();
        catalog.push(ReclaimPath::user("/tmp/a"));
        catalog.push(ReclaimPath::user("/tmp/a"));
        assert_eq!(catalog.user_paths().len(), 1);
    }

    #[test]
    fn test_unsafe_roots_dropped() {
        let Some(home) = dirs::home_dir() else { return };
        let catalog = ReclaimPathCatalog::from_paths([
            ReclaimPath::user(home.join("Documents")),
            ReclaimPath::user(home.clone()),
            ReclaimPath::user("relative/cache"),
            ReclaimPath::user("/"),
            ReclaimPath::user("/tmp/mole-extra"),
            ReclaimPath::system("/etc"),
            ReclaimPath::system("/Library/Logs"),
        ]);
        let user: Vec<_> = catalog.user_paths().iter().map(|p| p.path.clone()).collect();
        let system: Vec<_> = catalog.system_paths().iter().map(|p| p.path.clone()).collect();
        assert_eq!(user, vec![PathBuf::from("/tmp/mole-extra")]);
        assert_eq!(system, vec![PathBuf::from("/Library/Logs")]);
    }

    #[test]
    fn test_extras_expand_tilde() {
        let Some(home) = dirs::home_dir() else { return };
        let catalog = ReclaimPathCatalog::for_current_user(&[
            PathBuf::from("~/Library/Caches/Yarn"),
            PathBuf::from("~/Documents"),
        ]);
        let user: Vec<_> = catalog.user_paths().iter().map(|p| p.path.clone()).collect();
        assert!(user.contains(&home.join("Library/Caches/Yarn")));
        assert!(!user.contains(&home.join("Documents")));
        assert!(!user.iter().any(|p| p.starts_with("~")));
    }

    #[test]
    fn test_label() {
        assert_eq!(ReclaimPath::user("/Users/me/Library/Logs").label(), "Logs");
        assert_eq!(ReclaimPath::user("/").label(), "/");
    }
}
