use std::path::{Component, Path};

/// The only root-owned directories whose contents may be deleted with
/// elevated rights. Elevated delete commands are built from these
/// literals and nothing else.
pub const ALLOWED_SYSTEM_ROOTS: [&str; 2] = ["/Library/Caches", "/Library/Logs"];

/// Paths that must NEVER be deleted under any circumstances.
const PROTECTED_PATHS: &[&str] = &[
    "/",
    "/System",
    "/Applications",
    "/Users",
    "/Library",
    "/usr",
    "/bin",
    "/sbin",
    "/var",
    "/etc",
    "/opt",
    "/private",
    "/Volumes",
];

/// Paths under home that must never be deleted entirely
const PROTECTED_HOME_DIRS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Pictures",
    "Music",
    "Movies",
    "Library",
    "Applications",
    ".ssh",
    ".gnupg",
];

/// Check if a path is one of the allow-listed system roots
pub fn is_allowed_system_root(path: &Path) -> bool {
    ALLOWED_SYSTEM_ROOTS.iter().any(|root| path == Path::new(root))
}

/// Check if a path is protected and should NEVER be deleted
pub fn is_protected(path: &Path) -> bool {
    if PROTECTED_PATHS.iter().any(|p| path == Path::new(p)) {
        return true;
    }

    if let Some(home) = dirs::home_dir() {
        if path == home {
            return true;
        }
        if PROTECTED_HOME_DIRS.iter().any(|dir| path == home.join(dir)) {
            return true;
        }
    }

    false
}

/// Check that a user-tier root may have its contents swept.
///
/// The root must be absolute, free of `.`/`..`, not protected, and not
/// an ancestor of the home directory.
pub fn is_safe_user_root(path: &Path) -> bool {
    if !path.is_absolute() || is_protected(path) {
        return false;
    }
    if path
        .components()
        .any(|c| matches!(c, Component::CurDir | Component::ParentDir))
    {
        return false;
    }
    match dirs::home_dir() {
        Some(home) => !home.starts_with(path),
        None => true,
    }
}

/// Check that a bundle identifier can be used as a single path component.
///
/// Rejects separators, NUL, `.`/`..` and empty strings so a
/// hostile Info.plist cannot point residual lookups outside ~/Library.
pub fn is_safe_identifier(id: &str) -> bool {
    if id.is_empty() || id.len() > 255 {
        return false;
    }
    if id.contains('/') || id.contains('\\') || id.contains('\0') {
        return false;
    }
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !id.starts_with('.')
}

/// True when `path` is a direct child of `parent` with no `..` tricks
pub fn is_direct_child(path: &Path, parent: &Path) -> bool {
    path.parent() == Some(parent)
        && matches!(
            path.file_name().map(Path::new).and_then(|n| n.components().next()),
            Some(Component::Normal(_))
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_protected() {
        assert!(is_protected(Path::new("/")));
        assert!(is_protected(Path::new("/Library")));
    }

    #[test]
    fn test_home_dir_protected() {
        if let Some(home) = dirs::home_dir() {
            assert!(is_protected(&home));
            assert!(is_protected(&home.join("Library")));
            assert!(is_protected(&home.join(".ssh")));
        }
    }

    #[test]
    fn test_cache_dir_not_protected() {
        if let Some(home) = dirs::home_dir() {
            assert!(!is_protected(&home.join("Library/Caches/com.example.app")));
            assert!(!is_protected(&home.join("Library/Logs/old.log")));
        }
    }

    #[test]
    fn test_allow_list_is_exact() {
        assert!(is_allowed_system_root(Path::new("/Library/Caches")));
        assert!(is_allowed_system_root(Path::new("/Library/Logs")));
        assert!(!is_allowed_system_root(Path::new("/Library")));
        assert!(!is_allowed_system_root(Path::new("/Library/Caches/../..")));
        assert!(!is_allowed_system_root(Path::new("/System/Library/Caches")));
    }

    #[test]
    fn test_user_roots() {
        assert!(!is_safe_user_root(Path::new("~/Library/Caches")));
        assert!(!is_safe_user_root(Path::new("Library/Caches")));
        assert!(!is_safe_user_root(Path::new("/")));
        assert!(!is_safe_user_root(Path::new("/Users")));
        assert!(!is_safe_user_root(Path::new("/tmp/cache/../..")));
        assert!(is_safe_user_root(Path::new("/tmp/mole-cache")));
        if let Some(home) = dirs::home_dir() {
            assert!(!is_safe_user_root(&home));
            assert!(!is_safe_user_root(&home.join("Documents")));
            if let Some(parent) = home.parent() {
                assert!(!is_safe_user_root(parent));
            }
            assert!(is_safe_user_root(&home.join("Library/Caches")));
        }
    }

    #[test]
    fn test_identifiers() {
        assert!(is_safe_identifier("com.example.Foo"));
        assert!(is_safe_identifier("org.mozilla.firefox"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("."));
        assert!(!is_safe_identifier(".."));
        assert!(!is_safe_identifier("../../etc"));
        assert!(!is_safe_identifier("com/example"));
        assert!(!is_safe_identifier(".hidden"));
        assert!(!is_safe_identifier("a\0b"));
    }

    #[test]
    fn test_direct_child() {
        let parent = Path::new("/Users/me/Library/Caches");
        assert!(is_direct_child(&parent.join("com.example"), parent));
        assert!(!is_direct_child(&parent.join("a/b"), parent));
        assert!(!is_direct_child(&parent.join(".."), parent));
    }
}
