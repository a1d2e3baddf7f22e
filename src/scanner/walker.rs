use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Directory extensions that macOS presents as a single item.
/// Their contents are never descended into.
const BUNDLE_EXTENSIONS: &[&str] = &[
    "app",
    "framework",
    "bundle",
    "plugin",
    "kext",
    "xpc",
    "appex",
    "prefPane",
    "qlgenerator",
    "mdimporter",
    "photoslibrary",
];

/// A visited filesystem entry
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: PathBuf,
    /// Byte length for regular files, `None` for directories and bundles
    pub size: Option<u64>,
}

#[derive(Debug, Error)]
pub enum EnumError {
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("cannot stat '{}': {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

fn is_visible(entry: &DirEntry) -> bool {
    entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
}

/// True for a directory with a bundle extension
pub fn is_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| BUNDLE_EXTENSIONS.iter().any(|b| b.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Lazy walk under a root that skips hidden entries and treats bundles
/// as opaque leaves. The root itself is not yielded.
pub struct Entries {
    inner: walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
}

impl Iterator for Entries {
    type Item = Result<Entry, EnumError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if entry.depth() == 0 {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if is_bundle(entry.path()) {
                    self.inner.skip_current_dir();
                }
                return Some(Ok(Entry {
                    path: entry.into_path(),
                    size: None,
                }));
            }

            let size = if file_type.is_file() {
                match entry.metadata() {
                    Ok(m) => Some(m.len()),
                    Err(source) => {
                        return Some(Err(EnumError::Metadata {
                            path: entry.into_path(),
                            source,
                        }))
                    }
                }
            } else {
                None
            };
            return Some(Ok(Entry {
                path: entry.into_path(),
                size,
            }));
        }
    }
}

/// Enumerate everything reclaimable under `root`.
///
/// Errors are yielded, not raised; size accounting drops them on purpose
/// because permission-denied and vanished files are routine here.
pub fn enumerate(root: &Path) -> Entries {
    Entries {
        inner: WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(is_visible as fn(&DirEntry) -> bool),
    }
}

/// Total bytes of all readable regular files under `path`, bundle
/// internals included. Unreadable entries count as zero.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .sum()
}

/// Size of a single entry: file length, or recursive size for a directory
pub fn entry_size(path: &Path) -> u64 {
    match std::fs::symlink_metadata(path) {
        Ok(m) if m.is_dir() => dir_size(path),
        Ok(m) => m.len(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, vec![b'x'; len]).unwrap();
    }

    #[test]
    fn test_enumerate_skips_hidden_and_bundle_internals() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(&root.join("a.log"), 10);
        write(&root.join(".hidden"), 99);
        write(&root.join(".git/objects/blob"), 99);
        write(&root.join("Foo.app/Contents/MacOS/Foo"), 99);
        write(&root.join("sub/b.log"), 5);

        let paths: Vec<_> = enumerate(root)
            .filter_map(|e| e.ok())
            .map(|e| e.path.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert!(paths.contains(&PathBuf::from("a.log")));
        assert!(paths.contains(&PathBuf::from("sub/b.log")));
        assert!(paths.contains(&PathBuf::from("Foo.app")));
        assert!(!paths.iter().any(|p| p.starts_with("Foo.app/Contents")));
        assert!(!paths.iter().any(|p| p.to_string_lossy().contains(".git")));
        assert!(!paths.contains(&PathBuf::from(".hidden")));
    }

    #[test]
    fn test_enumerate_missing_root_yields_error() {
        let tmp = TempDir::new().unwrap();
        let results: Vec<_> = enumerate(&tmp.path().join("nope")).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_dir_size_includes_everything() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("Foo.app/Contents/MacOS/Foo"), 100);
        write(&tmp.path().join("Foo.app/Contents/.hidden"), 20);
        assert_eq!(dir_size(&tmp.path().join("Foo.app")), 120);
    }

    #[test]
    fn test_entry_size() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("f"), 7);
        write(&tmp.path().join("d/g"), 3);
        assert_eq!(entry_size(&tmp.path().join("f")), 7);
        assert_eq!(entry_size(&tmp.path().join("d")), 3);
        assert_eq!(entry_size(&tmp.path().join("missing")), 0);
    }

    #[test]
    fn test_is_bundle() {
        assert!(is_bundle(Path::new("/Applications/Safari.app")));
        assert!(is_bundle(Path::new("/Library/Frameworks/Foo.framework")));
        assert!(!is_bundle(Path::new("/Users/me/Library/Caches")));
    }
}
