use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::common::safety;

/// Kinds of leftover files an application scatters under ~/Library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualKind {
    AppSupport,
    Cache,
    Preferences,
    SavedState,
    Container,
    WebKit,
    LaunchAgent,
    Logs,
}

impl ResidualKind {
    /// Every kind, in removal order
    pub const ALL: [ResidualKind; 8] = [
        ResidualKind::AppSupport,
        ResidualKind::Cache,
        ResidualKind::Preferences,
        ResidualKind::SavedState,
        ResidualKind::Container,
        ResidualKind::WebKit,
        ResidualKind::LaunchAgent,
        ResidualKind::Logs,
    ];

    /// Directory under ~/Library holding this kind
    pub fn subdir(self) -> &'static str {
        match self {
            ResidualKind::AppSupport => "Application Support",
            ResidualKind::Cache => "Caches",
            ResidualKind::Preferences => "Preferences",
            ResidualKind::SavedState => "Saved Application State",
            ResidualKind::Container => "Containers",
            ResidualKind::WebKit => "WebKit",
            ResidualKind::LaunchAgent => "LaunchAgents",
            ResidualKind::Logs => "Logs",
        }
    }

    /// Entry name for a bundle identifier
    pub fn file_name(self, bundle_id: &str) -> String {
        match self {
            ResidualKind::Preferences | ResidualKind::LaunchAgent => {
                format!("{}.plist", bundle_id)
            }
            ResidualKind::SavedState => format!("{}.savedState", bundle_id),
            _ => bundle_id.to_string(),
        }
    }
}

impl std::fmt::Display for ResidualKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResidualKind::AppSupport => write!(f, "App Support"),
            ResidualKind::Cache => write!(f, "Cache"),
            ResidualKind::Preferences => write!(f, "Preferences"),
            ResidualKind::SavedState => write!(f, "Saved State"),
            ResidualKind::Container => write!(f, "Container"),
            ResidualKind::WebKit => write!(f, "WebKit Data"),
            ResidualKind::LaunchAgent => write!(f, "Launch Agent"),
            ResidualKind::Logs => write!(f, "Logs"),
        }
    }
}

/// A possible leftover location for one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidualCandidate {
    pub kind: ResidualKind,
    pub path: PathBuf,
}

/// Every residual template filled in with `bundle_id`, existing or not.
///
/// Identifiers that are not a single plain path component produce no
/// candidates at all.
pub fn residual_candidates(library: &Path, bundle_id: &str) -> Vec<ResidualCandidate> {
    if !safety::is_safe_identifier(bundle_id) {
        warn!(bundle_id, "ignoring unsafe bundle identifier");
        return Vec::new();
    }

    ResidualKind::ALL
        .iter()
        .map(|&kind| ResidualCandidate {
            kind,
            path: library.join(kind.subdir()).join(kind.file_name(bundle_id)),
        })
        .filter(|c| safety::is_direct_child(&c.path, &library.join(c.kind.subdir())))
        .collect()
}

/// Residual candidates that are present on disk
pub fn existing_residuals(library: &Path, bundle_id: &str) -> Vec<ResidualCandidate> {
    residual_candidates(library, bundle_id)
        .into_iter()
        .filter(|c| c.path.symlink_metadata().is_ok())
        .collect()
}

fn info_plist(app_path: &Path) -> PathBuf {
    app_path.join("Contents/Info.plist")
}

/// Look up a string key in the bundle's Info.plist
fn plist_string(app_path: &Path, key: &str) -> Option<String> {
    let value = plist::Value::from_file(info_plist(app_path)).ok()?;
    value
        .as_dictionary()?
        .get(key)?
        .as_string()
        .map(|s| s.to_string())
}

/// Scrape `<key>KEY</key><string>VALUE</string>` out of an XML plist
/// that the structured parser rejected
fn scrape_plist_string(contents: &str, key: &str) -> Option<String> {
    let marker = format!("<key>{}</key>", key);
    let after_key = &contents[contents.find(&marker)? + marker.len()..];
    let open = after_key.find("<string>")?;
    // the value must be the next element, not one further down
    if !after_key[..open].trim().is_empty() {
        return None;
    }
    let value_start = open + "<string>".len();
    let value_len = after_key[value_start..].find("</string>")?;
    let value = after_key[value_start..value_start + value_len].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Resolve a bundle identifier: structured metadata first, then a raw
/// scan of the descriptor file. Unsafe identifiers resolve to `None`.
pub fn resolve_bundle_id(app_path: &Path) -> Option<String> {
    let id = plist_string(app_path, "CFBundleIdentifier").or_else(|| {
        debug!(app = %app_path.display(), "structured Info.plist read failed, scanning text");
        let raw = std::fs::read(info_plist(app_path)).ok()?;
        scrape_plist_string(&String::from_utf8_lossy(&raw), "CFBundleIdentifier")
    })?;

    if safety::is_safe_identifier(&id) {
        Some(id)
    } else {
        warn!(app = %app_path.display(), bundle_id = %id, "rejecting unsafe bundle identifier");
        None
    }
}

/// Locate the bundle's icon file, if it ships one
pub fn resolve_icon(app_path: &Path) -> Option<PathBuf> {
    let resources = app_path.join("Contents/Resources");
    let named = plist_string(app_path, "CFBundleIconFile")
        .filter(|name| safety::is_safe_identifier(name))
        .map(|name| {
            let file = resources.join(&name);
            if file.extension().is_some() {
                file
            } else {
                resources.join(format!("{}.icns", name))
            }
        });

    named
        .into_iter()
        .chain(std::iter::once(resources.join("AppIcon.icns")))
        .find(|p| p.is_file())
}
