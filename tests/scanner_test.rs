use std::path::Path;
use tempfile::TempDir;

use mole::common::format;
use mole::scanner::catalog::{ReclaimPath, ReclaimPathCatalog, Tier};
use mole::scanner::{walker, ScanEngine, ScanPhase};
use mole::signals::Signals;

fn fill(dir: &Path, prefix: &str, count: usize, len: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        std::fs::write(dir.join(format!("{}{}", prefix, i)), vec![b'x'; len]).unwrap();
    }
}

// ─── Format tests ─────────────────────────────────────────────────────────────

#[test]
fn test_format_size_boundaries() {
    assert_eq!(format::format_size(0), "0 B");
    assert_eq!(format::format_size(1023), "1023 B");
    assert_eq!(format::format_size(1024), "1.0 KB");
    assert_eq!(format::format_size(1024 * 1024), "1.00 MB");
    let result = format::format_size(u64::MAX);
    assert!(result.contains("TB"));
}

#[test]
fn test_progress_label_uses_home_tilde() {
    if let Some(home) = dirs::home_dir() {
        let label = format::progress_label(&home.join("Library/Caches/x"));
        assert_eq!(label, "~/Library/Caches/x");
    }
}

#[test]
fn test_progress_label_shortens_long_paths() {
    let label = format::progress_label(Path::new(
        "/Library/Caches/com.apple.bird/session/containers/deep/file.db",
    ));
    assert_eq!(label.chars().count(), 43);
    assert!(label.starts_with("/Library/Caches"));
    assert!(label.ends_with("containers/deep/file.db"));
}

// ─── Catalog tests ────────────────────────────────────────────────────────────

#[test]
fn test_standard_catalog_tiers() {
    let catalog = ReclaimPathCatalog::standard(Path::new("/Users/test"));
    assert!(catalog
        .user_paths()
        .iter()
        .all(|p| p.tier == Tier::User && p.path.starts_with("/Users/test/Library")));
    let system: Vec<_> = catalog.system_paths().iter().map(|p| p.path.clone()).collect();
    assert_eq!(
        system,
        vec![
            Path::new("/Library/Caches").to_path_buf(),
            Path::new("/Library/Logs").to_path_buf()
        ]
    );
    // user tier is always visited first
    assert_eq!(catalog.iter().next().map(|p| p.tier), Some(Tier::User));
}

// ─── Scan tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scan_counts_visible_files_only() {
    let tmp = TempDir::new().unwrap();
    let caches = tmp.path().join("Caches");
    let logs = tmp.path().join("Logs");
    fill(&caches, "c", 100, 1);
    fill(&logs, "l", 250, 2);
    fill(&caches, ".hidden", 50, 1000);

    // bundle internals are never counted
    let bundle = logs.join("Helper.app/Contents/MacOS");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(bundle.join("Helper"), vec![0u8; 4096]).unwrap();

    let signals = Signals::new();
    let engine = ScanEngine::new(
        ReclaimPathCatalog::from_paths([ReclaimPath::user(&caches), ReclaimPath::user(&logs)]),
        signals.clone(),
    );
    let result = engine.start_scan().await;

    assert_eq!(result.total_bytes, 100 + 250 * 2);
    // 350 files plus the bundle directory itself
    assert_eq!(result.entries_visited, 351);
    assert_eq!(result.label, "Scan Complete");
    assert_eq!(signals.bytes(), 600);
    assert_eq!(signals.last_log(), "Scan Complete");
    assert_eq!(engine.phase(), ScanPhase::Done);
}

#[tokio::test]
async fn test_scan_total_excludes_hidden_file() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("Caches");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("a.bin"), vec![0u8; 100]).unwrap();
    std::fs::write(root.join("b.bin"), vec![0u8; 250]).unwrap();
    std::fs::write(root.join(".DS_Store"), vec![0u8; 50]).unwrap();

    let engine = ScanEngine::new(
        ReclaimPathCatalog::from_paths([ReclaimPath::user(&root)]),
        Signals::new(),
    );
    let result = engine.start_scan().await;

    assert_eq!(result.total_bytes, 350);
    assert_eq!(result.entries_visited, 2);
}

#[tokio::test]
async fn test_scan_skips_missing_roots() {
    let tmp = TempDir::new().unwrap();
    fill(&tmp.path().join("present"), "f", 3, 10);

    let engine = ScanEngine::new(
        ReclaimPathCatalog::from_paths([
            ReclaimPath::user(tmp.path().join("absent")),
            ReclaimPath::user(tmp.path().join("present")),
        ]),
        Signals::new(),
    );
    let result = engine.start_scan().await;
    assert_eq!(result.total_bytes, 30);
    assert_eq!(result.entries_visited, 3);
}

#[tokio::test]
async fn test_scan_is_repeatable() {
    let tmp = TempDir::new().unwrap();
    fill(tmp.path(), "f", 4, 5);

    let engine = ScanEngine::new(
        ReclaimPathCatalog::from_paths([ReclaimPath::user(tmp.path())]),
        Signals::new(),
    );
    let first = engine.start_scan().await;
    std::fs::write(tmp.path().join("extra"), vec![0u8; 7]).unwrap();
    let second = engine.start_scan().await;

    assert_eq!(first.total_bytes, 20);
    assert_eq!(second.total_bytes, 27);
}

#[test]
fn test_walker_is_lazy() {
    let tmp = TempDir::new().unwrap();
    fill(tmp.path(), "f", 10, 1);
    let mut entries = walker::enumerate(tmp.path());
    // pulling one entry does not require walking the rest
    assert!(entries.next().is_some());
    assert_eq!(entries.count(), 9);
}
