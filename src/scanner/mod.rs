pub mod catalog;
pub mod walker;

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::common::format;
use crate::signals::Signals;
use catalog::ReclaimPathCatalog;

/// Progress label cadence when none is configured
pub const DEFAULT_PROGRESS_EVERY: usize = 200;

const LABEL_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Scanning,
    Done,
}

/// Outcome of one accounting pass. Rebuilt on every scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub total_bytes: u64,
    pub entries_visited: usize,
    pub label: String,
    pub duration_secs: f64,
}

/// Walks the reclaim catalog and tallies how many bytes could be freed.
///
/// Best effort: unreadable entries are skipped and no error ever reaches
/// the caller.
#[derive(Debug, Clone)]
pub struct ScanEngine {
    catalog: ReclaimPathCatalog,
    signals: Signals,
    progress_every: usize,
    phase: Arc<watch::Sender<ScanPhase>>,
}

impl ScanEngine {
    pub fn new(catalog: ReclaimPathCatalog, signals: Signals) -> Self {
        Self {
            catalog,
            signals,
            progress_every: DEFAULT_PROGRESS_EVERY,
            phase: Arc::new(watch::channel(ScanPhase::Idle).0),
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ScanPhase> {
        self.phase.subscribe()
    }

    pub fn catalog(&self) -> &ReclaimPathCatalog {
        &self.catalog
    }

    /// Run a full scan: user tier first, then system tier
    pub async fn start_scan(&self) -> ScanResult {
        let start = Instant::now();
        self.phase.send_replace(ScanPhase::Scanning);
        self.signals.set_busy(true);
        self.signals.set_bytes(0);

        let mut total: u64 = 0;
        let mut visited: usize = 0;

        for reclaim in self.catalog.iter() {
            if !reclaim.path.exists() {
                continue;
            }
            debug!(path = %reclaim.path.display(), tier = %reclaim.tier, "scanning root");
            self.signals.log(format!("Scanning {}...", reclaim.label()));

            let (tx, mut rx) = mpsc::channel(LABEL_BUFFER);
            let root = reclaim.path.clone();
            let every = self.progress_every;
            let walk = tokio::task::spawn_blocking(move || tally_root(&root, every, &tx));

            while let Some(label) = rx.recv().await {
                self.signals.log(label);
            }
            match walk.await {
                Ok((bytes, seen)) => {
                    total += bytes;
                    visited += seen;
                }
                Err(e) => warn!(path = %reclaim.path.display(), error = %e, "walk aborted"),
            }
        }

        let label = "Scan Complete".to_string();
        self.signals.set_bytes(total);
        self.signals.log(label.clone());
        self.signals.set_busy(false);
        self.phase.send_replace(ScanPhase::Done);

        let result = ScanResult {
            total_bytes: total,
            entries_visited: visited,
            label,
            duration_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            bytes = result.total_bytes,
            entries = result.entries_visited,
            "scan finished"
        );
        result
    }
}

/// Sum regular-file bytes under `root` on a blocking thread, sending a
/// progress label every `every` entries. Returns bytes and entries seen.
fn tally_root(root: &Path, every: usize, labels: &mpsc::Sender<String>) -> (u64, usize) {
    let mut total: u64 = 0;
    let mut visited: usize = 0;

    for entry in walker::enumerate(root) {
        visited += 1;
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // permission-denied and races are expected, never fatal
                trace!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        // a closed channel means the scan itself was dropped
        if visited % every == 0
            && labels
                .blocking_send(format::progress_label(&entry.path))
                .is_err()
        {
            break;
        }

        total += entry.size.unwrap_or(0);
    }
    (total, visited)
}
