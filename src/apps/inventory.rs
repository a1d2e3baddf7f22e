use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::detector;
use crate::common::errors::MoleError;
use crate::common::format;
use crate::scanner::walker;

/// An installed application bundle.
/// `icon` and `size` start empty and are filled in by the background pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppRecord {
    pub id: Uuid,
    pub name: String,
    pub path: PathBuf,
    pub icon: Option<PathBuf>,
    pub size: String,
    pub size_bytes: Option<u64>,
}

impl AppRecord {
    fn from_bundle(path: PathBuf) -> Option<Self> {
        let name = path.file_stem()?.to_string_lossy().into_owned();
        Some(Self {
            id: Uuid::new_v4(),
            name,
            path,
            icon: None,
            size: String::new(),
            size_bytes: None,
        })
    }
}

/// Mutations funnelled through the owning task
enum Command {
    Populate {
        records: Vec<AppRecord>,
        reply: oneshot::Sender<bool>,
    },
    Fill {
        id: Uuid,
        icon: Option<PathBuf>,
        size_bytes: Option<u64>,
    },
    Remove {
        id: Uuid,
        reply: oneshot::Sender<Option<AppRecord>>,
    },
    Barrier(oneshot::Sender<()>),
}

/// Single writer for the app list. Publishes every change on `published`.
async fn own_records(
    mut rx: mpsc::UnboundedReceiver<Command>,
    published: watch::Sender<Vec<AppRecord>>,
) {
    let mut records: Vec<AppRecord> = Vec::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Populate { records: fresh, reply } => {
                let applied = records.is_empty();
                if applied {
                    records = fresh;
                    published.send_replace(records.clone());
                }
                let _ = reply.send(applied);
            }
            Command::Fill {
                id,
                icon,
                size_bytes,
            } => {
                if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                    record.icon = icon;
                    record.size_bytes = size_bytes;
                    record.size = size_bytes
                        .map(format::format_size)
                        .unwrap_or_else(|| "Unknown".to_string());
                    published.send_replace(records.clone());
                }
            }
            Command::Remove { id, reply } => {
                let removed = records
                    .iter()
                    .position(|r| r.id == id)
                    .map(|idx| records.remove(idx));
                if removed.is_some() {
                    published.send_replace(records.clone());
                }
                let _ = reply.send(removed);
            }
            Command::Barrier(reply) => {
                let _ = reply.send(());
            }
        }
    }
    debug!("app inventory owner stopped");
}

/// List `.app` bundles directly under `dir`, sorted by name
pub fn list_bundles(dir: &Path) -> Result<Vec<AppRecord>, MoleError> {
    let entries = std::fs::read_dir(dir).map_err(|e| MoleError::io(dir, e))?;

    let mut records: Vec<AppRecord> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let visible = p
                .file_name()
                .map(|n| !n.to_string_lossy().starts_with('.'))
                .unwrap_or(false);
            visible && p.extension().and_then(|e| e.to_str()) == Some("app")
        })
        .filter_map(AppRecord::from_bundle)
        .collect();

    records.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(records)
}

/// Installed applications, discovered once per process.
///
/// Cloning shares the same list. Must be created inside a Tokio runtime.
#[derive(Debug, Clone)]
pub struct ApplicationInventory {
    dir: PathBuf,
    fanout: usize,
    tx: mpsc::UnboundedSender<Command>,
    apps: watch::Receiver<Vec<AppRecord>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Populate { records, .. } => write!(f, "Populate({})", records.len()),
            Command::Fill { id, .. } => write!(f, "Fill({})", id),
            Command::Remove { id, .. } => write!(f, "Remove({})", id),
            Command::Barrier(_) => write!(f, "Barrier"),
        }
    }
}

impl ApplicationInventory {
    pub fn spawn(dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (published, apps) = watch::channel(Vec::new());
        tokio::spawn(own_records(rx, published));
        Self {
            dir: dir.into(),
            fanout: num_cpus::get().max(1),
            tx,
            apps,
        }
    }

    /// Cap on concurrent size/icon tasks
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current snapshot of the list
    pub fn apps(&self) -> Vec<AppRecord> {
        self.apps.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<AppRecord>> {
        self.apps.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<AppRecord> {
        self.apps.borrow().iter().find(|r| r.id == id).cloned()
    }

    /// Case-insensitive partial match on app name
    pub fn find_by_name(&self, name: &str) -> Vec<AppRecord> {
        let lower = name.to_lowercase();
        self.apps
            .borrow()
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&lower))
            .cloned()
            .collect()
    }

    fn send(&self, command: Command) -> Result<(), MoleError> {
        self.tx.send(command).map_err(|_| MoleError::Other {
            message: "app inventory is no longer running".to_string(),
        })
    }

    /// Discover bundles. Returns at once if the list is already populated.
    ///
    /// The bare list is published before any sizing starts; icons and
    /// sizes then land one record at a time.
    pub async fn scan(&self) -> Result<usize, MoleError> {
        let populated = self.apps.borrow().len();
        if populated > 0 {
            return Ok(populated);
        }

        let dir = self.dir.clone();
        let records = tokio::task::spawn_blocking(move || list_bundles(&dir))
            .await
            .map_err(|e| MoleError::Other {
                message: format!("app listing panicked: {}", e),
            })??;
        let count = records.len();

        let (reply, applied) = oneshot::channel();
        self.send(Command::Populate {
            records: records.clone(),
            reply,
        })?;
        if !applied.await.unwrap_or(false) {
            debug!("inventory populated concurrently, skipping refresh");
            let populated = self.apps.borrow().len();
            return Ok(populated);
        }
        info!(count, dir = %self.dir.display(), "applications listed");

        let mut fills = stream::iter(records.into_iter().map(|record| async move {
            let path = record.path.clone();
            let measured = tokio::task::spawn_blocking(move || {
                (detector::resolve_icon(&path), walker::dir_size(&path))
            })
            .await;
            match measured {
                Ok((icon, bytes)) => (record.id, icon, Some(bytes)),
                Err(e) => {
                    warn!(app = %record.name, error = %e, "sizing task failed");
                    (record.id, None, None)
                }
            }
        }))
        .buffer_unordered(self.fanout);

        while let Some((id, icon, size_bytes)) = fills.next().await {
            self.send(Command::Fill {
                id,
                icon,
                size_bytes,
            })?;
        }

        let (done, settled) = oneshot::channel();
        self.send(Command::Barrier(done))?;
        let _ = settled.await;
        Ok(count)
    }

    /// Drop a record by identity, returning it if it was present
    pub async fn remove(&self, id: Uuid) -> Result<Option<AppRecord>, MoleError> {
        let (reply, removed) = oneshot::channel();
        self.send(Command::Remove { id, reply })?;
        Ok(removed.await.unwrap_or(None))
    }
}
