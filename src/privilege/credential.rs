use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

/// An administrator secret. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Credential(secret.into())
    }

    /// The raw secret, for writing to an elevation helper's stdin only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Process-wide cache of the admin credential, shared by every engine
/// that needs elevation.
///
/// State is `Unset` or `Cached`. Any failed elevated execution moves it
/// back to `Unset` via [`CredentialStore::clear`] and raises the
/// needs-authorization signal.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    cached: Mutex<Option<Credential>>,
    path: PathBuf,
    persist: bool,
    needs_authorization: watch::Sender<bool>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.inner.path)
            .field("cached", &self.is_cached())
            .finish()
    }
}

impl CredentialStore {
    /// An empty store backed by `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>, persist: bool) -> Self {
        let (tx, _rx) = watch::channel(false);
        CredentialStore {
            inner: Arc::new(Inner {
                cached: Mutex::new(None),
                path: path.into(),
                persist,
                needs_authorization: tx,
            }),
        }
    }

    /// A store primed from its persisted file, as done at startup
    pub fn open(path: impl Into<PathBuf>, persist: bool) -> Self {
        let store = Self::new(path, persist);
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credential>> {
        self.inner
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the persisted secret. Absence is normal and yields `None`.
    pub fn load(&self) -> Option<Credential> {
        let secret = std::fs::read_to_string(&self.inner.path).ok()?;
        let credential = Credential::new(secret);
        *self.lock() = Some(credential.clone());
        debug!(path = %self.inner.path.display(), "loaded persisted credential");
        Some(credential)
    }

    /// Cache the secret and persist it with owner-only permissions.
    /// Persistence failures are logged; the in-memory copy still stands.
    pub fn save(&self, credential: Credential) {
        *self.lock() = Some(credential.clone());
        if !self.inner.persist {
            return;
        }
        if let Err(e) = write_owner_only(&self.inner.path, credential.expose()) {
            warn!(
                path = %self.inner.path.display(),
                error = %e,
                "failed to persist credential, keeping it in memory only"
            );
        }
    }

    /// Supply a credential out of band and lift the authorization pause
    pub fn set(&self, credential: Credential) {
        self.save(credential);
        self.inner.needs_authorization.send_replace(false);
    }

    /// The in-memory credential, if any
    pub fn get(&self) -> Option<Credential> {
        self.lock().clone()
    }

    pub fn is_cached(&self) -> bool {
        self.lock().is_some()
    }

    /// Forget the credential in memory and on disk
    pub fn clear(&self) {
        *self.lock() = None;
        match std::fs::remove_file(&self.inner.path) {
            Ok(()) => debug!("removed persisted credential"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "failed to remove persisted credential"),
        }
    }

    /// Ask the caller for a credential before elevated work can continue
    pub fn request_authorization(&self) {
        self.inner.needs_authorization.send_replace(true);
    }

    pub fn needs_authorization(&self) -> bool {
        *self.inner.needs_authorization.borrow()
    }

    pub fn subscribe_authorization(&self) -> watch::Receiver<bool> {
        self.inner.needs_authorization.subscribe()
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, secret: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(secret.as_bytes())?;
    // mode() only applies on creation; tighten files that already existed
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, secret: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/.key");

        let store = CredentialStore::new(&path, true);
        store.save(Credential::new("  s3cr3t with spaces\n"));

        let fresh = CredentialStore::new(&path, true);
        assert_eq!(
            fresh.load().map(|c| c.expose().to_string()),
            Some("  s3cr3t with spaces\n".to_string())
        );
        assert!(fresh.is_cached());
    }

    #[test]
    fn test_clear_removes_memory_and_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".key");

        let store = CredentialStore::new(&path, true);
        store.save(Credential::new("hunter2"));
        assert!(path.exists());

        store.clear();
        assert!(store.get().is_none());
        assert!(!path.exists());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_missing_file_is_unset() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::open(tmp.path().join("absent"), true);
        assert!(!store.is_cached());
    }

    #[cfg(unix)]
    #[test]
    fn test_persisted_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".key");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        CredentialStore::new(&path, true).save(Credential::new("new"));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_only_store_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".key");
        let store = CredentialStore::new(&path, false);
        store.save(Credential::new("hunter2"));
        assert!(store.is_cached());
        assert!(!path.exists());
    }

    #[test]
    fn test_set_lifts_authorization_request() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join(".key"), false);
        store.request_authorization();
        assert!(store.needs_authorization());
        store.set(Credential::new("hunter2"));
        assert!(!store.needs_authorization());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Credential::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
