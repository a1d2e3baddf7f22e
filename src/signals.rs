//! Published values observed by whatever front end drives the engines.

use std::sync::Arc;
use tokio::sync::watch;

/// Progress line, busy flag and byte count for one family of operations.
///
/// Cloning shares the same channels. Each write replaces the previous
/// value; observers see values in the order an operation produced them.
#[derive(Debug, Clone)]
pub struct Signals {
    log: Arc<watch::Sender<String>>,
    busy: Arc<watch::Sender<bool>>,
    bytes: Arc<watch::Sender<u64>>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl Signals {
    pub fn new() -> Self {
        Self {
            log: Arc::new(watch::channel(String::new()).0),
            busy: Arc::new(watch::channel(false).0),
            bytes: Arc::new(watch::channel(0).0),
        }
    }

    pub fn log(&self, line: impl Into<String>) {
        self.log.send_replace(line.into());
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.send_replace(busy);
    }

    pub fn set_bytes(&self, bytes: u64) {
        self.bytes.send_replace(bytes);
    }

    pub fn last_log(&self) -> String {
        self.log.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    pub fn bytes(&self) -> u64 {
        *self.bytes.borrow()
    }

    pub fn subscribe_log(&self) -> watch::Receiver<String> {
        self.log.subscribe()
    }

    pub fn subscribe_busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    pub fn subscribe_bytes(&self) -> watch::Receiver<u64> {
        self.bytes.subscribe()
    }

    /// Clear all values back to idle
    pub fn reset(&self) {
        self.log(String::new());
        self.set_busy(false);
        self.set_bytes(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_without_subscribers() {
        let signals = Signals::new();
        signals.log("Scanning Caches...");
        signals.set_busy(true);
        signals.set_bytes(42);
        assert_eq!(signals.last_log(), "Scanning Caches...");
        assert!(signals.is_busy());
        assert_eq!(signals.bytes(), 42);
    }

    #[tokio::test]
    async fn test_clones_share_channels() {
        let signals = Signals::new();
        let mut rx = signals.subscribe_log();
        signals.clone().log("Cleaned");
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "Cleaned");
    }
}
