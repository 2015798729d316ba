//! Debounced snapshot writer for the variant store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, trace};

use super::store::VariantStore;

/// Quiet period after the last mutation before the snapshot is written.
pub const SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

/// Writes the variant store to its snapshot file.
///
/// Every [`Persister::schedule_save`] restarts the debounce window; only the
/// most recent request flushes. [`Persister::force_save`] cancels anything
/// pending and writes immediately. Failures are logged, never returned to
/// request handlers.
pub struct Persister {
    store: Arc<VariantStore>,
    path: PathBuf,
    delay: Duration,
    generation: AtomicU64,
    write_lock: Mutex<()>,
}

impl Persister {
    pub fn new(store: Arc<VariantStore>, path: impl Into<PathBuf>) -> Arc<Self> {
        Self::with_delay(store, path, SAVE_DEBOUNCE)
    }

    pub fn with_delay(
        store: Arc<VariantStore>,
        path: impl Into<PathBuf>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            path: path.into(),
            delay,
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Request a save after the debounce window.
    pub fn schedule_save(self: &Arc<Self>) {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Ok(handle) = Handle::try_current() else {
            // No runtime to defer on (CLI tools, plain unit tests).
            self.flush();
            return;
        };
        let persister = Arc::clone(self);
        handle.spawn(async move {
            tokio::time::sleep(persister.delay).await;
            if persister.generation.load(Ordering::SeqCst) != ticket {
                trace!("Debounced save superseded");
                return;
            }
            let writer = Arc::clone(&persister);
            if let Err(e) = tokio::task::spawn_blocking(move || writer.flush()).await {
                error!("Snapshot writer task failed: {}", e);
            }
        });
    }

    /// Cancel pending saves and write now.
    pub fn force_save(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.flush()
    }

    fn flush(&self) -> bool {
        let _guard = self.write_lock.lock();
        match self.store.save_to_file(&self.path) {
            Ok(()) => {
                debug!(
                    "Persisted {} variants to {}",
                    self.store.variant_count(),
                    self.path.display()
                );
                true
            }
            Err(e) => {
                error!("Failed to save {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::recording::types::Record;

    fn store_with_one() -> Arc<VariantStore> {
        let store = Arc::new(VariantStore::new());
        let fp = Fingerprint::derive("GET", "/a", b"");
        store.put_variant(&fp, "a", Record::new("a", 200));
        store
    }

    #[test]
    fn test_force_save_writes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorded_data.json");
        let persister = Persister::new(store_with_one(), &path);

        assert!(persister.force_save());
        let loaded = VariantStore::new();
        assert_eq!(loaded.load_from_file(&path).unwrap(), 1);
    }

    #[test]
    fn test_schedule_without_runtime_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorded_data.json");
        let persister = Persister::new(store_with_one(), &path);

        persister.schedule_save();
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorded_data.json");
        let persister = Persister::new(store_with_one(), &path);

        persister.schedule_save();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!path.exists());

        persister.schedule_save();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!path.exists(), "second schedule restarts the window");

        tokio::time::sleep(Duration::from_millis(600)).await;
        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_cancels_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorded_data.json");
        let store = store_with_one();
        let persister = Persister::new(store.clone(), &path);

        persister.schedule_save();
        assert!(persister.force_save());
        std::fs::remove_file(&path).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert!(!path.exists());
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let persister = Persister::new(store_with_one(), blocker.join("recorded_data.json"));
        assert!(!persister.force_save());
    }
}
