//! Thread-safe variant store with snapshot load/save.

use parking_lot::RwLock;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::tree::{select_default, Removal, VariantTree};
use super::types::{Record, VariantMap};
use crate::fingerprint::Fingerprint;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Recording not found at {0}")]
    NotFound(String),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

fn not_found(path: &[String]) -> StoreError {
    StoreError::NotFound(format!("[{}]", path.join(", ")))
}

/// Recorded variants, guarded by a reader/writer lock so mutations are
/// serialized while lookups run concurrently.
#[derive(Default)]
pub struct VariantStore {
    tree: RwLock<VariantTree>,
}

impl VariantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: VariantTree) -> Self {
        Self {
            tree: RwLock::new(tree),
        }
    }

    /// Variants recorded for a fingerprint.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<VariantMap> {
        self.lookup_prefix(&fingerprint.prefix())
    }

    pub fn lookup_prefix(&self, prefix: &[String]) -> Option<VariantMap> {
        self.tree.read().variants_at(prefix)
    }

    pub fn get_variant(&self, prefix: &[String], key: &str) -> Option<Record> {
        self.tree.read().record_at(prefix, key).cloned()
    }

    /// The most recently created variant for a fingerprint.
    pub fn default_record(&self, fingerprint: &Fingerprint) -> Option<Record> {
        let variants = self.lookup(fingerprint)?;
        select_default(&variants).cloned()
    }

    /// Insert unless the response text is already recorded. Returns whether
    /// a variant was added.
    pub fn put_variant(&self, fingerprint: &Fingerprint, key: &str, record: Record) -> bool {
        self.tree
            .write()
            .put_variant(&fingerprint.prefix(), key, record)
    }

    pub fn upsert_variant(&self, prefix: &[String], key: &str, record: Record) {
        self.tree.write().upsert_variant(prefix, key, record);
    }

    pub fn delete_variant(&self, prefix: &[String], key: &str) -> Result<(), StoreError> {
        match self.tree.write().delete_variant(prefix, key) {
            Removal::Removed => Ok(()),
            Removal::NotFound => {
                let mut path = prefix.to_vec();
                path.push(key.to_string());
                Err(not_found(&path))
            }
        }
    }

    pub fn delete_at_path(&self, path: &[String]) -> Result<(), StoreError> {
        match self.tree.write().delete_at_path(path) {
            Removal::Removed => Ok(()),
            Removal::NotFound => Err(not_found(path)),
        }
    }

    pub fn replace_variant_key(
        &self,
        prefix: &[String],
        old_key: &str,
        new_text: &str,
    ) -> Result<(), StoreError> {
        match self
            .tree
            .write()
            .replace_variant_key(prefix, old_key, new_text)
        {
            Removal::Removed => Ok(()),
            Removal::NotFound => Err(not_found(prefix)),
        }
    }

    pub fn replace_record(
        &self,
        prefix: &[String],
        key: Option<&str>,
        record: Record,
    ) -> Result<(), StoreError> {
        match self.tree.write().replace_record(prefix, key, record) {
            Removal::Removed => Ok(()),
            Removal::NotFound => Err(not_found(prefix)),
        }
    }

    pub fn clear(&self) {
        self.tree.write().clear();
    }

    pub fn replace_all(&self, tree: VariantTree) {
        *self.tree.write() = tree;
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> VariantTree {
        self.tree.read().clone()
    }

    pub fn variant_count(&self) -> usize {
        self.tree.read().variant_count()
    }

    /// Replace the contents with the snapshot at `path`.
    ///
    /// A missing or empty file leaves the store empty and is not an error.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<usize, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(0);
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            debug!("Snapshot {} is empty, starting empty", path.display());
            return Ok(0);
        }
        let tree: VariantTree = serde_json::from_str(&contents)?;
        let count = tree.variant_count();
        self.replace_all(tree);
        info!("Loaded {} recorded variants from {}", count, path.display());
        Ok(count)
    }

    /// Write the whole tree to `path`, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        let json = {
            let tree = self.tree.read();
            serde_json::to_string_pretty(&*tree)?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, json)?;
        debug!("Saved recorded data to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_last_recorded_wins() {
        let store = VariantStore::new();
        let fp = Fingerprint::derive("GET", "/orders", b"");

        let mut a = Record::new("A", 200);
        a.created_at = Some(chrono::Utc::now() - chrono::Duration::seconds(10));
        store.put_variant(&fp, "A", a);
        store.put_variant(&fp, "B", Record::new("B", 200));

        assert_eq!(store.default_record(&fp).unwrap().response, "B");
        assert_eq!(store.lookup(&fp).unwrap().len(), 2);
    }

    #[test]
    fn test_lookup_unknown_fingerprint() {
        let store = VariantStore::new();
        let fp = Fingerprint::derive("GET", "/nothing", b"");
        assert!(store.lookup(&fp).is_none());
        assert!(store.default_record(&fp).is_none());
    }

    #[test]
    fn test_delete_errors_carry_not_found() {
        let store = VariantStore::new();
        let fp = Fingerprint::derive("GET", "/x", b"");
        let err = store.delete_variant(&fp.prefix(), "missing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(matches!(
            store.delete_at_path(&["GET".to_string()]),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recorded_data.json");

        let store = VariantStore::new();
        let fp = Fingerprint::derive("POST", "/login?x=1", br#"{"u":"a"}"#);
        store.put_variant(&fp, "token", Record::new("token", 200));
        store.save_to_file(&path).unwrap();

        let loaded = VariantStore::new();
        assert_eq!(loaded.load_from_file(&path).unwrap(), 1);
        assert_eq!(loaded.default_record(&fp).unwrap().response, "token");
    }

    #[test]
    fn test_load_missing_or_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = VariantStore::new();
        assert_eq!(store.load_from_file(dir.path().join("absent.json")).unwrap(), 0);

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "  \n").unwrap();
        assert_eq!(store.load_from_file(&empty).unwrap(), 0);
        assert_eq!(store.variant_count(), 0);
    }

    #[test]
    fn test_load_corrupt_file_keeps_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        fs::write(&path, "{ not json").unwrap();

        let store = VariantStore::new();
        let fp = Fingerprint::derive("GET", "/keep", b"");
        store.put_variant(&fp, "kept", Record::new("kept", 200));

        assert!(matches!(
            store.load_from_file(&path),
            Err(StoreError::Parse(_))
        ));
        assert_eq!(store.variant_count(), 1);
    }

    #[test]
    fn test_clear_and_replace_all() {
        let store = VariantStore::new();
        let fp = Fingerprint::derive("GET", "/a", b"");
        store.put_variant(&fp, "a", Record::new("a", 200));
        let snapshot = store.snapshot();

        store.clear();
        assert_eq!(store.variant_count(), 0);

        store.replace_all(snapshot);
        assert_eq!(store.variant_count(), 1);
    }
}
