//! Operator pins: one chosen variant per fingerprint prefix.
//!
//! Each pin is a small JSON file `{path, responseKey}` named after the
//! base64url encoding of the prefix array's JSON. A pin only references a
//! variant by key; when that variant is gone the pin is ignored. Lookups are
//! served from memory after the first read of each prefix.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fingerprint::Fingerprint;
use crate::recording::{Record, VariantStore};

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Selection I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Selection encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub path: Vec<String>,
    pub response_key: String,
}

/// Storage key for a prefix: base64url (no padding) of its compact JSON.
pub fn selection_key(prefix: &[String]) -> String {
    // Serializing a list of strings cannot fail.
    let json = serde_json::to_string(prefix).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json.as_bytes())
}

pub struct SelectionStore {
    dir: PathBuf,
    /// Selection key -> pinned response key, `None` caching "no pin".
    cache: RwLock<HashMap<String, Option<String>>>,
}

impl SelectionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, prefix: &[String]) -> PathBuf {
        self.dir.join(format!("{}.json", selection_key(prefix)))
    }

    pub fn set_selection(
        &self,
        prefix: &[String],
        response_key: &str,
    ) -> Result<(), SelectionError> {
        fs::create_dir_all(&self.dir)?;
        let selection = Selection {
            path: prefix.to_vec(),
            response_key: response_key.to_string(),
        };
        let json = serde_json::to_string_pretty(&selection)?;
        fs::write(self.file_for(prefix), json)?;
        self.cache
            .write()
            .insert(selection_key(prefix), Some(response_key.to_string()));
        debug!("Pinned variant for [{}]", prefix.join(", "));
        Ok(())
    }

    /// Pinned response key for a prefix. Unreadable or corrupt pin files
    /// count as no pin.
    pub fn get_selection(&self, prefix: &[String]) -> Option<String> {
        let key = selection_key(prefix);
        if let Some(cached) = self.cache.read().get(&key) {
            return cached.clone();
        }
        let pinned = self.read_pin(prefix);
        self.cache.write().insert(key, pinned.clone());
        pinned
    }

    fn read_pin(&self, prefix: &[String]) -> Option<String> {
        let path = self.file_for(prefix);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read selection {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<Selection>(&contents) {
            Ok(selection) => Some(selection.response_key),
            Err(e) => {
                warn!("Ignoring corrupt selection {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remove a pin. Returns whether one existed.
    pub fn clear_selection(&self, prefix: &[String]) -> Result<bool, SelectionError> {
        self.cache.write().insert(selection_key(prefix), None);
        match fs::remove_file(self.file_for(prefix)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// The pinned record for a fingerprint, if the pin exists and still
    /// points at a recorded variant.
    pub fn find_selected_record(
        &self,
        fingerprint: &Fingerprint,
        store: &VariantStore,
    ) -> Option<Record> {
        let prefix = fingerprint.prefix();
        let key = self.get_selection(&prefix)?;
        let record = store.get_variant(&prefix, &key);
        if record.is_none() {
            debug!("Selection for [{}] is dangling", prefix.join(", "));
        }
        record
    }

    pub fn is_selected(&self, prefix: &[String], response_key: &str) -> bool {
        self.get_selection(prefix).as_deref() == Some(response_key)
    }
}
