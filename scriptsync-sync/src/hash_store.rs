//! Hash store: SHA-256 of every script file as last synced.
//!
//! Persists a [`HashStoreFile`] at `<home>/.scriptsync/sites/<site>/hashes.json`.
//! Pull records what it wrote and push records what it sent, so a watcher
//! seeing those same bytes can tell nothing changed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use scriptsync_core::{config, persist, SiteId};

use crate::error::{io_err, SyncError};

/// Absolute file path string → SHA-256 hex digest.
pub type HashStore = BTreeMap<String, String>;

/// On-disk hash store payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashStoreFile {
    pub synced_at: DateTime<Utc>,
    pub files: HashStore,
}

/// `<home>/.scriptsync/sites/<site>/hashes.json`
pub fn store_path_at(home: &Path, site: SiteId) -> PathBuf {
    config::site_dir_at(home, site).join("hashes.json")
}

/// Key under which a path's digest is stored.
pub fn key_for(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// SHA-256 hex digest of `content`.
pub fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Load the hash store for `site`. Returns an empty store if the file does not yet exist.
pub fn load_at(home: &Path, site: SiteId) -> Result<HashStoreFile, SyncError> {
    let path = store_path_at(home, site);
    if !path.exists() {
        return Ok(HashStoreFile {
            synced_at: Utc::now(),
            files: HashStore::new(),
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the hash store for `site` atomically.
pub fn save_at(home: &Path, site: SiteId, store: &HashStoreFile) -> Result<(), SyncError> {
    let path = store_path_at(home, site);
    let json = serde_json::to_string_pretty(store)?;
    persist::write_atomic(&path, json.as_bytes()).map_err(|e| io_err(&path, e))
}
