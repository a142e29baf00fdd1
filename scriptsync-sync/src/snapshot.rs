//! Last-pulled site snapshot.
//!
//! The raw payload from the most recent pull, stored at
//! `<home>/.scriptsync/sites/<site>/snapshot.json`. It only serves to restore
//! fields a hand-edited file leaves out, so readers that merely want those
//! fields use [`known_remote_at`], which never fails.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scriptsync_core::{config, persist, ScriptId, ScriptRecord, ScriptVariant, SiteId};

use crate::error::{io_err, SyncError};
use crate::remote::SitePayload;

/// `<home>/.scriptsync/sites/<site>/snapshot.json`
pub fn snapshot_path_at(home: &Path, site: SiteId) -> PathBuf {
    config::site_dir_at(home, site).join("snapshot.json")
}

/// Load the snapshot. `None` if no pull has happened yet.
pub fn load_at(home: &Path, site: SiteId) -> Result<Option<SitePayload>, SyncError> {
    let path = snapshot_path_at(home, site);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| SyncError::Snapshot { path, source })
}

/// Save the snapshot atomically.
pub fn save_at(home: &Path, site: SiteId, payload: &SitePayload) -> Result<(), SyncError> {
    let path = snapshot_path_at(home, site);
    let json = serde_json::to_string_pretty(payload)?;
    persist::write_atomic(&path, json.as_bytes()).map_err(|e| io_err(&path, e))
}

/// Previously pulled records, keyed by id, per variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownRemote {
    pub server: BTreeMap<ScriptId, ScriptRecord>,
    pub client: BTreeMap<ScriptId, ScriptRecord>,
}

impl KnownRemote {
    /// Index a payload. Scripts without a usable id are skipped.
    pub fn from_payload(payload: &SitePayload) -> Result<Self, SyncError> {
        let mut known = KnownRemote::default();
        for variant in ScriptVariant::all() {
            for record in payload.records(*variant)? {
                if let Some(id) = record.id {
                    known.for_variant_mut(*variant).insert(id, record);
                }
            }
        }
        Ok(known)
    }

    pub fn for_variant(&self, variant: ScriptVariant) -> &BTreeMap<ScriptId, ScriptRecord> {
        match variant {
            ScriptVariant::Server => &self.server,
            ScriptVariant::Client => &self.client,
        }
    }

    fn for_variant_mut(&mut self, variant: ScriptVariant) -> &mut BTreeMap<ScriptId, ScriptRecord> {
        match variant {
            ScriptVariant::Server => &mut self.server,
            ScriptVariant::Client => &mut self.client,
        }
    }
}

/// Snapshot records for layering. Any read or parse failure is logged and
/// treated as "no snapshot".
pub fn known_remote_at(home: &Path, site: SiteId) -> KnownRemote {
    let loaded = load_at(home, site).and_then(|payload| match payload {
        Some(payload) => KnownRemote::from_payload(&payload),
        None => Ok(KnownRemote::default()),
    });
    match loaded {
        Ok(known) => known,
        Err(err) => {
            tracing::warn!("ignoring snapshot for site {site}: {err}");
            KnownRemote::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn payload() -> SitePayload {
        serde_json::from_value(json!({
            "Title": "Orders",
            "ReferenceType": "Results",
            "ServerScripts": [{"Id": 1, "Title": "A", "Body": "a();", "BeforeCreate": true}],
            "ClientScripts": [
                {"Id": 2, "Title": "B", "Body": "b();", "All": true},
                {"Title": "no id"}
            ]
        }))
        .expect("payload")
    }

    #[test]
    fn missing_snapshot_is_none() {
        let home = TempDir::new().unwrap();
        assert!(load_at(home.path(), SiteId(1)).unwrap().is_none());
        assert_eq!(known_remote_at(home.path(), SiteId(1)), KnownRemote::default());
    }

    #[test]
    fn save_then_index_by_id() {
        let home = TempDir::new().unwrap();
        save_at(home.path(), SiteId(1), &payload()).unwrap();
        let known = known_remote_at(home.path(), SiteId(1));
        assert_eq!(known.server.len(), 1);
        assert_eq!(known.client.len(), 1);
        assert_eq!(known.client[&ScriptId(2)].title, "B");
    }

    #[test]
    fn malformed_snapshot_is_an_error_but_known_remote_swallows_it() {
        let home = TempDir::new().unwrap();
        let path = snapshot_path_at(home.path(), SiteId(1));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{oops").unwrap();

        assert!(matches!(load_at(home.path(), SiteId(1)), Err(SyncError::Snapshot { .. })));
        assert_eq!(known_remote_at(home.path(), SiteId(1)), KnownRemote::default());
    }
}
