//! In-memory [`ScriptStore`] used by tests and dry experiments.
//!
//! Applies batches the way the real store does: updates replace the script
//! with the same `Id` (fields merged), creates get the next free id, and
//! `Delete: 1` removes. Every batch received is recorded.

use std::collections::HashMap;
use std::sync::Mutex;

use scriptsync_core::{ScriptVariant, SiteId};

use crate::remote::{is_delete, wire_id, RemoteError, ScriptBatch, ScriptStore, SitePayload};

#[derive(Debug, Default)]
pub struct MemoryScriptStore {
    sites: Mutex<HashMap<SiteId, SitePayload>>,
    sent: Mutex<Vec<(SiteId, ScriptBatch)>>,
    fail_with: Mutex<Option<RemoteError>>,
}

impl MemoryScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a site's payload.
    pub fn put_site(&self, site: SiteId, payload: SitePayload) {
        lock(&self.sites).insert(site, payload);
    }

    /// Current payload of a site, if any.
    pub fn site(&self, site: SiteId) -> Option<SitePayload> {
        lock(&self.sites).get(&site).cloned()
    }

    /// Every batch received so far, oldest first.
    pub fn sent(&self) -> Vec<(SiteId, ScriptBatch)> {
        lock(&self.sent).clone()
    }

    /// Make every call fail with `err` until [`Self::recover`].
    pub fn fail_with(&self, err: RemoteError) {
        *lock(&self.fail_with) = Some(err);
    }

    pub fn recover(&self) {
        *lock(&self.fail_with) = None;
    }

    fn check_failure(&self) -> Result<(), RemoteError> {
        match lock(&self.fail_with).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ScriptStore for MemoryScriptStore {
    fn fetch_site(&self, site: SiteId) -> Result<SitePayload, RemoteError> {
        self.check_failure()?;
        self.site(site)
            .ok_or_else(|| RemoteError::NotFound(format!("site {site}")))
    }

    fn batch_update(&self, site: SiteId, batch: &ScriptBatch) -> Result<(), RemoteError> {
        self.check_failure()?;
        let mut sites = lock(&self.sites);
        let payload = sites
            .get_mut(&site)
            .ok_or_else(|| RemoteError::NotFound(format!("site {site}")))?;

        for variant in ScriptVariant::all() {
            let scripts = payload.scripts_mut(*variant);
            for incoming in batch.scripts(*variant) {
                match wire_id(incoming) {
                    Some(id) if is_delete(incoming) => {
                        scripts.retain(|s| wire_id(s) != Some(id));
                    }
                    Some(id) => match scripts.iter_mut().find(|s| wire_id(s) == Some(id)) {
                        Some(existing) => {
                            for (key, value) in incoming {
                                existing.insert(key.clone(), value.clone());
                            }
                        }
                        None => scripts.push(incoming.clone()),
                    },
                    None => {
                        let next = scripts
                            .iter()
                            .filter_map(wire_id)
                            .map(|id| id.0 + 1)
                            .max()
                            .unwrap_or(1);
                        let mut created = incoming.clone();
                        created.insert("Id".into(), next.into());
                        scripts.push(created);
                    }
                }
            }
        }
        drop(sites);

        lock(&self.sent).push((site, batch.clone()));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptsync_core::{ScriptId, ScriptRecord};

    #[test]
    fn creates_get_fresh_ids_and_deletes_remove() {
        let store = MemoryScriptStore::new();
        store.put_site(SiteId(1), SitePayload::default());

        let mut batch = ScriptBatch::default();
        batch.push_record(&ScriptRecord::new(ScriptVariant::Server, "a"));
        batch.push_record(&ScriptRecord::new(ScriptVariant::Server, "b"));
        store.batch_update(SiteId(1), &batch).expect("create");
        let ids: Vec<_> = store
            .site(SiteId(1))
            .unwrap()
            .server_scripts
            .iter()
            .filter_map(wire_id)
            .collect();
        assert_eq!(ids, vec![ScriptId(1), ScriptId(2)]);

        let mut batch = ScriptBatch::default();
        batch.push_delete(ScriptVariant::Server, ScriptId(1));
        store.batch_update(SiteId(1), &batch).expect("delete");
        assert_eq!(store.site(SiteId(1)).unwrap().server_scripts.len(), 1);
        assert_eq!(store.sent().len(), 2);
    }

    #[test]
    fn unknown_site_is_not_found() {
        let store = MemoryScriptStore::new();
        let err = store.fetch_site(SiteId(3)).unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[test]
    fn injected_failure_blocks_calls() {
        let store = MemoryScriptStore::new();
        store.put_site(SiteId(1), SitePayload::default());
        store.fail_with(RemoteError::Permission("no".into()));
        assert!(store.fetch_site(SiteId(1)).is_err());
        store.recover();
        assert!(store.fetch_site(SiteId(1)).is_ok());
    }
}
