//! Per-site sync state.
//!
//! Persisted as `<home>/.scriptsync/sites/<site>/state.json`. Mutation goes
//! through [`update_at`], which loads the document, applies a pure
//! `SiteSyncState -> SiteSyncState` function, and writes the result
//! atomically. There is no optimistic-concurrency check: two writers racing on
//! the same site can lose an update.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{io_err, CoreError};
use crate::persist;
use crate::types::{ScriptId, ScriptVariant, SiteId};

/// Script ids designated for scoped pushes.
///
/// Both sides are sets, so they serialize ascending and deduplicated whatever
/// order ids were supplied in. Ids may be stale (deleted scripts); those are
/// inert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveScriptSet {
    #[serde(default)]
    pub server: BTreeSet<ScriptId>,
    #[serde(default)]
    pub client: BTreeSet<ScriptId>,
}

impl ActiveScriptSet {
    pub fn new(
        server: impl IntoIterator<Item = ScriptId>,
        client: impl IntoIterator<Item = ScriptId>,
    ) -> Self {
        Self {
            server: server.into_iter().collect(),
            client: client.into_iter().collect(),
        }
    }

    /// No ids of either variant.
    pub fn is_empty(&self) -> bool {
        self.server.is_empty() && self.client.is_empty()
    }

    pub fn ids(&self, variant: ScriptVariant) -> &BTreeSet<ScriptId> {
        match variant {
            ScriptVariant::Server => &self.server,
            ScriptVariant::Client => &self.client,
        }
    }

    pub fn ids_mut(&mut self, variant: ScriptVariant) -> &mut BTreeSet<ScriptId> {
        match variant {
            ScriptVariant::Server => &mut self.server,
            ScriptVariant::Client => &mut self.client,
        }
    }

    pub fn contains(&self, variant: ScriptVariant, id: ScriptId) -> bool {
        self.ids(variant).contains(&id)
    }
}

/// Script count summary recorded at the last pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCounts {
    pub server: usize,
    pub client: usize,
}

/// Everything the engine remembers about a site between operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSyncState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub last_pulled: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_pushed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub counts: ScriptCounts,
    #[serde(default)]
    pub active: ActiveScriptSet,
}

/// `<home>/.scriptsync/sites/<site>/state.json`
pub fn state_path_at(home: &Path, site: SiteId) -> PathBuf {
    config::site_dir_at(home, site).join("state.json")
}

/// Load a site's state; a missing file yields the default state.
pub fn load_at(home: &Path, site: SiteId) -> Result<SiteSyncState, CoreError> {
    let path = state_path_at(home, site);
    if !path.exists() {
        return Ok(SiteSyncState::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|source| CoreError::Json { path, source })
}

fn save_at(home: &Path, site: SiteId, state: &SiteSyncState) -> Result<(), CoreError> {
    let path = state_path_at(home, site);
    let json = serde_json::to_string_pretty(state).map_err(|source| CoreError::Json {
        path: path.clone(),
        source,
    })?;
    persist::write_atomic(&path, json.as_bytes()).map_err(|e| io_err(&path, e))
}

/// Read-modify-write transaction over a site's state. Returns the stored state.
pub fn update_at<F>(home: &Path, site: SiteId, f: F) -> Result<SiteSyncState, CoreError>
where
    F: FnOnce(SiteSyncState) -> SiteSyncState,
{
    let next = f(load_at(home, site)?);
    save_at(home, site, &next)?;
    Ok(next)
}

/// The site's active ids.
pub fn get_active_at(home: &Path, site: SiteId) -> Result<ActiveScriptSet, CoreError> {
    Ok(load_at(home, site)?.active)
}

/// Replace the site's active ids wholesale.
pub fn set_active_at(
    home: &Path,
    site: SiteId,
    server: &[ScriptId],
    client: &[ScriptId],
) -> Result<ActiveScriptSet, CoreError> {
    let active = ActiveScriptSet::new(server.iter().copied(), client.iter().copied());
    let state = update_at(home, site, |state| SiteSyncState { active, ..state })?;
    Ok(state.active)
}

/// Empty the site's active ids.
pub fn clear_active_at(home: &Path, site: SiteId) -> Result<(), CoreError> {
    set_active_at(home, site, &[], &[]).map(|_| ())
}
