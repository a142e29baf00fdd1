//! Remote/local reconciliation into identity-keyed diff entries.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use scriptsync_core::{ScriptId, ScriptRecord, ScriptVariant};

use crate::repository::LocalScriptFile;

/// Identity half of a diff key. Ids sort before titles, so entries without
/// an id come last within a variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum EntryKey {
    Id(ScriptId),
    Title(String),
}

impl EntryKey {
    fn for_record(record: &ScriptRecord) -> EntryKey {
        match record.id {
            Some(id) => EntryKey::Id(id),
            None => EntryKey::Title(record.title.clone()),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Id(id) => write!(f, "{id}"),
            EntryKey::Title(title) => f.write_str(title),
        }
    }
}

/// Which sides an entry exists on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Both,
    LocalOnly,
    RemoteOnly,
}

/// One script's remote and local representation. Built fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub variant: ScriptVariant,
    pub key: EntryKey,
    pub title: String,
    pub local_path: Option<PathBuf>,
    pub local: Option<ScriptRecord>,
    pub remote: Option<ScriptRecord>,
}

impl DiffEntry {
    pub fn status(&self) -> EntryStatus {
        match (&self.local, &self.remote) {
            (Some(_), None) => EntryStatus::LocalOnly,
            (None, Some(_)) => EntryStatus::RemoteOnly,
            _ => EntryStatus::Both,
        }
    }

    /// True unless both sides exist with the same content.
    pub fn differs(&self) -> bool {
        match (&self.local, &self.remote) {
            (Some(local), Some(remote)) => !local.same_content(remote),
            _ => true,
        }
    }

    /// `variant:id-or-title`, e.g. `server:42`.
    pub fn key_string(&self) -> String {
        format!("{}:{}", self.variant, self.key)
    }
}

/// Merge remote and local collections into one ordered entry list.
///
/// Remote entries seed the map; local files overlay them, setting path and
/// title. A local file whose key repeats an earlier local file replaces it.
/// Output is server before client, ascending id, id-less entries last.
pub fn reconcile(
    remote_server: &[ScriptRecord],
    remote_client: &[ScriptRecord],
    local_server: &[LocalScriptFile],
    local_client: &[LocalScriptFile],
) -> Vec<DiffEntry> {
    let mut entries: BTreeMap<(ScriptVariant, EntryKey), DiffEntry> = BTreeMap::new();

    for record in remote_server.iter().chain(remote_client) {
        let key = EntryKey::for_record(record);
        entries.insert(
            (record.variant, key.clone()),
            DiffEntry {
                variant: record.variant,
                key,
                title: record.title.clone(),
                local_path: None,
                local: None,
                remote: Some(record.clone()),
            },
        );
    }

    for file in local_server.iter().chain(local_client) {
        let record = &file.record;
        let key = EntryKey::for_record(record);
        let entry = entries
            .entry((record.variant, key.clone()))
            .or_insert_with(|| DiffEntry {
                variant: record.variant,
                key,
                title: String::new(),
                local_path: None,
                local: None,
                remote: None,
            });
        entry.title = record.title.clone();
        entry.local_path = Some(file.path.clone());
        entry.local = Some(record.clone());
    }

    entries.into_values().collect()
}
