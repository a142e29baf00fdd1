//! Remote Script Store seam and its JSON schema.
//!
//! The store is consumed through two calls: [`ScriptStore::fetch_site`] and
//! [`ScriptStore::batch_update`]. Transport, authentication, and timeouts
//! belong to the implementation. The trait is blocking; async callers use
//! `spawn_blocking`.
//!
//! Scripts travel as JSON objects keyed by PascalCase field names (`Id`,
//! `Title`, `Body`, `BeforeCreate`, …). An update object carrying
//! `"Delete": 1` removes that id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use scriptsync_core::{ScriptFlag, ScriptId, ScriptRecord, ScriptVariant, SiteId};

use crate::error::SyncError;

/// One script as the store sends and receives it.
pub type WireScript = Map<String, Value>;

/// Failures reported by a store implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// The remote record store holding a site's scripts.
pub trait ScriptStore {
    /// Full site payload: title, reference type, both script lists.
    fn fetch_site(&self, site: SiteId) -> Result<SitePayload, RemoteError>;

    /// Apply creates, updates, and deletes for one site in a single call.
    fn batch_update(&self, site: SiteId, batch: &ScriptBatch) -> Result<(), RemoteError>;
}

impl<S: ScriptStore + ?Sized> ScriptStore for &S {
    fn fetch_site(&self, site: SiteId) -> Result<SitePayload, RemoteError> {
        (**self).fetch_site(site)
    }

    fn batch_update(&self, site: SiteId, batch: &ScriptBatch) -> Result<(), RemoteError> {
        (**self).batch_update(site, batch)
    }
}

impl<S: ScriptStore + ?Sized> ScriptStore for Arc<S> {
    fn fetch_site(&self, site: SiteId) -> Result<SitePayload, RemoteError> {
        (**self).fetch_site(site)
    }

    fn batch_update(&self, site: SiteId, batch: &ScriptBatch) -> Result<(), RemoteError> {
        (**self).batch_update(site, batch)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// What `fetch_site` returns. Also the persisted snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SitePayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub reference_type: String,
    #[serde(default)]
    pub server_scripts: Vec<WireScript>,
    #[serde(default)]
    pub client_scripts: Vec<WireScript>,
}

impl SitePayload {
    pub fn scripts(&self, variant: ScriptVariant) -> &[WireScript] {
        match variant {
            ScriptVariant::Server => &self.server_scripts,
            ScriptVariant::Client => &self.client_scripts,
        }
    }

    pub fn scripts_mut(&mut self, variant: ScriptVariant) -> &mut Vec<WireScript> {
        match variant {
            ScriptVariant::Server => &mut self.server_scripts,
            ScriptVariant::Client => &mut self.client_scripts,
        }
    }

    /// Normalized records of one variant, in payload order.
    pub fn records(&self, variant: ScriptVariant) -> Result<Vec<ScriptRecord>, SyncError> {
        self.scripts(variant)
            .iter()
            .map(|script| record_from_wire(variant, script))
            .collect()
    }

    /// Drop the scripts with the given ids.
    pub fn remove(&mut self, variant: ScriptVariant, ids: &[ScriptId]) {
        self.scripts_mut(variant)
            .retain(|script| !matches!(wire_id(script), Some(id) if ids.contains(&id)));
    }
}

/// Body of a `batch_update` call. Absent lists leave that variant untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_scripts: Option<Vec<WireScript>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_scripts: Option<Vec<WireScript>>,
}

impl ScriptBatch {
    fn list_mut(&mut self, variant: ScriptVariant) -> &mut Vec<WireScript> {
        match variant {
            ScriptVariant::Server => self.server_scripts.get_or_insert_with(Vec::new),
            ScriptVariant::Client => self.client_scripts.get_or_insert_with(Vec::new),
        }
    }

    pub fn scripts(&self, variant: ScriptVariant) -> &[WireScript] {
        let list = match variant {
            ScriptVariant::Server => &self.server_scripts,
            ScriptVariant::Client => &self.client_scripts,
        };
        list.as_deref().unwrap_or(&[])
    }

    /// Queue a create (no id) or update (with id).
    pub fn push_record(&mut self, record: &ScriptRecord) {
        self.list_mut(record.variant).push(record_to_wire(record));
    }

    /// Queue a deletion.
    pub fn push_delete(&mut self, variant: ScriptVariant, id: ScriptId) {
        let mut script = Map::new();
        script.insert("Id".into(), Value::from(id.0));
        script.insert("Delete".into(), Value::from(1));
        self.list_mut(variant).push(script);
    }

    pub fn len(&self) -> usize {
        self.scripts(ScriptVariant::Server).len() + self.scripts(ScriptVariant::Client).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Wire conversion
// ---------------------------------------------------------------------------

const ID: &str = "Id";
const TITLE: &str = "Title";
const NAME: &str = "Name";
const BODY: &str = "Body";

/// `Id` of a wire script, if it is a non-negative integer.
pub fn wire_id(script: &WireScript) -> Option<ScriptId> {
    script.get(ID).and_then(Value::as_u64).map(ScriptId)
}

/// Whether a wire script is a deletion marker.
pub fn is_delete(script: &WireScript) -> bool {
    match script.get("Delete") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Build a record from the store's JSON. Fields outside the schema go to `extra`.
pub fn record_from_wire(
    variant: ScriptVariant,
    script: &WireScript,
) -> Result<ScriptRecord, SyncError> {
    let id = match script.get(ID) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_u64().map(ScriptId).ok_or_else(|| {
            SyncError::Validation(format!("{variant} script has a non-integer Id: {value}"))
        })?),
    };

    let mut record = ScriptRecord::new(variant, wire_string(script, TITLE).unwrap_or_default());
    record.id = id;
    record.body = wire_string(script, BODY).unwrap_or_default();
    if variant.has_name() {
        record.name = wire_string(script, NAME);
    }

    for (key, value) in script {
        if matches!(key.as_str(), ID | TITLE | BODY) || (variant.has_name() && key == NAME) {
            continue;
        }
        match ScriptFlag::from_wire_key(variant, key) {
            Some(flag) => record.set_flag(flag, wire_bool(value)),
            None => {
                record.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(record)
}

/// Serialize a record for the store. Every known flag is sent explicitly.
pub fn record_to_wire(record: &ScriptRecord) -> WireScript {
    let mut script = Map::new();
    for (key, value) in &record.extra {
        script.insert(key.clone(), value.clone());
    }
    if let Some(id) = record.id {
        script.insert(ID.into(), Value::from(id.0));
    }
    script.insert(TITLE.into(), Value::from(record.title.clone()));
    if record.variant.has_name() {
        if let Some(name) = &record.name {
            script.insert(NAME.into(), Value::from(name.clone()));
        }
    }
    script.insert(BODY.into(), Value::from(record.body.clone()));
    for flag in record.variant.flags() {
        script.insert(flag.wire_key().into(), Value::Bool(record.flag(*flag)));
    }
    script
}

fn wire_string(script: &WireScript, key: &str) -> Option<String> {
    match script.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn wire_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    }
}
