//! HTTP implementation of the remote script store.
//!
//! Both calls are `POST` with a JSON body carrying `ApiKey`:
//!
//! - `{base}/api/items/{site}/getsite` returns the site payload, either bare
//!   or wrapped in `{"Response": ...}`;
//! - `{base}/api/items/{site}/updatesite` takes `ServerScripts` and/or
//!   `ClientScripts`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use scriptsync_core::{config::WorkspaceConfig, SiteId};
use scriptsync_sync::{RemoteError, ScriptBatch, ScriptStore, SitePayload};

const TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpScriptStore {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl HttpScriptStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Base URL from the config, API key from the environment variable it names.
    pub fn from_config(config: &WorkspaceConfig) -> Result<Self> {
        let Some(base_url) = config.base_url.as_deref() else {
            bail!("no remote configured; run `scriptsync config set-remote <url>`");
        };
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!("API key not found in environment variable {}", config.api_key_env)
        })?;
        Ok(Self::new(base_url, api_key))
    }

    fn endpoint(&self, site: SiteId, action: &str) -> String {
        format!("{}/api/items/{site}/{action}", self.base_url)
    }

    fn post(
        &self,
        site: SiteId,
        action: &str,
        mut body: Map<String, Value>,
    ) -> Result<Value, RemoteError> {
        body.insert("ApiKey".into(), Value::from(self.api_key.clone()));
        let response = self
            .agent
            .post(&self.endpoint(site, action))
            .set("Content-Type", "application/json")
            .send_json(Value::Object(body))
            .map_err(map_error)?;
        response
            .into_json::<Value>()
            .map_err(|e| RemoteError::Server(format!("unreadable response from {action}: {e}")))
    }
}

impl ScriptStore for HttpScriptStore {
    fn fetch_site(&self, site: SiteId) -> Result<SitePayload, RemoteError> {
        let value = self.post(site, "getsite", Map::new())?;
        let payload = match value {
            Value::Object(mut object) if object.contains_key("Response") => {
                object.remove("Response").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(payload)
            .map_err(|e| RemoteError::Server(format!("unexpected site payload: {e}")))
    }

    fn batch_update(&self, site: SiteId, batch: &ScriptBatch) -> Result<(), RemoteError> {
        let body = match serde_json::to_value(batch) {
            Ok(Value::Object(object)) => object,
            Ok(_) => Map::new(),
            Err(e) => return Err(RemoteError::Server(format!("cannot encode batch: {e}"))),
        };
        self.post(site, "updatesite", body).map(|_| ())
    }
}

/// Store for commands that only touch local state; any remote call fails.
pub struct OfflineStore;

impl ScriptStore for OfflineStore {
    fn fetch_site(&self, _site: SiteId) -> Result<SitePayload, RemoteError> {
        Err(RemoteError::Transport("remote not available offline".into()))
    }

    fn batch_update(&self, _site: SiteId, _batch: &ScriptBatch) -> Result<(), RemoteError> {
        Err(RemoteError::Transport("remote not available offline".into()))
    }
}

fn map_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            classify_status(code, body.trim())
        }
        ureq::Error::Transport(transport) => RemoteError::Transport(transport.to_string()),
    }
}

fn classify_status(code: u16, body: &str) -> RemoteError {
    let message = if body.is_empty() {
        format!("HTTP {code}")
    } else {
        format!("HTTP {code}: {body}")
    };
    match code {
        401 | 403 => RemoteError::Permission(message),
        404 => RemoteError::NotFound(message),
        _ => RemoteError::Server(message),
    }
}
