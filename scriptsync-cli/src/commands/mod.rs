pub mod active;
pub mod config;
pub mod delete;
pub mod diff;
pub mod pull;
pub mod push;
pub mod site;
pub mod status;
pub mod upload;
pub mod watch;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use scriptsync_core::{config as workspace, config::WorkspaceConfig, ScriptVariant, SiteId};
use scriptsync_sync::Orchestrator;

use crate::remote::{HttpScriptStore, OfflineStore};

/// Home, loaded config, and the site a command acts on.
pub struct Session {
    pub home: PathBuf,
    pub config: WorkspaceConfig,
    pub site: SiteId,
}

impl Session {
    /// Resolve `--site`, falling back to the current site.
    pub fn open(explicit: Option<u64>) -> Result<Self> {
        let home = home()?;
        let config = workspace::load_at(&home).context("failed to load config")?;
        let site = resolve_site(&config, explicit)?;
        Ok(Self { home, config, site })
    }

    /// Orchestrator talking to the configured HTTP store.
    pub fn orchestrator(&self) -> Result<Orchestrator<HttpScriptStore>> {
        let store = HttpScriptStore::from_config(&self.config)?;
        Ok(Orchestrator::new(self.home.clone(), store))
    }

    /// Orchestrator for local-only operations (status, active set).
    pub fn offline(&self) -> Orchestrator<OfflineStore> {
        Orchestrator::new(self.home.clone(), OfflineStore)
    }
}

pub fn home() -> Result<PathBuf> {
    workspace::home().context("could not determine home directory")
}

pub fn resolve_site(config: &WorkspaceConfig, explicit: Option<u64>) -> Result<SiteId> {
    let site = match explicit.map(SiteId).or_else(|| config.current_site()) {
        Some(site) => site,
        None => bail!("no site selected; pass --site <id> or run `scriptsync site use <id>`"),
    };
    config
        .require_site(site)
        .with_context(|| format!("run `scriptsync site add {site} ...` first"))?;
    Ok(site)
}

/// `--server` / `--client` switch pair.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct VariantArgs {
    /// Server scripts.
    #[arg(long, conflicts_with = "client")]
    pub server: bool,

    /// Client scripts.
    #[arg(long)]
    pub client: bool,
}

impl VariantArgs {
    pub fn variant(self) -> Option<ScriptVariant> {
        match (self.server, self.client) {
            (true, _) => Some(ScriptVariant::Server),
            (_, true) => Some(ScriptVariant::Client),
            _ => None,
        }
    }

    pub fn require(self) -> Result<ScriptVariant> {
        self.variant().context("pass --server or --client")
    }
}

/// Parse `42` or `42,43` style id lists.
pub fn parse_ids(raw: &[String]) -> Result<Vec<scriptsync_core::ScriptId>> {
    raw.iter()
        .flat_map(|chunk| chunk.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(scriptsync_core::ScriptId)
                .with_context(|| format!("invalid script id '{s}'"))
        })
        .collect()
}
