//! `scriptsync watch`: push script files as they change, until ctrl-c.

use anyhow::{Context, Result};
use clap::Args;

use scriptsync_core::{config as workspace, SiteId};

use crate::remote::HttpScriptStore;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Watch every registered site; `--site` is ignored.
    #[arg(long)]
    pub all: bool,
}

impl WatchArgs {
    pub fn run(self, site: Option<u64>) -> Result<()> {
        let home = super::home()?;
        let config = workspace::load_at(&home).context("failed to load config")?;
        let only: Vec<SiteId> = if self.all {
            Vec::new()
        } else {
            vec![super::resolve_site(&config, site)?]
        };
        let store = HttpScriptStore::from_config(&config)?;
        scriptsync_daemon::start_blocking(&home, store, &only).context("watcher stopped")?;
        Ok(())
    }
}
