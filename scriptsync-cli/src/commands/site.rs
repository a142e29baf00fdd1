//! `scriptsync site`: register sites and choose the current one.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use scriptsync_core::{
    config::{self as workspace, SiteConfig},
    SiteId,
};

#[derive(Subcommand, Debug)]
pub enum SiteCommand {
    /// Register a site, or update an existing registration.
    Add {
        /// Numeric site id on the remote.
        id: u64,

        /// Display title.
        #[arg(long)]
        title: Option<String>,

        /// Workspace directory holding `server-scripts/` and `client-scripts/`.
        #[arg(long)]
        workspace: PathBuf,

        /// Ask before every push to this site.
        #[arg(long)]
        confirm_push: bool,

        /// Also make it the current site.
        #[arg(long = "use")]
        make_current: bool,
    },

    /// List registered sites.
    List,

    /// Make a registered site the current one.
    Use {
        id: u64,
    },
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "")]
    current: String,
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "workspace")]
    workspace: String,
    #[tabled(rename = "confirm push")]
    confirm_push: String,
}

pub fn run(command: SiteCommand) -> Result<()> {
    let home = super::home()?;
    let mut config = workspace::load_at(&home).context("failed to load config")?;

    match command {
        SiteCommand::Add {
            id,
            title,
            workspace: dir,
            confirm_push,
            make_current,
        } => {
            if id == 0 {
                bail!("site id must be a positive integer");
            }
            let dir = if dir.is_absolute() {
                dir
            } else {
                std::env::current_dir()
                    .context("could not determine current directory")?
                    .join(dir)
            };
            let site = SiteId(id);
            let title = title.unwrap_or_else(|| format!("site {id}"));
            config.upsert_site(SiteConfig {
                id: site,
                title: title.clone(),
                workspace: dir.clone(),
                confirm_push,
            });
            if make_current || config.current_site().is_none() {
                config.select_site(Some(site));
            }
            workspace::save_at(&home, &config).context("failed to save config")?;
            println!("{} site {id} '{title}' → {}", "✓".green(), dir.display());
        }
        SiteCommand::List => {
            if config.sites.is_empty() {
                println!("No sites registered. Run `scriptsync site add <id> --workspace <dir>`.");
                return Ok(());
            }
            let current = config.current_site();
            let rows: Vec<SiteRow> = config
                .sites
                .iter()
                .map(|site| SiteRow {
                    current: if Some(site.id) == current { "*".into() } else { String::new() },
                    id: site.id.0,
                    title: site.title.clone(),
                    workspace: site.workspace.display().to_string(),
                    confirm_push: if site.confirm_push { "yes".into() } else { "no".into() },
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        SiteCommand::Use { id } => {
            let site = SiteId(id);
            config
                .require_site(site)
                .with_context(|| format!("run `scriptsync site add {id} ...` first"))?;
            config.select_site(Some(site));
            workspace::save_at(&home, &config).context("failed to save config")?;
            println!("{} current site is now {id}", "✓".green());
        }
    }
    Ok(())
}
