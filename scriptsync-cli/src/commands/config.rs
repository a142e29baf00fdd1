//! `scriptsync config`: remote endpoint and API key variable.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use scriptsync_core::config as workspace;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set the remote base URL.
    SetRemote {
        /// Base URL, e.g. `https://sites.example.com`.
        url: String,

        /// Environment variable holding the API key.
        #[arg(long)]
        api_key_env: Option<String>,
    },

    /// Print the current configuration.
    Show,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = super::home()?;
    let mut config = workspace::load_at(&home).context("failed to load config")?;

    match command {
        ConfigCommand::SetRemote { url, api_key_env } => {
            let url = url.trim().trim_end_matches('/').to_string();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("remote URL must start with http:// or https://, got '{url}'");
            }
            config.base_url = Some(url.clone());
            if let Some(name) = api_key_env {
                config.api_key_env = name;
            }
            workspace::save_at(&home, &config).context("failed to save config")?;
            println!("{} remote set to {url}", "✓".green());
            println!("  API key read from ${}", config.api_key_env);
        }
        ConfigCommand::Show => {
            println!(
                "remote:       {}",
                config.base_url.as_deref().unwrap_or("(not set)")
            );
            println!("api key env:  {}", config.api_key_env);
            match config.current_site() {
                Some(site) => println!("current site: {site}"),
                None => println!("current site: (none)"),
            }
            println!("sites:        {}", config.sites.len());
            println!(
                "config file:  {}",
                workspace::config_path_at(&home).display()
            );
        }
    }
    Ok(())
}
