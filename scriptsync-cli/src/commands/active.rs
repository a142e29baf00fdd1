//! `scriptsync active`: the subset of scripts `push` sends.
//!
//! An empty set means "push everything".

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use scriptsync_core::{state, ActiveScriptSet, ScriptId};

use super::{parse_ids, Session, VariantArgs};

#[derive(Subcommand, Debug)]
pub enum ActiveCommand {
    /// Show the active ids.
    List,

    /// Replace the active set.
    Set {
        /// Server script ids; `1,2` or repeated.
        #[arg(long, num_args = 1..)]
        server: Vec<String>,

        /// Client script ids; `1,2` or repeated.
        #[arg(long, num_args = 1..)]
        client: Vec<String>,
    },

    /// Add an id if absent, remove it if present.
    Toggle {
        id: u64,

        #[command(flatten)]
        variant: VariantArgs,
    },

    /// Empty the active set so push sends everything.
    Clear,
}

pub fn run(command: ActiveCommand, site: Option<u64>) -> Result<()> {
    let session = Session::open(site)?;
    let home = &session.home;

    match command {
        ActiveCommand::List => {
            let active = state::get_active_at(home, session.site)
                .context("failed to load site state")?;
            print_active(&active);
        }
        ActiveCommand::Set { server, client } => {
            if server.is_empty() && client.is_empty() {
                bail!("pass --server and/or --client ids; use `active clear` to empty the set");
            }
            let server = parse_ids(&server)?;
            let client = parse_ids(&client)?;
            let active = state::set_active_at(home, session.site, &server, &client)
                .context("failed to save site state")?;
            print_active(&active);
        }
        ActiveCommand::Toggle { id, variant } => {
            let variant = variant.require()?;
            let id = ScriptId(id);
            let now_active = session
                .offline()
                .toggle_active(session.site, variant, id)?;
            if now_active {
                println!("{} {variant} {id} is active", "+".green());
            } else {
                println!("{} {variant} {id} is no longer active", "-".red());
            }
        }
        ActiveCommand::Clear => {
            state::clear_active_at(home, session.site).context("failed to save site state")?;
            println!("{} active set cleared; push sends every script", "✓".green());
        }
    }
    Ok(())
}

fn join(ids: impl IntoIterator<Item = ScriptId>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn print_active(active: &ActiveScriptSet) {
    if active.is_empty() {
        println!("No active scripts; push sends every script.");
        return;
    }
    println!("server: {}", join(active.server.iter().copied()));
    println!("client: {}", join(active.client.iter().copied()));
}
