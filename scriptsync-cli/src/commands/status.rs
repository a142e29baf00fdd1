//! `scriptsync status`: sync state for a site, without contacting it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use scriptsync_core::ScriptVariant;
use scriptsync_sync::SiteStatus;

use super::Session;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, site: Option<u64>) -> Result<()> {
        let session = Session::open(site)?;
        let status = session
            .offline()
            .status(session.site)
            .context("status did not complete")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }
        print_status(&status, Utc::now());
        Ok(())
    }
}

#[derive(Tabled)]
struct VariantRow {
    #[tabled(rename = "variant")]
    variant: String,
    #[tabled(rename = "local files")]
    local: usize,
    #[tabled(rename = "last pull")]
    pulled: usize,
    #[tabled(rename = "active")]
    active: String,
}

fn rows(status: &SiteStatus) -> Vec<VariantRow> {
    ScriptVariant::all()
        .iter()
        .map(|variant| {
            let (local, pulled) = match variant {
                ScriptVariant::Server => (status.local.server, status.state.counts.server),
                ScriptVariant::Client => (status.local.client, status.state.counts.client),
            };
            let active = status.state.active.ids(*variant);
            VariantRow {
                variant: variant.to_string(),
                local,
                pulled,
                active: if active.is_empty() {
                    "all".into()
                } else {
                    active.len().to_string()
                },
            }
        })
        .collect()
}

fn print_status(status: &SiteStatus, now: DateTime<Utc>) {
    println!(
        "{} {} ({})",
        "site".bold(),
        status.site,
        status.state.title.as_deref().unwrap_or(&status.title)
    );
    println!("  workspace:    {}", status.workspace.display());
    if let Some(reference_type) = &status.state.reference_type {
        println!("  type:         {reference_type}");
    }
    match status.last_pulled() {
        Some(at) => println!("  last pulled:  {}", format_age(at, now)),
        None => println!("  last pulled:  {}", "never, run `scriptsync pull`".yellow()),
    }
    match status.state.last_pushed {
        Some(at) => println!("  last pushed:  {}", format_age(at, now)),
        None => println!("  last pushed:  never"),
    }
    if status.confirm_push {
        println!("  push requires confirmation");
    }
    let mut table = Table::new(rows(status));
    table.with(Style::rounded());
    println!("{table}");
}

fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    let age = match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    };
    format!("{} ({age})", at.format("%Y-%m-%d %H:%M UTC"))
}
