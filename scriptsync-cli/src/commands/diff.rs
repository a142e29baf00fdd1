//! `scriptsync diff`: compare the live site with local files.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use scriptsync_core::ScriptVariant;
use scriptsync_sync::{diff::unified_diff, DiffEntry, EntryStatus};

use super::Session;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Print unified diffs for modified scripts.
    #[arg(long, short = 'u')]
    pub unified: bool,

    /// Emit machine-readable JSON.
    #[arg(long, conflicts_with = "unified")]
    pub json: bool,
}

impl DiffArgs {
    pub fn run(self, site: Option<u64>) -> Result<()> {
        let session = Session::open(site)?;
        let entries = session
            .orchestrator()?
            .diff(session.site)
            .context("diff did not complete")?;

        if self.json {
            let rows: Vec<EntryJson> = entries.iter().map(EntryJson::from).collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        let pending: Vec<&DiffEntry> = entries.iter().filter(|e| e.differs()).collect();
        if pending.is_empty() {
            println!("No differences for site {}.", session.site);
        } else {
            print_entries(&pending);
            if self.unified {
                for entry in &pending {
                    if let Some(text) = unified_diff(entry)? {
                        print!("{text}");
                        if !text.ends_with('\n') {
                            println!();
                        }
                    }
                }
            }
        }
        println!();
        print_summary(&entries);
        Ok(())
    }
}

/// One line per entry with a status marker.
pub fn print_entries<E: std::borrow::Borrow<DiffEntry>>(entries: &[E]) {
    for entry in entries {
        let entry = entry.borrow();
        let (marker, label) = match (entry.status(), entry.differs()) {
            (EntryStatus::LocalOnly, _) => ("+".green(), "local only".green()),
            (EntryStatus::RemoteOnly, _) => ("-".red(), "remote only".red()),
            (EntryStatus::Both, true) => ("~".yellow(), "modified".yellow()),
            (EntryStatus::Both, false) => ("=".dimmed(), "same".dimmed()),
        };
        println!("  {marker} {:<16} {:<24} {label}", entry.key_string(), entry.title);
    }
}

#[derive(Tabled, Default)]
struct SummaryRow {
    #[tabled(rename = "variant")]
    variant: String,
    #[tabled(rename = "same")]
    same: usize,
    #[tabled(rename = "modified")]
    modified: usize,
    #[tabled(rename = "local only")]
    local_only: usize,
    #[tabled(rename = "remote only")]
    remote_only: usize,
}

fn summarize(entries: &[DiffEntry]) -> Vec<SummaryRow> {
    ScriptVariant::all()
        .iter()
        .map(|variant| {
            let mut row = SummaryRow {
                variant: variant.to_string(),
                ..SummaryRow::default()
            };
            for entry in entries.iter().filter(|e| e.variant == *variant) {
                match (entry.status(), entry.differs()) {
                    (EntryStatus::LocalOnly, _) => row.local_only += 1,
                    (EntryStatus::RemoteOnly, _) => row.remote_only += 1,
                    (EntryStatus::Both, true) => row.modified += 1,
                    (EntryStatus::Both, false) => row.same += 1,
                }
            }
            row
        })
        .collect()
}

fn print_summary(entries: &[DiffEntry]) {
    let mut table = Table::new(summarize(entries));
    table.with(Style::rounded());
    println!("{table}");
}

#[derive(Serialize)]
struct EntryJson {
    key: String,
    variant: String,
    title: String,
    status: EntryStatus,
    differs: bool,
    local_path: Option<String>,
}

impl From<&DiffEntry> for EntryJson {
    fn from(entry: &DiffEntry) -> Self {
        Self {
            key: entry.key_string(),
            variant: entry.variant.to_string(),
            title: entry.title.clone(),
            status: entry.status(),
            differs: entry.differs(),
            local_path: entry
                .local_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}
