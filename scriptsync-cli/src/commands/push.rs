//! `scriptsync push`: send local scripts, or only the active set, to the site.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use scriptsync_sync::{PushOptions, PushOutcome, SyncError};

use super::{diff::print_entries, Session};

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Show what would be sent without sending it.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt for sites that require one.
    #[arg(long)]
    pub force: bool,
}

impl PushArgs {
    pub fn run(self, site: Option<u64>) -> Result<()> {
        let session = Session::open(site)?;
        let orchestrator = session.orchestrator()?;
        let options = PushOptions {
            dry_run: self.dry_run,
            force: self.force,
        };

        let outcome = match orchestrator.push(session.site, options) {
            Err(err) if matches!(err.root(), SyncError::ConfirmationRequired { .. }) => {
                if !confirm(&format!("Push local scripts to site {}?", session.site))? {
                    println!("Push cancelled.");
                    return Ok(());
                }
                orchestrator.push(
                    session.site,
                    PushOptions {
                        force: true,
                        ..options
                    },
                )
            }
            other => other,
        }
        .context("push did not complete")?;

        match outcome {
            PushOutcome::DryRun(entries) => {
                let pending: Vec<_> = entries.into_iter().filter(|e| e.differs()).collect();
                if pending.is_empty() {
                    println!("Nothing to push; site {} matches local files.", session.site);
                } else {
                    println!("Dry run, would push to site {}:", session.site);
                    print_entries(&pending);
                }
            }
            PushOutcome::NothingSelected => {
                println!(
                    "{} nothing to push; the active set matches no local scripts",
                    "!".yellow()
                );
            }
            PushOutcome::Pushed(report) => {
                for path in &report.created {
                    println!(
                        "  {} {} (new; pull to pick up its id)",
                        "+".green(),
                        path.display()
                    );
                }
                println!(
                    "{} pushed {} server and {} client scripts to site {}",
                    "✓".green(),
                    report.counts.server,
                    report.counts.client,
                    report.site,
                );
            }
        }
        Ok(())
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
