//! `scriptsync pull`: overwrite local script files with the site's scripts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use scriptsync_sync::{PullReport, WriteResult};

use super::Session;

#[derive(Args, Debug)]
pub struct PullArgs {
    /// List unchanged files too.
    #[arg(long)]
    pub verbose: bool,
}

impl PullArgs {
    pub fn run(self, site: Option<u64>) -> Result<()> {
        let session = Session::open(site)?;
        let report = session
            .orchestrator()?
            .pull(session.site)
            .context("pull did not complete")?;
        print_report(&report, self.verbose);
        Ok(())
    }
}

fn print_report(report: &PullReport, verbose: bool) {
    for file in &report.files {
        match file {
            WriteResult::Written { path } => println!("  {} {}", "✎".green(), path.display()),
            WriteResult::Removed { path } => println!("  {} {}", "✗".red(), path.display()),
            WriteResult::Unchanged { path } if verbose => {
                println!("  {} {}", "·".dimmed(), path.display())
            }
            WriteResult::Unchanged { .. } => {}
        }
    }
    println!(
        "{} pulled site {} '{}': {} server, {} client ({} written, {} unchanged, {} removed)",
        "✓".green(),
        report.site,
        report.title,
        report.counts.server,
        report.counts.client,
        report.written(),
        report.unchanged(),
        report.removed(),
    );
}
