//! `scriptsync delete <ids...>`: remove scripts from the site and locally.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::{parse_ids, Session, VariantArgs};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Script ids; `42 43` or `42,43`.
    #[arg(required = true)]
    pub ids: Vec<String>,

    #[command(flatten)]
    pub variant: VariantArgs,
}

impl DeleteArgs {
    pub fn run(self, site: Option<u64>) -> Result<()> {
        let variant = self.variant.require()?;
        let ids = parse_ids(&self.ids)?;
        let session = Session::open(site)?;
        let report = session
            .orchestrator()?
            .delete(session.site, variant, &ids)
            .context("delete did not complete")?;
        for path in &report.removed_files {
            println!("  {} {}", "✗".red(), path.display());
        }
        println!(
            "{} deleted {} {} scripts from site {}",
            "✓".green(),
            report.ids.len(),
            report.variant,
            session.site,
        );
        Ok(())
    }
}
