//! `scriptsync upload <files...>`: send arbitrary script files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::{Session, VariantArgs};

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Script files to send.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Treat every file as this variant instead of inferring it from the path.
    #[command(flatten)]
    pub variant: VariantArgs,
}

impl UploadArgs {
    pub fn run(self, site: Option<u64>) -> Result<()> {
        let session = Session::open(site)?;
        let report = session
            .orchestrator()?
            .upload(session.site, &self.paths, self.variant.variant())
            .context("upload did not complete")?;
        for path in &report.paths {
            let marker = if report.created.contains(path) { "+" } else { "↑" };
            println!("  {} {}", marker.green(), path.display());
        }
        println!(
            "{} uploaded {} server and {} client scripts to site {}",
            "✓".green(),
            report.counts.server,
            report.counts.client,
            report.site,
        );
        Ok(())
    }
}
