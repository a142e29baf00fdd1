//! Scriptsync: keep a site's server and client scripts in sync with local files.
//!
//! # Usage
//!
//! ```text
//! scriptsync config set-remote <url> [--api-key-env NAME]
//! scriptsync site add <id> --title <title> --workspace <dir> [--confirm-push] [--use]
//! scriptsync site list | use <id>
//! scriptsync pull [--site <id>]
//! scriptsync push [--dry-run] [--force]
//! scriptsync diff [--unified] [--json]
//! scriptsync upload <files...> [--server|--client]
//! scriptsync delete <ids...> --server|--client
//! scriptsync active list | set [--server ids] [--client ids]
//! scriptsync active toggle <id> --server|--client | clear
//! scriptsync status [--json]
//! scriptsync watch [--all]
//! ```

mod commands;
mod remote;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    active::ActiveCommand, config::ConfigCommand, delete::DeleteArgs, diff::DiffArgs,
    pull::PullArgs, push::PushArgs, site::SiteCommand, status::StatusArgs, upload::UploadArgs,
    watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "scriptsync",
    version,
    about = "Sync server and client scripts between a site and local files",
    long_about = None,
)]
struct Cli {
    /// Site to act on; defaults to the one chosen with `site use`.
    #[arg(long, global = true)]
    site: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Remote endpoint and credentials.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Register and select sites.
    Site {
        #[command(subcommand)]
        command: SiteCommand,
    },

    /// Overwrite local script files with the site's scripts.
    Pull(PullArgs),

    /// Send local scripts (or the active subset) to the site.
    Push(PushArgs),

    /// Compare the live site with local files.
    Diff(DiffArgs),

    /// Send arbitrary script files.
    Upload(UploadArgs),

    /// Delete scripts from the site and locally.
    Delete(DeleteArgs),

    /// Manage the active script set used to scope pushes.
    Active {
        #[command(subcommand)]
        command: ActiveCommand,
    },

    /// Show sync state for a site.
    Status(StatusArgs),

    /// Push script files as they change.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    scriptsync_daemon::init_tracing();
    let site = cli.site;
    match cli.command {
        Commands::Config { command } => commands::config::run(command),
        Commands::Site { command } => commands::site::run(command),
        Commands::Pull(args) => args.run(site),
        Commands::Push(args) => args.run(site),
        Commands::Diff(args) => args.run(site),
        Commands::Upload(args) => args.run(site),
        Commands::Delete(args) => args.run(site),
        Commands::Active { command } => commands::active::run(command, site),
        Commands::Status(args) => args.run(site),
        Commands::Watch(args) => args.run(site),
    }
}
