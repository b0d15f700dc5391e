//! SyncStation — cross-computer config file/folder sync over a shared
//! rendezvous directory.
//!
//! # Usage
//!
//! ```text
//! syncstation init [<cloud-dir>] [--git] [--name <id>]
//! syncstation add <name> <path> [--exclude <glob,...>]
//! syncstation sync [<name>]
//! syncstation push [<name>] [--force]
//! syncstation pull [<name>] [--force]
//! syncstation status [<name>]
//! syncstation list
//! syncstation config
//! syncstation remove <name> [--global|--delete-cloud]
//! syncstation backup stats
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs, backup::BackupCommand, config as config_cmd, init::InitArgs, list,
    remove::RemoveArgs, status::StatusArgs, sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "syncstation",
    version,
    about = "Sync config files and folders across computers through a shared directory",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize this computer against a rendezvous directory.
    Init(InitArgs),

    /// Register a file or folder as a sync item.
    Add(AddArgs),

    /// Two-way smart sync (all items, or a named subset).
    Sync(SyncArgs),

    /// One-way mirror: local -> cloud.
    Push(SyncArgs),

    /// One-way mirror: cloud -> local.
    Pull(SyncArgs),

    /// Show per-item sync status.
    Status(StatusArgs),

    /// List registered sync items.
    List,

    /// Show the local configuration.
    Config,

    /// Remove a sync item (three semantics: local-only, global, global+delete-cloud).
    Remove(RemoveArgs),

    /// Backup manager operations.
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Add(args) => args.run(),
        Commands::Sync(args) => args.run_smart(),
        Commands::Push(args) => args.run_push(),
        Commands::Pull(args) => args.run_pull(),
        Commands::Status(args) => args.run(),
        Commands::List => list::run(),
        Commands::Config => config_cmd::run(),
        Commands::Remove(args) => args.run(),
        Commands::Backup { command } => command.run(),
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Maps the outermost error onto the exit-code taxonomy: validation,
/// conflict, and plain IO failures are user-visible (1); anything that
/// looks like an internal invariant violation is 2; a timeout is 3.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(sync_err) = err.downcast_ref::<syncstation_sync::SyncError>() {
        return match sync_err {
            syncstation_sync::SyncError::Conflict(_) => 1,
            syncstation_sync::SyncError::TimedOut => 3,
            syncstation_sync::SyncError::QueueFull
            | syncstation_sync::SyncError::ShuttingDown
            | syncstation_sync::SyncError::AlreadyCommitted
            | syncstation_sync::SyncError::WriterClosed => 2,
            _ => 1,
        };
    }
    if err.downcast_ref::<syncstation_core::CoreError>().is_some() {
        return 1;
    }
    1
}
