//! CLI argument parsing for applock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// applock: single-instance application locks.
///
/// A lock name identifies an application. The first process to take it
/// becomes the primary; later ones find it running, ask it to surface,
/// and step aside.
#[derive(Parser, Debug)]
#[command(name = "applock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log debug details to stderr.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for applock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take the lock and hold it.
    ///
    /// If another instance already holds it, that instance is asked to
    /// surface and this command exits successfully. Otherwise the lock is
    /// held until --duration-secs elapses or stdin is closed.
    Hold(HoldArgs),

    /// Show who holds a lock.
    Status(StatusArgs),

    /// Remove a lock regardless of its holder.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(ClearArgs),
}

/// Lock selection shared by every command.
#[derive(Args, Debug, Clone)]
pub struct LockArgs {
    /// Unique application name.
    pub name: String,

    /// Lock scope: global, user or session (overrides the config file).
    #[arg(long)]
    pub scope: Option<String>,

    /// YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Display label stored in the lock record.
    #[arg(long)]
    pub title: Option<String>,

    /// Release the lock after this many seconds instead of waiting for stdin.
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
