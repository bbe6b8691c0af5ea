//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod progress;

/// ucm-update - Check for, download and install UCI-ClusterManager updates
#[derive(Parser, Debug)]
#[command(name = "ucm-update")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Emit JSON on stdout for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/ucm/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether a newer release is published
    Check(commands::check::CheckArgs),

    /// Download the installer for this platform
    Download(commands::download::DownloadArgs),

    /// Download and launch the installer
    Apply(commands::apply::ApplyArgs),

    /// Run automatic checks in the foreground and print events
    Watch(commands::watch::WatchArgs),

    /// Show the effective configuration and detected platform
    Config(commands::config::ConfigArgs),
}
