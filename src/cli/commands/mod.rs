//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::{Result, UpdateError};
use crate::updater::{ReleaseInfo, UpdateCheckResult, UpdateCoordinator};

pub mod apply;
pub mod check;
pub mod config;
pub mod download;
pub mod watch;

/// Lines of release notes shown in human output.
const NOTES_PREVIEW_LINES: usize = 10;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Check(args) => check::run(ctx, args),
        Commands::Download(args) => download::run(ctx, args),
        Commands::Apply(args) => apply::run(ctx, args),
        Commands::Watch(args) => watch::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
    }
}

/// Response for an update check (robot mode).
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCheckResponse {
    pub current_version: String,
    pub update_available: bool,
    pub latest_version: Option<String>,
    pub tag: Option<String>,
    pub release_name: Option<String>,
    pub notes: Option<String>,
    pub published_at: Option<String>,
    pub asset: Option<String>,
    pub download_size: Option<u64>,
    pub checked_at: Option<String>,
}

impl UpdateCheckResponse {
    fn new(coordinator: &UpdateCoordinator, release: Option<&ReleaseInfo>) -> Self {
        let asset = release.and_then(|info| coordinator.select_asset(info).ok());
        Self {
            current_version: coordinator.current_version(),
            update_available: release.is_some(),
            latest_version: release.map(|info| info.version.to_string()),
            tag: release.map(|info| info.tag.clone()),
            release_name: release.map(|info| info.name.clone()),
            notes: release.map(|info| info.body.clone()),
            published_at: release.and_then(|info| info.published_at.map(|at| at.to_rfc3339())),
            asset: asset.map(|a| a.name.clone()),
            download_size: asset.map(|a| a.size).filter(|size| *size > 0),
            checked_at: coordinator.last_check().map(|at| at.to_rfc3339()),
        }
    }
}

/// Run a manual check; a failed check becomes the command's error.
fn check_for_release(ctx: &AppContext) -> Result<Option<ReleaseInfo>> {
    match ctx.coordinator.check_now() {
        UpdateCheckResult::UpToDate => Ok(None),
        UpdateCheckResult::UpdateAvailable(info) => Ok(Some(info)),
        UpdateCheckResult::CheckFailed(err) => Err(UpdateError::from_shared(err)),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_release_summary(coordinator: &UpdateCoordinator, info: &ReleaseInfo) {
    println!(
        "{} Update available: {} (current {})",
        "✓".green(),
        info.version.to_string().bold(),
        coordinator.current_version()
    );
    if let Some(published) = info.published_at {
        println!("  Released: {}", published.format("%Y-%m-%d"));
    }
    println!("\nRelease notes:");
    let notes = info.notes();
    for line in notes.lines().take(NOTES_PREVIEW_LINES) {
        println!("  {line}");
    }
    if notes.lines().count() > NOTES_PREVIEW_LINES {
        println!("  ...");
    }
}

fn print_up_to_date(coordinator: &UpdateCoordinator) {
    println!(
        "{} You are up to date ({}).",
        "✓".green(),
        coordinator.current_version()
    );
}
