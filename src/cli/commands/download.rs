//! ucm-update download - Fetch the installer for this platform

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::progress::ProgressReporter;
use crate::error::Result;
use crate::updater::{DownloadedUpdate, ReleaseInfo};

use super::{UpdateCheckResponse, check_for_release, print_json, print_up_to_date};

#[derive(Args, Debug, Default)]
pub struct DownloadArgs {
    /// Keep the installer on disk and print its path
    #[arg(long)]
    pub keep: bool,

    /// Skip checksum verification
    #[arg(long)]
    pub no_verify: bool,
}

/// Response for a download (robot mode).
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResponse {
    pub version: String,
    pub asset: String,
    pub sha256: String,
    pub checksum_verified: bool,
    /// Present only when the artifact was kept.
    pub path: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &DownloadArgs) -> Result<()> {
    let Some(info) = check_for_release(ctx)? else {
        if ctx.robot_mode {
            return print_json(&UpdateCheckResponse::new(&ctx.coordinator, None));
        }
        print_up_to_date(&ctx.coordinator);
        return Ok(());
    };

    let update = fetch(ctx, &info, !args.no_verify)?;
    let mut response = DownloadResponse {
        version: update.version().to_string(),
        asset: update.asset().name.clone(),
        sha256: update.sha256().to_string(),
        checksum_verified: update.checksum_verified(),
        path: None,
    };
    if args.keep {
        response.path = Some(update.keep());
    }

    if ctx.robot_mode {
        return print_json(&response);
    }

    println!("Downloaded {} ({})", response.asset.bold(), response.version);
    println!("  SHA-256: {}", response.sha256);
    if response.checksum_verified {
        println!("  {} checksum verified", "✓".green());
    }
    match &response.path {
        Some(path) => println!("  Saved to: {}", path.display()),
        None => println!("  Removed after verification (use --keep to retain it)"),
    }
    Ok(())
}

/// Download the installer for `info` with a progress bar.
pub(super) fn fetch(
    ctx: &AppContext,
    info: &ReleaseInfo,
    verify: bool,
) -> Result<DownloadedUpdate> {
    let asset = ctx.coordinator.select_asset(info)?;
    let reporter = ProgressReporter::new(ctx.robot_mode, ctx.quiet);
    let bar = Arc::new(reporter.download(
        (asset.size > 0).then_some(asset.size),
        &format!("Downloading {}", asset.name),
    ));

    let sink = Arc::clone(&bar);
    let options = ctx
        .config
        .update
        .download_options()
        .with_verify_checksums(ctx.config.update.verify_checksums && verify)
        .with_progress(move |progress| sink.update(progress));

    match ctx.coordinator.download_update(info, &options) {
        Ok(update) => {
            bar.finish_with_message("Download complete");
            Ok(update)
        }
        Err(err) => {
            bar.abandon_with_message(&err.to_string());
            Err(err)
        }
    }
}
