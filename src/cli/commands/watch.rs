//! ucm-update watch - Run automatic checks in the foreground

use std::time::Duration;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::progress::ProgressReporter;
use crate::error::{Result, UpdateError};
use crate::updater::{AutoCheckScheduler, UpdateEvent};

use super::print_json;

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Exit after this many events
    #[arg(long)]
    pub count: Option<usize>,

    /// Override the startup delay before the first check (seconds)
    #[arg(long)]
    pub delay: Option<u64>,
}

/// One scheduler event (robot mode, one JSON document per event).
#[derive(Debug, Clone, Serialize)]
pub struct WatchEvent {
    pub event: &'static str,
    pub message: String,
    pub latest_version: Option<String>,
    pub error_code: Option<String>,
}

impl From<&UpdateEvent> for WatchEvent {
    fn from(event: &UpdateEvent) -> Self {
        match event {
            UpdateEvent::UpdateAvailable(info) => Self {
                event: "update_available",
                message: event.user_message(),
                latest_version: Some(info.version.to_string()),
                error_code: None,
            },
            UpdateEvent::CheckFailed(err) => Self {
                event: "check_failed",
                message: event.user_message(),
                latest_version: None,
                error_code: Some(err.code().code_string()),
            },
        }
    }
}

pub fn run(ctx: &AppContext, args: &WatchArgs) -> Result<()> {
    if !ctx.config.update.auto_check {
        return Err(UpdateError::Config(
            "automatic update checks are disabled (update.auto_check = false)".to_string(),
        ));
    }

    let delay = args
        .delay
        .map_or_else(|| ctx.config.update.startup_delay(), Duration::from_secs);
    let (tx, rx) = crossbeam_channel::unbounded();
    let scheduler = AutoCheckScheduler::spawn(ctx.coordinator.clone(), delay, move |event| {
        let _ = tx.send(event);
    })?;

    ProgressReporter::new(ctx.robot_mode, ctx.quiet).log(&format!(
        "watching for updates every {}h (first check in {}s)",
        ctx.config.update.check_interval_hours,
        delay.as_secs()
    ));

    let mut seen = 0usize;
    while args.count.is_none_or(|limit| seen < limit) {
        let Ok(event) = rx.recv() else { break };
        seen += 1;

        if ctx.robot_mode {
            print_json(&WatchEvent::from(&event))?;
            continue;
        }
        match &event {
            UpdateEvent::UpdateAvailable(_) => {
                println!("{} {}", "↑".green(), event.user_message());
            }
            UpdateEvent::CheckFailed(_) => {
                println!("{} {}", "!".yellow(), event.user_message());
            }
        }
    }

    scheduler.stop();
    Ok(())
}
