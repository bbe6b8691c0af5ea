//! ucm-update apply - Download and launch the installer

use std::io::{self, BufRead, Write};

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::error::{Result, UpdateError};
use crate::updater::LaunchOutcome;

use super::{
    UpdateCheckResponse, check_for_release, download, print_json, print_release_summary,
    print_up_to_date,
};

#[derive(Args, Debug, Default)]
pub struct ApplyArgs {
    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Response for an installer hand-off (robot mode).
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResponse {
    pub old_version: String,
    pub new_version: String,
    pub notes: String,
    pub launch: LaunchOutcome,
}

pub fn run(ctx: &AppContext, args: &ApplyArgs) -> Result<()> {
    if ctx.robot_mode && !args.yes {
        return Err(UpdateError::Config(
            "apply in robot mode requires --yes".to_string(),
        ));
    }

    let Some(info) = check_for_release(ctx)? else {
        if ctx.robot_mode {
            return print_json(&UpdateCheckResponse::new(&ctx.coordinator, None));
        }
        print_up_to_date(&ctx.coordinator);
        return Ok(());
    };

    if !ctx.robot_mode {
        print_release_summary(&ctx.coordinator, &info);
        if !args.yes && !confirm(&format!("\nInstall version {}?", info.version))? {
            println!("Update cancelled.");
            return Ok(());
        }
    }

    let update = download::fetch(ctx, &info, true)?;
    let launch = ctx.coordinator.install_update(update)?;

    if ctx.robot_mode {
        return print_json(&ApplyResponse {
            old_version: ctx.coordinator.current_version(),
            new_version: info.version.to_string(),
            notes: info.body,
            launch,
        });
    }

    println!(
        "{} Installer started via {}: {}",
        "✓".green(),
        launch.method,
        launch.path.display()
    );
    if launch.restart_required {
        println!("Quit UCI-ClusterManager to let the installer finish.");
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
