//! ucm-update check - Check for a newer release

use clap::Args;

use crate::app::AppContext;
use crate::cli::progress::ProgressReporter;
use crate::error::Result;

use super::{
    UpdateCheckResponse, check_for_release, print_json, print_release_summary, print_up_to_date,
};

#[derive(Args, Debug, Default)]
pub struct CheckArgs {}

pub fn run(ctx: &AppContext, _args: &CheckArgs) -> Result<()> {
    if ctx.robot_mode {
        let release = check_for_release(ctx)?;
        return print_json(&UpdateCheckResponse::new(&ctx.coordinator, release.as_ref()));
    }

    let progress = ProgressReporter::new(false, ctx.quiet);
    let spinner = progress.spinner("Checking for updates");
    let release = check_for_release(ctx)
        .inspect_err(|err| spinner.abandon_with_message(&err.to_string()))?;
    spinner.finish();

    match release {
        Some(info) => {
            print_release_summary(&ctx.coordinator, &info);
            if let Ok(asset) = ctx.coordinator.select_asset(&info) {
                println!("\nInstaller for this platform: {}", asset.name);
            }
            println!("\nRun `ucm-update apply` to install.");
        }
        None => print_up_to_date(&ctx.coordinator),
    }
    Ok(())
}
