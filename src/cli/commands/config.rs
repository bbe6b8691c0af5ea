//! ucm-update config - Show effective configuration

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::config::Config;
use crate::error::{Result, UpdateError};
use crate::updater::{Arch, Platform};

use super::print_json;

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Print only the location of the config file in effect
    #[arg(long)]
    pub path: bool,
}

/// Detected host facts that drive asset selection.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub platform: Option<String>,
    pub arch: String,
    pub installer_kinds: Vec<String>,
}

impl HostInfo {
    fn detect() -> Self {
        let platform = Platform::current();
        Self {
            platform: platform.map(|p| p.as_str().to_string()),
            arch: Arch::current().as_str().to_string(),
            installer_kinds: platform
                .map(|p| {
                    p.installer_kinds()
                        .iter()
                        .map(|kind| kind.extension().to_string())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse<'a> {
    pub config_path: Option<PathBuf>,
    pub current_version: String,
    pub host: HostInfo,
    pub config: &'a Config,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    // The file actually read, else where the per-user file would be.
    let config_path = ctx.config.source.clone().or_else(Config::global_path);

    if args.path {
        match (&config_path, ctx.robot_mode) {
            (path, true) => print_json(&serde_json::json!({ "config_path": path }))?,
            (Some(path), false) => println!("{}", path.display()),
            (None, false) => println!("(no config directory on this host)"),
        }
        return Ok(());
    }

    let response = ConfigResponse {
        config_path,
        current_version: ctx.coordinator.current_version(),
        host: HostInfo::detect(),
        config: &ctx.config,
    };

    if ctx.robot_mode {
        return print_json(&response);
    }

    let rendered = toml::to_string_pretty(response.config)
        .map_err(|err| UpdateError::Config(format!("render config: {err}")))?;

    println!("{}", "Host".bold());
    println!(
        "  platform: {}",
        response.host.platform.as_deref().unwrap_or("unsupported")
    );
    println!("  arch: {}", response.host.arch);
    println!("  installers: {}", response.host.installer_kinds.join(", "));
    println!("  current version: {}", response.current_version);
    if let Some(path) = &response.config_path {
        let marker = if path.exists() { "" } else { " (not present)" };
        println!("  config file: {}{marker}", path.display());
    }
    println!("\n{}", "Effective configuration".bold());
    print!("{rendered}");
    Ok(())
}
