//! Shared state for one CLI invocation.

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::updater::UpdateCoordinator;

/// Everything a command needs: effective config, output mode and a
/// coordinator wired to the configured registry.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub coordinator: UpdateCoordinator,
    pub robot_mode: bool,
    pub quiet: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let coordinator = UpdateCoordinator::from_config(&config)?;
        Ok(Self {
            config,
            coordinator,
            robot_mode: cli.robot,
            quiet: cli.quiet,
        })
    }
}
