use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};
use crate::updater::download::DownloadOptions;
use crate::updater::registry::{DEFAULT_API_BASE, DEFAULT_REPO, parse_repo};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    /// File the values were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Defaults, then the config file, then `UCM_*` environment overrides.
    ///
    /// The file is `explicit_path`, else `$UCM_CONFIG`, else
    /// `<config dir>/ucm/config.toml` when it exists.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit_path, &|key| std::env::var(key).ok())
    }

    fn load_with(
        explicit_path: Option<&Path>,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| lookup("UCM_CONFIG").map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(UpdateError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
            config.source = Some(path);
        } else if let Some(global) = Self::global_path() {
            if let Some(patch) = Self::load_patch(&global)? {
                config.merge_patch(patch);
                config.source = Some(global);
            }
        }

        config.apply_env_overrides(lookup)?;
        config.validate()?;

        Ok(config)
    }

    /// Location of the per-user config file.
    #[must_use]
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ucm/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| UpdateError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| UpdateError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.update {
            self.update.merge(patch);
        }
        if let Some(patch) = patch.network {
            self.network.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = env_string(lookup, "UCM_UPDATE_REPO") {
            self.update.repo = value;
        }
        if let Some(value) = env_string(lookup, "UCM_UPDATE_API_BASE") {
            self.update.api_base = value;
        }
        if let Some(value) = env_bool(lookup, "UCM_UPDATE_AUTO_CHECK")? {
            self.update.auto_check = value;
        }
        if let Some(value) = env_u64(lookup, "UCM_UPDATE_CHECK_INTERVAL_HOURS")? {
            self.update.check_interval_hours = value;
        }
        if let Some(value) = env_u64(lookup, "UCM_UPDATE_STARTUP_DELAY_SECS")? {
            self.update.startup_delay_secs = value;
        }
        if let Some(value) = env_bool(lookup, "UCM_UPDATE_VERIFY_CHECKSUMS")? {
            self.update.verify_checksums = value;
        }
        if let Some(value) = env_string(lookup, "UCM_UPDATE_DOWNLOAD_DIR") {
            self.update.download_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = env_string(lookup, "UCM_CURRENT_VERSION") {
            self.update.current_version = Some(value);
        }
        if let Some(value) = env_u64(lookup, "UCM_NETWORK_TIMEOUT_SECS")? {
            self.network.timeout_secs = value;
        }
        if let Some(value) = env_u64(lookup, "UCM_NETWORK_DOWNLOAD_TIMEOUT_SECS")? {
            self.network.download_timeout_secs = value;
        }
        Ok(())
    }

    /// Reject values the updater cannot run with.
    pub fn validate(&self) -> Result<()> {
        parse_repo(&self.update.repo)?;
        if self.update.api_base.trim().is_empty() {
            return Err(UpdateError::Config("update.api_base must not be empty".to_string()));
        }
        if self.update.check_interval_hours == 0 {
            return Err(UpdateError::Config(
                "update.check_interval_hours must be greater than 0".to_string(),
            ));
        }
        if self.network.timeout_secs == 0 || self.network.download_timeout_secs == 0 {
            return Err(UpdateError::Config(
                "network timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub auto_check: bool,
    #[serde(default)]
    pub check_interval_hours: u64,
    #[serde(default)]
    pub startup_delay_secs: u64,
    #[serde(default)]
    pub verify_checksums: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    /// Overrides the version compiled into the binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            auto_check: true,
            check_interval_hours: 24,
            startup_delay_secs: 5,
            verify_checksums: true,
            download_dir: None,
            current_version: None,
        }
    }
}

impl UpdateConfig {
    fn merge(&mut self, patch: UpdatePatch) {
        if let Some(value) = patch.repo {
            self.repo = value;
        }
        if let Some(value) = patch.api_base {
            self.api_base = value;
        }
        if let Some(value) = patch.auto_check {
            self.auto_check = value;
        }
        if let Some(value) = patch.check_interval_hours {
            self.check_interval_hours = value;
        }
        if let Some(value) = patch.startup_delay_secs {
            self.startup_delay_secs = value;
        }
        if let Some(value) = patch.verify_checksums {
            self.verify_checksums = value;
        }
        if let Some(value) = patch.download_dir {
            self.download_dir = Some(value);
        }
        if let Some(value) = patch.current_version {
            self.current_version = Some(value);
        }
    }

    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours.saturating_mul(3600))
    }

    #[must_use]
    pub const fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    /// Download settings derived from this section.
    #[must_use]
    pub fn download_options(&self) -> DownloadOptions {
        let options = DownloadOptions::new().with_verify_checksums(self.verify_checksums);
        match &self.download_dir {
            Some(dir) => options.with_download_dir(dir),
            None => options,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub download_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            download_timeout_secs: 600,
        }
    }
}

impl NetworkConfig {
    fn merge(&mut self, patch: NetworkPatch) {
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
        if let Some(value) = patch.download_timeout_secs {
            self.download_timeout_secs = value;
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub update: Option<UpdatePatch>,
    pub network: Option<NetworkPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UpdatePatch {
    pub repo: Option<String>,
    pub api_base: Option<String>,
    pub auto_check: Option<bool>,
    pub check_interval_hours: Option<u64>,
    pub startup_delay_secs: Option<u64>,
    pub verify_checksums: Option<bool>,
    pub download_dir: Option<PathBuf>,
    pub current_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NetworkPatch {
    pub timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
}

fn env_string(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn env_bool(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(UpdateError::Config(format!(
            "invalid {key} value {value}: expected true/false, yes/no, on/off or 1/0"
        ))),
    }
}

fn env_u64(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        Some(value) => value.trim().parse::<u64>().map(Some).map_err(|err| {
            UpdateError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}
