//! Hand-off of a downloaded installer to the host OS.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, UpdateError};

use super::platform::{InstallerKind, Platform};

const NOTIFY_TITLE: &str = "UCI-ClusterManager Update";
const NOTIFY_MESSAGE: &str =
    "Please drag the application to the Applications folder to complete the update.";

/// How an installer was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchOutcome {
    pub path: PathBuf,
    /// Launch mechanism, e.g. `hdiutil+open`, `xdg-open`, `exec`.
    pub method: String,
    /// The running application should exit so the installer can replace it.
    pub restart_required: bool,
}

/// Starts installers.
pub trait InstallerLauncher: Send + Sync {
    fn launch(&self, path: &Path) -> Result<LaunchOutcome>;
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Process spawning used by [`SystemLauncher`].
pub trait ProcessRunner: Send + Sync {
    /// Start `program` detached; do not wait for it.
    fn spawn(&self, program: &OsStr, args: &[OsString]) -> std::io::Result<()>;
    /// Run `program` to completion and capture its output.
    fn output(&self, program: &OsStr, args: &[OsString]) -> std::io::Result<CommandOutput>;
    /// Whether `program` can be found on `PATH`.
    fn has_tool(&self, program: &str) -> bool;
}

/// Runs real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessRunner;

impl ProcessRunner for OsProcessRunner {
    fn spawn(&self, program: &OsStr, args: &[OsString]) -> std::io::Result<()> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    }

    fn output(&self, program: &OsStr, args: &[OsString]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program).args(args).stdin(Stdio::null()).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn has_tool(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Platform-specific installer launcher.
pub struct SystemLauncher {
    platform: Option<Platform>,
    runner: Box<dyn ProcessRunner>,
}

impl std::fmt::Debug for SystemLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLauncher")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::for_host()
    }
}

impl SystemLauncher {
    /// Launcher for the running host.
    #[must_use]
    pub fn for_host() -> Self {
        Self::new(Platform::current(), Box::new(OsProcessRunner))
    }

    #[must_use]
    pub fn new(platform: Option<Platform>, runner: Box<dyn ProcessRunner>) -> Self {
        Self { platform, runner }
    }

    fn launch_dmg(&self, path: &Path) -> Result<String> {
        if self.runner.has_tool("hdiutil") {
            let args = [OsString::from("attach"), OsString::from("-nobrowse"), path.into()];
            match self.runner.output(OsStr::new("hdiutil"), &args) {
                Ok(out) if out.success => {
                    if let Some(mount) = parse_mount_point(&out.stdout) {
                        debug!(mount = %mount.display(), "disk image mounted");
                        self.spawn("open", &[mount.clone().into()])?;
                        if contains_app_bundle(&mount) {
                            self.notify();
                        }
                        return Ok("hdiutil+open".to_string());
                    }
                    warn!("hdiutil reported no /Volumes mount point; opening image directly");
                }
                Ok(out) => warn!(
                    stderr = %out.stderr.trim(),
                    "hdiutil attach failed; opening image directly"
                ),
                Err(err) => warn!(error = %err, "could not run hdiutil; opening image directly"),
            }
        }
        self.spawn("open", &[path.into()])?;
        Ok("open".to_string())
    }

    fn launch_linux_package(&self, path: &Path, kind: InstallerKind) -> Result<String> {
        if self.runner.has_tool("xdg-open") {
            self.spawn("xdg-open", &[path.into()])?;
            return Ok("xdg-open".to_string());
        }
        let (tool, flag) = if kind == InstallerKind::Rpm {
            ("rpm", "-U")
        } else {
            ("dpkg", "-i")
        };
        if !self.runner.has_tool("pkexec") {
            return Err(UpdateError::LaunchFailed(
                "neither xdg-open nor pkexec is available to install the package".to_string(),
            ));
        }
        self.spawn("pkexec", &[tool.into(), flag.into(), path.into()])?;
        Ok(format!("pkexec {tool}"))
    }

    fn notify(&self) {
        let script =
            format!("display notification \"{NOTIFY_MESSAGE}\" with title \"{NOTIFY_TITLE}\"");
        if let Err(err) = self
            .runner
            .spawn(OsStr::new("osascript"), &["-e".into(), script.into()])
        {
            debug!(error = %err, "notification not shown");
        }
    }

    fn spawn(&self, program: &str, args: &[OsString]) -> Result<()> {
        self.spawn_os(OsStr::new(program), args)
    }

    fn spawn_os(&self, program: &OsStr, args: &[OsString]) -> Result<()> {
        debug!(program = %program.to_string_lossy(), ?args, "spawning installer process");
        self.runner.spawn(program, args).map_err(|e| {
            UpdateError::LaunchFailed(format!("failed to start {}: {e}", program.to_string_lossy()))
        })
    }
}

impl InstallerLauncher for SystemLauncher {
    fn launch(&self, path: &Path) -> Result<LaunchOutcome> {
        let Some(platform) = self.platform else {
            return Err(UpdateError::LaunchFailed(format!(
                "installers cannot be launched on {}",
                std::env::consts::OS
            )));
        };
        if !path.is_file() {
            return Err(UpdateError::LaunchFailed(format!(
                "installer not found: {}",
                path.display()
            )));
        }
        let kind = InstallerKind::from_file_name(&path.to_string_lossy())
            .filter(|kind| platform.installer_kinds().contains(kind))
            .ok_or_else(|| {
                UpdateError::LaunchFailed(format!(
                    "unsupported installer format for {platform}: {}",
                    path.display()
                ))
            })?;

        let method = match kind {
            InstallerKind::Dmg => self.launch_dmg(path)?,
            InstallerKind::Pkg => {
                self.spawn("open", &[path.into()])?;
                "open".to_string()
            }
            InstallerKind::Exe => {
                self.spawn_os(path.as_os_str(), &[])?;
                "exec".to_string()
            }
            InstallerKind::Msi => {
                self.spawn("msiexec", &["/i".into(), path.into()])?;
                "msiexec".to_string()
            }
            InstallerKind::Deb | InstallerKind::Rpm => self.launch_linux_package(path, kind)?,
        };

        info!(path = %path.display(), method = %method, "installer launched");
        Ok(LaunchOutcome {
            path: path.to_path_buf(),
            method,
            restart_required: true,
        })
    }
}

/// Mount point from `hdiutil attach` output (the `/Volumes/...` column).
#[must_use]
pub fn parse_mount_point(stdout: &str) -> Option<PathBuf> {
    stdout.lines().find_map(|line| {
        line.find("/Volumes/")
            .map(|idx| PathBuf::from(line[idx..].trim_end()))
    })
}

fn contains_app_bundle(mount: &Path) -> bool {
    std::fs::read_dir(mount).is_ok_and(|entries| {
        entries
            .filter_map(std::result::Result::ok)
            .any(|entry| entry.path().extension().is_some_and(|ext| ext == "app"))
    })
}
