//! Progress reporting for the ucm-update CLI
//!
//! Adapts feedback to the output context:
//! - TTY mode: animated spinner and byte progress bar
//! - Non-TTY mode: simple line-by-line output
//! - Robot mode: JSON progress events to stderr
//! - Quiet mode: no output

use std::io::IsTerminal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::updater::DownloadProgress;

/// Robot mode emits at most one update per this many bytes.
const ROBOT_EMIT_STEP: u64 = 256 * 1024;

// ============================================================================
// Progress Mode Detection
// ============================================================================

/// Progress output mode based on terminal capabilities and user preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Tty,
    NonTty,
    Robot,
    Quiet,
}

impl ProgressMode {
    /// Detect the appropriate progress mode based on environment
    #[must_use]
    pub fn detect(robot_mode: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if robot_mode {
            Self::Robot
        } else if std::io::stderr().is_terminal() {
            Self::Tty
        } else {
            Self::NonTty
        }
    }

    #[must_use]
    pub const fn has_output(&self) -> bool {
        !matches!(self, Self::Quiet)
    }
}

// ============================================================================
// Progress Events (Robot Mode)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    SpinnerStart,
    SpinnerComplete,
    SpinnerError,
    DownloadStart,
    DownloadUpdate,
    DownloadComplete,
    DownloadError,
}

/// JSON progress event for robot mode
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub event: ProgressEventType,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl ProgressEvent {
    fn new(event: ProgressEventType, operation: &str) -> Self {
        Self {
            event_type: "progress",
            event,
            operation: operation.to_string(),
            received: None,
            total: None,
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    const fn with_bytes(mut self, received: u64, total: Option<u64>) -> Self {
        self.received = Some(received);
        self.total = total;
        self
    }

    fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            eprintln!("{json}");
        }
    }
}

// ============================================================================
// Progress Reporter
// ============================================================================

/// Creates spinners and download bars for the current output mode.
pub struct ProgressReporter {
    mode: ProgressMode,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(robot_mode: bool, quiet: bool) -> Self {
        Self {
            mode: ProgressMode::detect(robot_mode, quiet),
        }
    }

    #[must_use]
    pub const fn with_mode(mode: ProgressMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Spinner for an operation of unknown length (e.g. a registry query).
    #[must_use]
    pub fn spinner(&self, msg: &str) -> ProgressHandle {
        match self.mode {
            ProgressMode::Quiet => ProgressHandle::Noop,
            ProgressMode::Robot => {
                ProgressEvent::new(ProgressEventType::SpinnerStart, msg).emit();
                ProgressHandle::Robot {
                    operation: msg.to_string(),
                    is_download: false,
                    last_emitted: AtomicU64::new(0),
                }
            }
            ProgressMode::NonTty => {
                eprintln!("[ucm] {msg}...");
                ProgressHandle::NonTty
            }
            ProgressMode::Tty => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner())
                        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
                );
                pb.set_message(msg.to_string());
                pb.enable_steady_tick(Duration::from_millis(100));
                ProgressHandle::Tty(pb)
            }
        }
    }

    /// Byte progress bar for a download; `total` may be unknown.
    #[must_use]
    pub fn download(&self, total: Option<u64>, msg: &str) -> ProgressHandle {
        match self.mode {
            ProgressMode::Quiet => ProgressHandle::Noop,
            ProgressMode::Robot => {
                ProgressEvent::new(ProgressEventType::DownloadStart, msg)
                    .with_bytes(0, total)
                    .emit();
                ProgressHandle::Robot {
                    operation: msg.to_string(),
                    is_download: true,
                    last_emitted: AtomicU64::new(0),
                }
            }
            ProgressMode::NonTty => {
                eprintln!("[ucm] {msg}...");
                ProgressHandle::NonTty
            }
            ProgressMode::Tty => {
                let pb = total.map_or_else(ProgressBar::new_spinner, ProgressBar::new);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                        )
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█▓▒░"),
                );
                pb.set_message(msg.to_string());
                ProgressHandle::Tty(pb)
            }
        }
    }

    /// Log a message (respects quiet mode)
    pub fn log(&self, msg: &str) {
        match self.mode {
            ProgressMode::Quiet => {}
            ProgressMode::Robot => {
                let event = serde_json::json!({
                    "type": "log",
                    "message": msg,
                    "timestamp": Utc::now().to_rfc3339(),
                });
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
            ProgressMode::NonTty | ProgressMode::Tty => eprintln!("[ucm] {msg}"),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

// ============================================================================
// Progress Handle
// ============================================================================

/// Updates or finishes one progress indicator. Safe to share with the
/// download worker thread.
pub enum ProgressHandle {
    Tty(ProgressBar),
    NonTty,
    Robot {
        operation: String,
        is_download: bool,
        last_emitted: AtomicU64,
    },
    Noop,
}

impl ProgressHandle {
    /// Record download progress.
    pub fn update(&self, progress: DownloadProgress) {
        match self {
            Self::Tty(pb) => {
                if let Some(total) = progress.total {
                    if pb.length() != Some(total) {
                        pb.set_length(total);
                    }
                }
                pb.set_position(progress.received);
            }
            Self::Robot {
                operation,
                last_emitted,
                ..
            } => {
                let last = last_emitted.load(Ordering::Relaxed);
                if progress.received >= last + ROBOT_EMIT_STEP
                    || progress.total == Some(progress.received)
                {
                    last_emitted.store(progress.received, Ordering::Relaxed);
                    ProgressEvent::new(ProgressEventType::DownloadUpdate, operation)
                        .with_bytes(progress.received, progress.total)
                        .emit();
                }
            }
            Self::NonTty | Self::Noop => {}
        }
    }

    /// Finish with a success message
    pub fn finish_with_message(&self, msg: &str) {
        match self {
            Self::Tty(pb) => pb.finish_with_message(format!("✓ {msg}")),
            Self::Robot {
                operation,
                is_download,
                ..
            } => {
                let event = if *is_download {
                    ProgressEventType::DownloadComplete
                } else {
                    ProgressEventType::SpinnerComplete
                };
                ProgressEvent::new(event, operation).with_message(msg).emit();
            }
            Self::NonTty => eprintln!("[ucm] ✓ {msg}"),
            Self::Noop => {}
        }
    }

    /// Finish and remove the indicator
    pub fn finish(&self) {
        match self {
            Self::Tty(pb) => pb.finish_and_clear(),
            Self::Robot {
                operation,
                is_download,
                ..
            } => {
                let event = if *is_download {
                    ProgressEventType::DownloadComplete
                } else {
                    ProgressEventType::SpinnerComplete
                };
                ProgressEvent::new(event, operation).emit();
            }
            Self::NonTty | Self::Noop => {}
        }
    }

    /// Abandon with an error message
    pub fn abandon_with_message(&self, msg: &str) {
        match self {
            Self::Tty(pb) => pb.abandon_with_message(format!("✗ {msg}")),
            Self::Robot {
                operation,
                is_download,
                ..
            } => {
                let event = if *is_download {
                    ProgressEventType::DownloadError
                } else {
                    ProgressEventType::SpinnerError
                };
                ProgressEvent::new(event, operation).with_message(msg).emit();
            }
            Self::NonTty => eprintln!("[ucm] ✗ ERROR: {msg}"),
            Self::Noop => {}
        }
    }

    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }
}

// ============================================================================
// Tests
// ============================================================================
