//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy keyed by update stage:
//! - 1xx: Registry contract errors
//! - 2xx: Download errors
//! - 3xx: Installer launch errors
//! - 4xx: Config errors
//! - 5xx: Network errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `MalformedResponse` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Registry errors (1xx)
    // ========================================
    /// E101: Registry answered with a document missing required fields
    MalformedResponse,
    /// E102: Release tag (or current version) is not MAJOR.MINOR.PATCH
    MalformedVersion,
    /// E103: Release has no installer for this platform
    NoMatchingAsset,

    // ========================================
    // Download errors (2xx)
    // ========================================
    /// E201: Transfer or disk failure while downloading
    DownloadFailed,
    /// E202: Download cancelled by the caller
    DownloadCancelled,

    // ========================================
    // Launch errors (3xx)
    // ========================================
    /// E301: Installer could not be started
    LaunchFailed,

    // ========================================
    // Config errors (4xx)
    // ========================================
    /// E401: Config file or override has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Network errors (5xx)
    // ========================================
    /// E501: Registry unreachable, timed out, or returned an HTTP error
    NetworkError,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Local IO operation failed
    IoError,
    /// E902: Serialization/deserialization failed
    SerializationError,
    /// E903: A registry or version source panicked during a check
    InternalError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `MalformedResponse` -> 101).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::MalformedResponse => 101,
            Self::MalformedVersion => 102,
            Self::NoMatchingAsset => 103,
            Self::DownloadFailed => 201,
            Self::DownloadCancelled => 202,
            Self::LaunchFailed => 301,
            Self::ConfigInvalid => 401,
            Self::NetworkError => 501,
            Self::IoError => 901,
            Self::SerializationError => 902,
            Self::InternalError => 903,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::MalformedResponse => "Unable to determine update status. The release registry returned an unexpected document; try again later",
            Self::MalformedVersion => "Unable to determine update status. The latest release tag is not a vMAJOR.MINOR.PATCH version",
            Self::NoMatchingAsset => "No installer was published for this platform. Download the release manually from the project page",
            Self::DownloadFailed => "Check disk space and network connectivity, then retry the download",
            Self::DownloadCancelled => "The download was cancelled. Start it again when ready",
            Self::LaunchFailed => "Open the downloaded installer manually, or reinstall from the project page",
            Self::ConfigInvalid => "Run `ucm-update config` to see effective values. Check TOML syntax and UCM_* environment variables",
            Self::NetworkError => "Check your network connection. The application keeps running at its current version",
            Self::IoError => "File operation failed. Check the path exists and permissions are correct",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",
            Self::InternalError => "An internal error interrupted the update check. Retry, and report it if it persists",
        }
    }

    /// Check if the user can retry or act to resolve this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::NoMatchingAsset
            | Self::DownloadFailed
            | Self::DownloadCancelled
            | Self::LaunchFailed
            | Self::ConfigInvalid
            | Self::NetworkError
            | Self::IoError => true,

            // Registry contract violations are not retried automatically
            Self::MalformedResponse
            | Self::MalformedVersion
            | Self::SerializationError
            | Self::InternalError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "registry",
            2 => "download",
            3 => "launch",
            4 => "config",
            5 => "network",
            9 => "internal",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.numeric())
    }
}
