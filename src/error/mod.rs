//! Error handling for the updater.
//!
//! This module provides:
//! - [`UpdateError`]: The error enum for every update stage
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestion and context

mod codes;
mod suggestions;

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;
pub use suggestions::suggest_for_error;

/// Main error type for update operations.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed registry response: {0}")]
    MalformedResponse(String),

    #[error("Malformed version: {0:?}")]
    MalformedVersion(String),

    #[error("No installer asset for {platform} in release {tag}")]
    NoMatchingAsset { platform: String, tag: String },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Installer launch failed: {0}")]
    LaunchFailed(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UpdateError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Network(_) => ErrorCode::NetworkError,
            Self::MalformedResponse(_) => ErrorCode::MalformedResponse,
            Self::MalformedVersion(_) => ErrorCode::MalformedVersion,
            Self::NoMatchingAsset { .. } => ErrorCode::NoMatchingAsset,
            Self::DownloadFailed(_) => ErrorCode::DownloadFailed,
            Self::Cancelled => ErrorCode::DownloadCancelled,
            Self::LaunchFailed(_) => ErrorCode::LaunchFailed,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::MalformedVersion(raw) => Some(serde_json::json!({ "version": raw })),
            Self::NoMatchingAsset { platform, tag } => {
                Some(serde_json::json!({ "platform": platform, "tag": tag }))
            }
            _ => None,
        }
    }

    /// Whether this failure means the registry broke its contract.
    ///
    /// These are shown to the user as "unable to determine update status"
    /// and are never retried automatically.
    #[must_use]
    pub const fn is_registry_contract_violation(&self) -> bool {
        matches!(self, Self::MalformedResponse(_) | Self::MalformedVersion(_))
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_update_error(self)
    }

    /// Take ownership of an error shared between coalesced callers,
    /// rebuilding it when other references remain.
    #[must_use]
    pub fn from_shared(shared: Arc<Self>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| match shared.as_ref() {
            Self::Network(m) => Self::Network(m.clone()),
            Self::MalformedResponse(m) => Self::MalformedResponse(m.clone()),
            Self::MalformedVersion(m) => Self::MalformedVersion(m.clone()),
            Self::NoMatchingAsset { platform, tag } => Self::NoMatchingAsset {
                platform: platform.clone(),
                tag: tag.clone(),
            },
            Self::DownloadFailed(m) => Self::DownloadFailed(m.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::LaunchFailed(m) => Self::LaunchFailed(m.clone()),
            Self::Config(m) => Self::Config(m.clone()),
            Self::Io(err) => Self::Io(io::Error::new(err.kind(), err.to_string())),
            Self::Json(err) => Self::Json(serde_json::Error::io(io::Error::other(err.to_string()))),
            Self::Internal(m) => Self::Internal(m.clone()),
        })
    }
}

/// A structured error with machine-readable code, suggestion, and context.
///
/// Emitted in robot mode so that a GUI shell or script can render a
/// non-blocking notification without parsing prose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "NETWORK_ERROR")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 501)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "registry", "download", "network")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from an `UpdateError`.
    #[must_use]
    pub fn from_update_error(err: &UpdateError) -> Self {
        let mut structured = Self::new(err.code(), err.to_string());
        structured.context = err.context();
        structured.suggestion = suggest_for_error(structured.code, structured.context.as_ref());
        structured
    }

    /// Add context to this error.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&UpdateError> for StructuredError {
    fn from(err: &UpdateError) -> Self {
        Self::from_update_error(err)
    }
}

/// Result type alias using `UpdateError`.
pub type Result<T> = std::result::Result<T, UpdateError>;
