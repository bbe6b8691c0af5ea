//! ucm-updater - self-update coordinator for UCI-ClusterManager.
//!
//! The [`updater`] module is the embeddable library: release checks against
//! GitHub, platform asset downloads and installer hand-off. The [`cli`]
//! module is the thin `ucm-update` host around it.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod updater;

pub use error::{Result, UpdateError};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
