//! Auto-update for the cluster manager desktop app.
//!
//! The [`UpdateCoordinator`] asks a [`VersionSource`] for the running
//! version, fetches the latest release from a [`ReleaseRegistry`], picks
//! the installer for this host, streams it from an [`AssetStore`] into a
//! scoped temporary directory and finally hands it to an
//! [`InstallerLauncher`]. Network work always runs on worker threads.

pub mod coordinator;
pub mod download;
pub mod launcher;
pub mod platform;
pub mod registry;
pub mod release;
pub mod scheduler;
pub mod version;

pub use coordinator::{
    CheckHandle, CheckTrigger, CoordinatorBuilder, DownloadHandle, UpdateCheckResult,
    UpdateCoordinator,
};
pub use download::{CancelToken, DownloadOptions, DownloadProgress, DownloadedUpdate};
pub use launcher::{InstallerLauncher, LaunchOutcome, SystemLauncher};
pub use platform::{Arch, AssetSelector, InstallerKind, Platform};
pub use registry::{AssetStore, AssetStream, ClientOptions, GitHubClient, ReleaseRegistry};
pub use release::{Asset, ReleaseInfo};
pub use scheduler::{AutoCheckScheduler, UpdateEvent};
pub use version::{PackageVersion, StaticVersion, Version, VersionSource};
