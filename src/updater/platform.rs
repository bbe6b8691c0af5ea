//! Host platform detection and installer asset selection.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, UpdateError};

use super::release::{Asset, ReleaseInfo};

/// Operating systems that receive installer assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

/// Installer file formats, identified by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallerKind {
    Dmg,
    Pkg,
    Exe,
    Msi,
    Deb,
    Rpm,
}

/// CPU architecture hint used to break ties between assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    Aarch64,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    #[must_use]
    pub const fn current() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else {
            None
        }
    }

    /// Installer kinds accepted on this platform, best first.
    #[must_use]
    pub fn installer_kinds(self) -> Vec<InstallerKind> {
        match self {
            Self::MacOs => vec![InstallerKind::Dmg, InstallerKind::Pkg],
            Self::Windows => vec![InstallerKind::Exe, InstallerKind::Msi],
            Self::Linux => {
                if prefers_rpm() {
                    vec![InstallerKind::Rpm, InstallerKind::Deb]
                } else {
                    vec![InstallerKind::Deb, InstallerKind::Rpm]
                }
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InstallerKind {
    /// Lower-case extension including the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Dmg => ".dmg",
            Self::Pkg => ".pkg",
            Self::Exe => ".exe",
            Self::Msi => ".msi",
            Self::Deb => ".deb",
            Self::Rpm => ".rpm",
        }
    }

    /// Infer the kind from a file name's extension.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        [
            Self::Dmg,
            Self::Pkg,
            Self::Exe,
            Self::Msi,
            Self::Deb,
            Self::Rpm,
        ]
        .into_iter()
        .find(|kind| lower.ends_with(kind.extension()))
    }
}

impl Arch {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_arch = "x86_64") {
            Self::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Self::Aarch64
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Other => "other",
        }
    }

    const fn hints(self) -> &'static [&'static str] {
        match self {
            Self::X86_64 => &["x86_64", "amd64", "x64"],
            Self::Aarch64 => &["aarch64", "arm64"],
            Self::Other => &[],
        }
    }

    fn matches(self, lower_name: &str) -> bool {
        self.hints().iter().any(|hint| lower_name.contains(hint))
    }
}

/// Picks the installer asset for one host.
#[derive(Debug, Clone)]
pub struct AssetSelector {
    platform: Platform,
    kinds: Vec<InstallerKind>,
    arch: Arch,
}

impl AssetSelector {
    #[must_use]
    pub fn new(platform: Platform, arch: Arch) -> Self {
        Self {
            platform,
            kinds: platform.installer_kinds(),
            arch,
        }
    }

    /// Selector for the running host, if it is a supported platform.
    #[must_use]
    pub fn for_host() -> Option<Self> {
        Platform::current().map(|platform| Self::new(platform, Arch::current()))
    }

    /// Override the accepted installer kinds (best first).
    #[must_use]
    pub fn with_kinds(mut self, kinds: Vec<InstallerKind>) -> Self {
        self.kinds = kinds;
        self
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn kinds(&self) -> &[InstallerKind] {
        &self.kinds
    }

    /// Choose the best asset of `release` for this host.
    ///
    /// Ranking, best first: installer kind priority, extension as suffix
    /// before mid-name match, architecture hint present, registry order.
    pub fn select<'a>(&self, release: &'a ReleaseInfo) -> Result<&'a Asset> {
        release
            .assets
            .iter()
            .enumerate()
            .filter_map(|(index, asset)| self.rank(asset).map(|rank| (rank, index, asset)))
            .min_by_key(|(rank, index, _)| (*rank, *index))
            .map(|(_, _, asset)| asset)
            .ok_or_else(|| UpdateError::NoMatchingAsset {
                platform: self.platform.to_string(),
                tag: release.tag.clone(),
            })
    }

    fn rank(&self, asset: &Asset) -> Option<(usize, bool, bool)> {
        if asset.is_checksum_file() {
            return None;
        }
        let lower = asset.name.to_lowercase();
        self.kinds.iter().enumerate().find_map(|(priority, kind)| {
            let ext = kind.extension();
            if !lower.contains(ext) {
                return None;
            }
            let not_suffix = !lower.ends_with(ext);
            let no_arch = !self.arch.matches(&lower);
            Some((priority, not_suffix, no_arch))
        })
    }
}

/// Whether a Linux host looks RPM-based (rpm present, dpkg absent).
fn prefers_rpm() -> bool {
    which::which("rpm").is_ok() && which::which("dpkg").is_err()
}
