//! Release versions and the source of the running version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UpdateError};

/// A release version reduced to its `(major, minor, patch)` triple.
///
/// Pre-release and build metadata are accepted when parsing but dropped, so
/// `1.2.3-beta.1` and `1.2.3` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version such as `0.4.1` or a release tag such as `v0.4.1`.
    ///
    /// One leading `v`/`V` is stripped; the remainder must be three
    /// dot-separated non-negative integers. Leading zeros are accepted, so
    /// date-style tags such as `v2025.03.01` parse as `2025.3.1`.
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = || UpdateError::MalformedVersion(input.to_string());
        let trimmed = input.trim();
        let bare = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let (core, suffix) = bare
            .find(['-', '+'])
            .map_or((bare, ""), |at| bare.split_at(at));
        if !suffix.is_empty() && semver::Version::parse(&format!("0.0.0{suffix}")).is_err() {
            return Err(malformed());
        }

        let mut fields = core.split('.').map(parse_field);
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(Some(major)), Some(Some(minor)), Some(Some(patch)), None) => {
                Ok(Self::new(major, minor, patch))
            }
            _ => Err(malformed()),
        }
    }

    /// Render as a release tag (`vMAJOR.MINOR.PATCH`).
    #[must_use]
    pub fn to_tag(&self) -> String {
        format!("v{self}")
    }
}

fn parse_field(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    u64::from_str(field).ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

/// Supplies the version of the running application.
pub trait VersionSource: Send + Sync {
    /// The raw version string, e.g. `0.0.2`.
    fn current_version(&self) -> String;
}

/// Version compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageVersion;

impl VersionSource for PackageVersion {
    fn current_version(&self) -> String {
        crate::VERSION.to_string()
    }
}

/// A fixed version string, used for overrides and tests.
#[derive(Debug, Clone)]
pub struct StaticVersion(pub String);

impl StaticVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }
}

impl VersionSource for StaticVersion {
    fn current_version(&self) -> String {
        self.0.clone()
    }
}
