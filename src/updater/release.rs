//! Release metadata as published by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};

use super::version::Version;

/// One remote release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub version: Version,
    pub tag: String,
    pub name: String,
    pub body: String,
    /// Assets in registry order; not sorted.
    pub assets: Vec<Asset>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Combined checksum file names, matched case-insensitively.
pub const CHECKSUM_FILE_NAMES: [&str; 3] = ["sha256sums", "sha256sums.txt", "checksums.txt"];

impl Asset {
    /// Whether this asset carries digests (`<name>.sha256` or a sums file)
    /// rather than an installer.
    #[must_use]
    pub fn is_checksum_file(&self) -> bool {
        let lower = self.name.to_lowercase();
        lower.ends_with(".sha256") || CHECKSUM_FILE_NAMES.contains(&lower.as_str())
    }
}

impl ReleaseInfo {
    /// Parse a registry "latest release" document.
    ///
    /// Unknown fields are ignored. A document that is not JSON or lacks
    /// `tag_name` or `assets` is a [`UpdateError::MalformedResponse`]; a
    /// tag that is not a version is a [`UpdateError::MalformedVersion`].
    pub fn from_registry_json(raw: &str) -> Result<Self> {
        let wire: WireRelease = serde_json::from_str(raw)
            .map_err(|err| UpdateError::MalformedResponse(format!("invalid JSON: {err}")))?;
        wire.into_release_info()
    }

    /// Release notes, or a placeholder when none were published.
    #[must_use]
    pub fn notes(&self) -> &str {
        if self.body.trim().is_empty() {
            "No release notes available"
        } else {
            &self.body
        }
    }

    /// Look up an asset by exact name.
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Deserialize)]
struct WireRelease {
    tag_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    assets: Option<Vec<WireAsset>>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAsset {
    name: Option<String>,
    browser_download_url: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl WireRelease {
    fn into_release_info(self) -> Result<ReleaseInfo> {
        let tag = self
            .tag_name
            .ok_or_else(|| UpdateError::MalformedResponse("missing tag_name".to_string()))?;
        let wire_assets = self
            .assets
            .ok_or_else(|| UpdateError::MalformedResponse("missing assets".to_string()))?;

        let mut assets = Vec::with_capacity(wire_assets.len());
        for (index, asset) in wire_assets.into_iter().enumerate() {
            let (Some(name), Some(download_url)) = (asset.name, asset.browser_download_url) else {
                return Err(UpdateError::MalformedResponse(format!(
                    "asset {index} is missing name or browser_download_url"
                )));
            };
            assets.push(Asset {
                name,
                download_url,
                size: asset.size.unwrap_or(0),
            });
        }

        let version = Version::parse(&tag)?;

        let published_at = self
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(ReleaseInfo {
            version,
            name: self.name.unwrap_or_else(|| tag.clone()),
            tag,
            body: self.body.unwrap_or_default(),
            assets,
            published_at,
        })
    }
}
