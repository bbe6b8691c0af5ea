//! Shared mock-registry fixture.

use std::time::Duration;

use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use ucm_updater::updater::{
    Arch, AssetSelector, ClientOptions, GitHubClient, InstallerKind, Platform, StaticVersion,
    UpdateCoordinator,
};

pub const REPO: &str = "uci/cluster-manager";
pub const LATEST_PATH: &str = "/repos/uci/cluster-manager/releases/latest";

pub struct RegistryFixture {
    pub server: MockServer,
    pub download_root: TempDir,
}

impl RegistryFixture {
    pub fn new() -> Self {
        Self {
            server: MockServer::start(),
            download_root: TempDir::new().unwrap(),
        }
    }

    pub fn client(&self) -> GitHubClient {
        GitHubClient::new(
            REPO,
            ClientOptions {
                api_base: self.server.base_url(),
                timeout: Duration::from_secs(5),
                download_timeout: Duration::from_secs(5),
                token: None,
            },
        )
        .unwrap()
    }

    /// Coordinator pinned to a Linux x86_64 host preferring `.deb`.
    pub fn coordinator(&self, current: &str) -> UpdateCoordinator {
        self.coordinator_with_interval(current, Duration::from_secs(3600))
    }

    pub fn coordinator_with_interval(
        &self,
        current: &str,
        interval: Duration,
    ) -> UpdateCoordinator {
        let client = std::sync::Arc::new(self.client());
        UpdateCoordinator::builder()
            .version_source(StaticVersion::new(current))
            .registry(client.clone())
            .asset_store(client)
            .selector(Some(linux_selector()))
            .check_interval(interval)
            .build()
            .unwrap()
    }

    /// Release document whose assets point back at this server.
    pub fn release_json(&self, tag: &str, assets: &[&str]) -> Value {
        let assets: Vec<Value> = assets
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "browser_download_url": self.server.url(format!("/download/{name}")),
                    "size": 0,
                })
            })
            .collect();
        json!({
            "tag_name": tag,
            "name": format!("UCI-ClusterManager {tag}"),
            "body": "- Faster node status refresh\n- Fixed balance display",
            "published_at": "2025-03-01T12:00:00Z",
            "html_url": "https://github.com/uci/cluster-manager/releases/latest",
            "assets": assets,
        })
    }

    pub fn mock_latest(&self, release: &Value) -> Mock<'_> {
        self.server.mock(|when, then| {
            when.method(GET).path(LATEST_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(release.clone());
        })
    }

    pub fn mock_asset(&self, name: &str, body: &[u8]) -> Mock<'_> {
        let path = format!("/download/{name}");
        let body = body.to_vec();
        self.server.mock(move |when, then| {
            when.method(GET).path(path);
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body(body);
        })
    }

    /// Entries left under the download root.
    pub fn leftover_entries(&self) -> usize {
        std::fs::read_dir(self.download_root.path()).unwrap().count()
    }
}

pub fn linux_selector() -> AssetSelector {
    AssetSelector::new(Platform::Linux, Arch::X86_64)
        .with_kinds(vec![InstallerKind::Deb, InstallerKind::Rpm])
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Asset list of a typical release.
pub const REGISTRY_ASSETS: &[&str] = &[
    "UCI-ClusterManager-0.0.3.dmg",
    "UCI-ClusterManager-0.0.3-setup.exe",
    "uci-clustermanager_0.0.3_amd64.deb",
    "uci-clustermanager-0.0.3.x86_64.rpm",
];
