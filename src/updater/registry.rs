//! Release registry access over the GitHub releases API.

use std::io::Read;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use tracing::debug;

use crate::error::{Result, UpdateError};

use super::release::ReleaseInfo;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_REPO: &str = "Dale-Black/UCI-ClusterManager";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

const ACCEPT: &str = "application/vnd.github+json";

/// Source of "latest release" metadata.
pub trait ReleaseRegistry: Send + Sync {
    fn fetch_latest(&self) -> Result<ReleaseInfo>;
}

/// Byte source for release assets.
pub trait AssetStore: Send + Sync {
    /// Open a streaming reader over the asset at `url`.
    fn open(&self, url: &str) -> Result<AssetStream>;
}

/// An open asset body.
pub struct AssetStream {
    pub reader: Box<dyn Read + Send>,
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
}

impl AssetStream {
    pub fn new(reader: impl Read + Send + 'static, content_length: Option<u64>) -> Self {
        Self {
            reader: Box::new(reader),
            content_length,
        }
    }
}

impl std::fmt::Debug for AssetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Connection settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_base: String,
    pub timeout: Duration,
    pub download_timeout: Duration,
    pub token: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            token: token_from_env(),
        }
    }
}

/// Blocking GitHub client serving both release metadata and asset bytes.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    owner: String,
    repo: String,
    options: ClientOptions,
}

impl GitHubClient {
    /// Create a client for `repo` (`owner/repo` or a GitHub URL).
    pub fn new(repo: &str, options: ClientOptions) -> Result<Self> {
        let (owner, repo) = parse_repo(repo)?;
        let client = Client::builder()
            .user_agent(user_agent())
            .connect_timeout(options.timeout)
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            owner,
            repo,
            options,
        })
    }

    /// URL of the "latest release" document.
    #[must_use]
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.options.api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    #[must_use]
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn get(&self, url: &str, timeout: Duration, accept: &str) -> Result<Response> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", accept)
            .timeout(timeout);
        if let Some(token) = &self.options.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| network_error(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Network(status_message(url, status)));
        }
        Ok(response)
    }
}

impl ReleaseRegistry for GitHubClient {
    fn fetch_latest(&self) -> Result<ReleaseInfo> {
        let url = self.latest_release_url();
        debug!(url = %url, "querying release registry");

        let response = self.get(&url, self.options.timeout, ACCEPT)?;
        let raw = response.text().map_err(|e| network_error(&url, &e))?;
        let info = ReleaseInfo::from_registry_json(&raw)?;

        debug!(tag = %info.tag, assets = info.assets.len(), "registry returned latest release");
        Ok(info)
    }
}

impl AssetStore for GitHubClient {
    fn open(&self, url: &str) -> Result<AssetStream> {
        debug!(url = %url, "opening asset");
        let response = self.get(url, self.options.download_timeout, "application/octet-stream")?;
        let content_length = response.content_length();
        Ok(AssetStream::new(response, content_length))
    }
}

fn user_agent() -> String {
    format!("ucm-updater/{}", crate::VERSION)
}

fn network_error(url: &str, err: &reqwest::Error) -> UpdateError {
    if err.is_timeout() {
        UpdateError::Network(format!("request to {url} timed out"))
    } else {
        UpdateError::Network(format!("request to {url} failed: {err}"))
    }
}

fn status_message(url: &str, status: StatusCode) -> String {
    match status {
        StatusCode::NOT_FOUND => format!("{url} returned HTTP 404 (no published release?)"),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            format!("{url} returned HTTP {status} (rate limited; set UCM_GITHUB_TOKEN)")
        }
        _ => format!("{url} returned HTTP {status}"),
    }
}

/// GitHub token from the environment.
#[must_use]
pub fn token_from_env() -> Option<String> {
    token_from_lookup(|key| std::env::var(key).ok())
}

fn token_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["UCM_GITHUB_TOKEN", "GITHUB_TOKEN", "GH_TOKEN"]
        .into_iter()
        .filter_map(lookup)
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
}

/// Split a repository reference into `(owner, repo)`.
pub fn parse_repo(input: &str) -> Result<(String, String)> {
    let trimmed = input.trim();
    let cleaned = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
        .or_else(|| trimmed.strip_prefix("github.com/"))
        .unwrap_or(trimmed);

    let parts: Vec<&str> = cleaned.trim_end_matches('/').split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(UpdateError::Config(format!(
            "invalid repo reference: {input:?} (expected owner/repo)"
        )));
    }

    Ok((
        parts[0].to_string(),
        parts[1].trim_end_matches(".git").to_string(),
    ))
}
