//! Streaming installer downloads into scoped temporary directories.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{Result, UpdateError};

use super::platform::AssetSelector;
use super::registry::AssetStore;
use super::release::{Asset, CHECKSUM_FILE_NAMES, ReleaseInfo};
use super::version::Version;

/// Size of each read from the asset stream.
pub const CHUNK_SIZE: usize = 8192;

/// Prefix of every temporary download directory.
pub const TEMP_PREFIX: &str = "ucm-update-";

/// Shared flag used to abort an in-flight download.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bytes received so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub received: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Percentage complete, when the total is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some((self.received as f64 / total as f64 * 100.0).min(100.0)),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// Per-download settings.
#[derive(Clone, Default)]
pub struct DownloadOptions {
    /// Parent of the temporary directory; the system temp dir when `None`.
    pub download_dir: Option<PathBuf>,
    pub verify_checksums: bool,
    pub cancel: CancelToken,
    pub progress: Option<ProgressCallback>,
}

impl DownloadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            verify_checksums: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_progress(
        mut self,
        progress: impl Fn(DownloadProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    fn report(&self, progress: DownloadProgress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }
}

impl std::fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("download_dir", &self.download_dir)
            .field("verify_checksums", &self.verify_checksums)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// An installer on disk inside its own temporary directory.
///
/// The directory is deleted when this value is dropped unless [`keep`]
/// is called first.
///
/// [`keep`]: DownloadedUpdate::keep
#[derive(Debug)]
pub struct DownloadedUpdate {
    dir: TempDir,
    path: PathBuf,
    asset: Asset,
    version: Version,
    sha256: String,
    checksum_verified: bool,
}

impl DownloadedUpdate {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn asset(&self) -> &Asset {
        &self.asset
    }

    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    #[must_use]
    pub const fn checksum_verified(&self) -> bool {
        self.checksum_verified
    }

    /// Release the directory from automatic cleanup and return the
    /// installer path.
    #[must_use]
    pub fn keep(self) -> PathBuf {
        let _dir = self.dir.keep();
        self.path
    }
}

/// Selects, streams and verifies installer assets.
#[derive(Clone)]
pub struct Downloader {
    store: Arc<dyn AssetStore>,
    selector: Option<AssetSelector>,
}

impl Downloader {
    pub fn new(store: Arc<dyn AssetStore>, selector: Option<AssetSelector>) -> Self {
        Self { store, selector }
    }

    /// Pick the installer asset for this host without any transfer.
    pub fn select_asset<'a>(&self, info: &'a ReleaseInfo) -> Result<&'a Asset> {
        match &self.selector {
            Some(selector) => selector.select(info),
            None => Err(UpdateError::NoMatchingAsset {
                platform: std::env::consts::OS.to_string(),
                tag: info.tag.clone(),
            }),
        }
    }

    /// Download the host's installer for `info`.
    pub fn download(
        &self,
        info: &ReleaseInfo,
        options: &DownloadOptions,
    ) -> Result<DownloadedUpdate> {
        let asset = self.select_asset(info)?.clone();
        let file_name = Path::new(&asset.name)
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                UpdateError::DownloadFailed(format!(
                    "asset name {:?} is not a file name",
                    asset.name
                ))
            })?;

        let dir = create_temp_dir(options.download_dir.as_deref())?;
        let path = dir.path().join(file_name);
        info!(asset = %asset.name, dest = %path.display(), "downloading update");

        // Any early return below drops `dir`, removing the partial file.
        let received = self
            .stream_to(&asset, &path, options)
            .map_err(into_download_failure)?;

        let sha256 = compute_sha256(&path).map_err(into_download_failure)?;
        let checksum_verified = if options.verify_checksums {
            self.verify_checksum(info, &asset, &sha256)?
        } else {
            false
        };

        info!(
            asset = %asset.name,
            bytes = received,
            verified = checksum_verified,
            "download complete"
        );
        Ok(DownloadedUpdate {
            dir,
            path,
            asset,
            version: info.version,
            sha256,
            checksum_verified,
        })
    }

    fn stream_to(&self, asset: &Asset, dest: &Path, options: &DownloadOptions) -> Result<u64> {
        if options.cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        let mut stream = self.store.open(&asset.download_url)?;
        let total = stream
            .content_length
            .or_else(|| (asset.size > 0).then_some(asset.size));

        let mut writer = BufWriter::new(File::create(dest)?);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received: u64 = 0;

        loop {
            if options.cancel.is_cancelled() {
                debug!(received, "download cancelled");
                return Err(UpdateError::Cancelled);
            }
            let n = match stream.reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(UpdateError::DownloadFailed(format!(
                        "transfer interrupted after {received} bytes: {err}"
                    )));
                }
            };
            writer.write_all(&buf[..n])?;
            received += n as u64;
            options.report(DownloadProgress { received, total });
        }

        writer.flush()?;
        writer.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()?;

        if let Some(expected) = total {
            if received < expected {
                return Err(UpdateError::DownloadFailed(format!(
                    "short download: received {received} of {expected} bytes"
                )));
            }
        }
        Ok(received)
    }

    /// Returns whether a published checksum was found and matched.
    fn verify_checksum(&self, info: &ReleaseInfo, asset: &Asset, actual: &str) -> Result<bool> {
        let Some(checksum_asset) = find_checksum_asset(info, &asset.name) else {
            debug!(tag = %info.tag, "release publishes no checksum file; skipping verification");
            return Ok(false);
        };

        let mut content = String::new();
        self.store
            .open(&checksum_asset.download_url)
            .and_then(|mut stream| Ok(stream.reader.read_to_string(&mut content)?))
            .map_err(|e| {
                UpdateError::DownloadFailed(format!(
                    "could not fetch checksum file {}: {e}",
                    checksum_asset.name
                ))
            })?;

        let per_asset = is_per_asset_checksum(&checksum_asset.name, &asset.name);
        let Some(expected) = expected_digest(&content, &asset.name, per_asset) else {
            warn!(
                checksum_file = %checksum_asset.name,
                asset = %asset.name,
                "checksum file does not list the installer; skipping verification"
            );
            return Ok(false);
        };

        if !expected.eq_ignore_ascii_case(actual) {
            return Err(UpdateError::DownloadFailed(format!(
                "checksum mismatch for {}: expected {expected}, got {actual}",
                asset.name
            )));
        }
        debug!(asset = %asset.name, "checksum verified");
        Ok(true)
    }
}

fn create_temp_dir(parent: Option<&Path>) -> Result<TempDir> {
    let parent = parent.map_or_else(std::env::temp_dir, Path::to_path_buf);
    std::fs::create_dir_all(&parent).map_err(|e| {
        UpdateError::DownloadFailed(format!("cannot create {}: {e}", parent.display()))
    })?;
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(&parent)
        .map_err(|e| {
            UpdateError::DownloadFailed(format!(
                "cannot create temporary directory in {}: {e}",
                parent.display()
            ))
        })
}

fn into_download_failure(err: UpdateError) -> UpdateError {
    match err {
        UpdateError::Cancelled | UpdateError::DownloadFailed(_) => err,
        other => UpdateError::DownloadFailed(other.to_string()),
    }
}

/// Find the checksum file covering `asset_name`, preferring a dedicated
/// `<asset>.sha256` over a combined sums file.
#[must_use]
pub fn find_checksum_asset<'a>(info: &'a ReleaseInfo, asset_name: &str) -> Option<&'a Asset> {
    let dedicated = format!("{}.sha256", asset_name.to_lowercase());
    info.assets
        .iter()
        .find(|a| a.name.to_lowercase() == dedicated)
        .or_else(|| {
            info.assets
                .iter()
                .find(|a| CHECKSUM_FILE_NAMES.contains(&a.name.to_lowercase().as_str()))
        })
}

fn is_per_asset_checksum(checksum_name: &str, asset_name: &str) -> bool {
    checksum_name.eq_ignore_ascii_case(&format!("{asset_name}.sha256"))
}

/// Extract the expected hex digest for `asset_name` from a checksum file.
///
/// Accepts `<hex>  <name>` and `<hex> *<name>` lines; a per-asset file may
/// also hold a bare digest.
#[must_use]
pub fn expected_digest(content: &str, asset_name: &str, per_asset: bool) -> Option<String> {
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [hash] if per_asset && is_sha256_hex(hash) => return Some((*hash).to_lowercase()),
            [hash, .., name] if is_sha256_hex(hash) => {
                let name = name.trim_start_matches('*');
                let base = Path::new(name)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(name);
                if per_asset || base == asset_name {
                    return Some((*hash).to_lowercase());
                }
            }
            _ => {}
        }
    }
    None
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Hex SHA-256 of a file's contents.
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
