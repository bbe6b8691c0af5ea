//! The update coordinator: check, download and hand off to the installer.
//!
//! Every network operation runs on a worker thread and reports back over a
//! channel, so the interactive thread never blocks. At most one check is in
//! flight; concurrent requests subscribe to it and receive the same result.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, UpdateError};

use super::download::{CancelToken, DownloadOptions, DownloadedUpdate, Downloader};
use super::launcher::{InstallerLauncher, LaunchOutcome, SystemLauncher};
use super::platform::AssetSelector;
use super::registry::{AssetStore, ClientOptions, GitHubClient, ReleaseRegistry};
use super::release::ReleaseInfo;
use super::version::{PackageVersion, StaticVersion, Version, VersionSource};

/// Default spacing between automatic checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of one update check.
#[derive(Debug, Clone)]
pub enum UpdateCheckResult {
    UpToDate,
    UpdateAvailable(ReleaseInfo),
    CheckFailed(Arc<UpdateError>),
}

impl UpdateCheckResult {
    #[must_use]
    pub const fn is_update_available(&self) -> bool {
        matches!(self, Self::UpdateAvailable(_))
    }

    #[must_use]
    pub const fn release(&self) -> Option<&ReleaseInfo> {
        match self {
            Self::UpdateAvailable(info) => Some(info),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&UpdateError> {
        match self {
            Self::CheckFailed(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Text for a non-blocking user notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UpToDate => "You are running the latest version.".to_string(),
            Self::UpdateAvailable(info) => {
                format!("A new version ({}) is available.", info.version)
            }
            Self::CheckFailed(err) if err.is_registry_contract_violation() => {
                "Unable to determine update status.".to_string()
            }
            Self::CheckFailed(err) => format!("Update check failed: {err}"),
        }
    }
}

/// What started a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    /// User-initiated; bypasses the interval throttle.
    Manual,
    /// Scheduler-initiated; skipped while the last check is fresh.
    Automatic,
}

/// Receives the result of a requested check.
#[derive(Debug)]
pub struct CheckHandle {
    rx: Receiver<UpdateCheckResult>,
}

impl CheckHandle {
    /// Block until the check completes.
    #[must_use]
    pub fn wait(self) -> UpdateCheckResult {
        self.rx.recv().unwrap_or_else(|_| worker_lost("update check"))
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<UpdateCheckResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(worker_lost("update check")),
        }
    }

    /// The result, if it has arrived.
    pub fn try_result(&self) -> Option<UpdateCheckResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(worker_lost("update check")),
        }
    }
}

fn worker_lost(what: &str) -> UpdateCheckResult {
    UpdateCheckResult::CheckFailed(Arc::new(UpdateError::Io(std::io::Error::other(format!(
        "{what} worker stopped without a result"
    )))))
}

/// A download running on a worker thread.
#[derive(Debug)]
pub struct DownloadHandle {
    rx: Receiver<Result<DownloadedUpdate>>,
    cancel: CancelToken,
}

impl DownloadHandle {
    /// Request cancellation; observed before the next buffer read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Block until the download finishes.
    pub fn wait(self) -> Result<DownloadedUpdate> {
        self.rx.recv().unwrap_or_else(|_| {
            Err(UpdateError::DownloadFailed(
                "download worker stopped without a result".to_string(),
            ))
        })
    }

    pub fn try_result(&self) -> Option<Result<DownloadedUpdate>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(UpdateError::DownloadFailed(
                "download worker stopped without a result".to_string(),
            ))),
        }
    }
}

#[derive(Default)]
struct CheckState {
    /// Subscribers of the in-flight check, if one is running.
    in_flight: Option<Vec<Sender<UpdateCheckResult>>>,
    last_completed: Option<Instant>,
    last_checked_at: Option<DateTime<Utc>>,
}

struct Inner {
    version_source: Arc<dyn VersionSource>,
    registry: Arc<dyn ReleaseRegistry>,
    downloader: Downloader,
    launcher: Arc<dyn InstallerLauncher>,
    check_interval: Duration,
    state: Mutex<CheckState>,
    downloading: AtomicBool,
}

/// Coordinates update checks, downloads and installer hand-off.
///
/// Cheap to clone; clones share in-flight state and the last-check time.
#[derive(Clone)]
pub struct UpdateCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("check_interval", &self.inner.check_interval)
            .field("last_check", &self.last_check())
            .finish_non_exhaustive()
    }
}

/// Builder for [`UpdateCoordinator`].
#[derive(Default)]
pub struct CoordinatorBuilder {
    version_source: Option<Arc<dyn VersionSource>>,
    registry: Option<Arc<dyn ReleaseRegistry>>,
    store: Option<Arc<dyn AssetStore>>,
    launcher: Option<Arc<dyn InstallerLauncher>>,
    selector: Option<Option<AssetSelector>>,
    check_interval: Option<Duration>,
}

impl CoordinatorBuilder {
    #[must_use]
    pub fn version_source(mut self, source: impl VersionSource + 'static) -> Self {
        self.version_source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn ReleaseRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn asset_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn InstallerLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Override host detection; `None` means no asset ever matches.
    #[must_use]
    pub fn selector(mut self, selector: Option<AssetSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    #[must_use]
    pub const fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<UpdateCoordinator> {
        let registry = self
            .registry
            .ok_or_else(|| {
                UpdateError::Config("update coordinator needs a release registry".into())
            })?;
        let store = self
            .store
            .ok_or_else(|| UpdateError::Config("update coordinator needs an asset store".into()))?;
        let check_interval = self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL);
        if check_interval.is_zero() {
            return Err(UpdateError::Config("check interval must be positive".into()));
        }

        Ok(UpdateCoordinator {
            inner: Arc::new(Inner {
                version_source: self
                    .version_source
                    .unwrap_or_else(|| Arc::new(PackageVersion)),
                registry,
                downloader: Downloader::new(
                    store,
                    self.selector.unwrap_or_else(AssetSelector::for_host),
                ),
                launcher: self
                    .launcher
                    .unwrap_or_else(|| Arc::new(SystemLauncher::for_host())),
                check_interval,
                state: Mutex::new(CheckState::default()),
                downloading: AtomicBool::new(false),
            }),
        })
    }
}

impl UpdateCoordinator {
    #[must_use]
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    /// Coordinator wired to GitHub and the host OS per `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let options = ClientOptions {
            api_base: config.update.api_base.clone(),
            timeout: config.network.timeout(),
            download_timeout: config.network.download_timeout(),
            ..ClientOptions::default()
        };
        let client = Arc::new(GitHubClient::new(&config.update.repo, options)?);

        let mut builder = Self::builder()
            .registry(client.clone())
            .asset_store(client)
            .check_interval(config.update.check_interval());
        if let Some(version) = &config.update.current_version {
            builder = builder.version_source(StaticVersion::new(version.clone()));
        }
        builder.build()
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        self.inner.check_interval
    }

    /// The version this coordinator compares against.
    #[must_use]
    pub fn current_version(&self) -> String {
        self.inner.version_source.current_version()
    }

    /// Wall-clock time of the last completed check.
    #[must_use]
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_checked_at
    }

    /// Whether a check is currently running.
    #[must_use]
    pub fn is_checking(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    /// Whether an automatic check would run now.
    #[must_use]
    pub fn automatic_check_due(&self) -> bool {
        !self.inner.is_throttled(&self.inner.state.lock())
    }

    /// Time until the next automatic check is due.
    #[must_use]
    pub fn until_next_check(&self) -> Duration {
        let state = self.inner.state.lock();
        state.last_completed.map_or(Duration::ZERO, |last| {
            self.inner.check_interval.saturating_sub(last.elapsed())
        })
    }

    /// Start a check on a worker thread.
    ///
    /// Returns `None` for an automatic request while the last completed
    /// check is younger than the interval. If a check is already running the
    /// returned handle receives that check's result.
    pub fn request_check(&self, trigger: CheckTrigger) -> Option<CheckHandle> {
        let state = self.inner.state.lock();
        if trigger == CheckTrigger::Automatic
            && state.in_flight.is_none()
            && self.inner.is_throttled(&state)
        {
            debug!("automatic update check skipped; last check is recent");
            return None;
        }
        Some(self.subscribe(state, trigger))
    }

    /// Run a manual check and wait for it. Do not call from the
    /// interactive thread.
    #[must_use]
    pub fn check_now(&self) -> UpdateCheckResult {
        let state = self.inner.state.lock();
        self.subscribe(state, CheckTrigger::Manual).wait()
    }

    fn subscribe(
        &self,
        mut state: MutexGuard<'_, CheckState>,
        trigger: CheckTrigger,
    ) -> CheckHandle {
        let (tx, rx) = bounded(1);
        if let Some(subscribers) = state.in_flight.as_mut() {
            debug!(?trigger, "joining in-flight update check");
            subscribers.push(tx);
            return CheckHandle { rx };
        }
        state.in_flight = Some(vec![tx]);
        drop(state);

        debug!(?trigger, "starting update check");
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("ucm-update-check".to_string())
            .spawn(move || {
                // Subscribers must always be released, even if a collaborator panics.
                let result = panic::catch_unwind(AssertUnwindSafe(|| inner.run_check()))
                    .unwrap_or_else(|payload| {
                        let reason = panic_message(payload.as_ref());
                        warn!(%reason, "update check panicked");
                        UpdateCheckResult::CheckFailed(Arc::new(UpdateError::Internal(format!(
                            "update check panicked: {reason}"
                        ))))
                    });
                inner.finish_check(&result);
            });
        if let Err(err) = spawned {
            self.inner
                .finish_check(&UpdateCheckResult::CheckFailed(Arc::new(UpdateError::Io(err))));
        }
        CheckHandle { rx }
    }

    /// Download the host's installer for `info`, blocking until done.
    pub fn download_update(
        &self,
        info: &ReleaseInfo,
        options: &DownloadOptions,
    ) -> Result<DownloadedUpdate> {
        let _guard = DownloadGuard::acquire(&self.inner)?;
        self.inner.downloader.download(info, options)
    }

    /// Download on a worker thread. Fails immediately if another download
    /// is already running.
    pub fn start_download(
        &self,
        info: ReleaseInfo,
        options: DownloadOptions,
    ) -> Result<DownloadHandle> {
        let guard = DownloadGuard::acquire(&self.inner)?;
        let cancel = options.cancel.clone();
        let (tx, rx) = bounded(1);
        let inner = Arc::clone(&self.inner);

        thread::Builder::new()
            .name("ucm-update-download".to_string())
            .spawn(move || {
                let result = inner.downloader.download(&info, &options);
                drop(guard);
                let _ = tx.send(result);
            })?;

        Ok(DownloadHandle { rx, cancel })
    }

    /// Hand the installer at `path` to the OS. This is the last step of an
    /// update; on success the caller should exit.
    pub fn launch_installer(&self, path: &Path) -> Result<LaunchOutcome> {
        self.inner.launcher.launch(path).inspect_err(|err| {
            warn!(path = %path.display(), error = %err, "installer launch failed");
        })
    }

    /// Launch a downloaded installer. The artifact is kept on disk only when
    /// the hand-off succeeds; on failure its temporary directory is removed.
    pub fn install_update(&self, update: DownloadedUpdate) -> Result<LaunchOutcome> {
        let launch = self.launch_installer(update.path())?;
        let _kept = update.keep();
        Ok(launch)
    }

    /// Pick the installer asset for `info` without downloading.
    pub fn select_asset<'a>(&self, info: &'a ReleaseInfo) -> Result<&'a super::release::Asset> {
        self.inner.downloader.select_asset(info)
    }
}

impl Inner {
    fn is_throttled(&self, state: &CheckState) -> bool {
        state
            .last_completed
            .is_some_and(|last| last.elapsed() < self.check_interval)
    }

    fn run_check(&self) -> UpdateCheckResult {
        let raw = self.version_source.current_version();
        let current = match Version::parse(&raw) {
            Ok(version) => version,
            Err(err) => {
                warn!(version = %raw, "current version is malformed");
                return UpdateCheckResult::CheckFailed(Arc::new(err));
            }
        };

        match self.registry.fetch_latest() {
            Ok(info) if info.version > current => {
                info!(current = %current, latest = %info.version, "update available");
                UpdateCheckResult::UpdateAvailable(info)
            }
            Ok(info) => {
                info!(current = %current, latest = %info.version, "up to date");
                UpdateCheckResult::UpToDate
            }
            Err(err) => {
                warn!(error = %err, "update check failed");
                UpdateCheckResult::CheckFailed(Arc::new(err))
            }
        }
    }

    fn finish_check(&self, result: &UpdateCheckResult) {
        let subscribers = {
            let mut state = self.state.lock();
            state.last_completed = Some(Instant::now());
            state.last_checked_at = Some(Utc::now());
            state.in_flight.take().unwrap_or_default()
        };
        debug!(subscribers = subscribers.len(), "update check finished");
        for tx in subscribers {
            let _ = tx.send(result.clone());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Holds the single download slot; released on drop.
struct DownloadGuard {
    inner: Arc<Inner>,
}

impl DownloadGuard {
    fn acquire(inner: &Arc<Inner>) -> Result<Self> {
        inner
            .downloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                UpdateError::DownloadFailed("another download is already in progress".to_string())
            })?;
        Ok(Self {
            inner: Arc::clone(inner),
        })
    }
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.inner.downloading.store(false, Ordering::Release);
    }
}
