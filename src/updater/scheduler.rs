//! Background automatic update checks.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, UpdateError};

use super::coordinator::{CheckTrigger, UpdateCheckResult, UpdateCoordinator};
use super::release::ReleaseInfo;

/// Default wait between application start and the first automatic check.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(5);

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);
const MIN_WAIT: Duration = Duration::from_millis(10);

/// Something the user should be told about.
///
/// Automatic checks that find no update produce no event.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    UpdateAvailable(ReleaseInfo),
    CheckFailed(Arc<UpdateError>),
}

impl UpdateEvent {
    fn from_result(result: UpdateCheckResult) -> Option<Self> {
        match result {
            UpdateCheckResult::UpToDate => None,
            UpdateCheckResult::UpdateAvailable(info) => Some(Self::UpdateAvailable(info)),
            UpdateCheckResult::CheckFailed(err) => Some(Self::CheckFailed(err)),
        }
    }

    /// Notification text for this event.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UpdateAvailable(info) => {
                UpdateCheckResult::UpdateAvailable(info.clone()).user_message()
            }
            Self::CheckFailed(err) => {
                UpdateCheckResult::CheckFailed(Arc::clone(err)).user_message()
            }
        }
    }
}

/// Runs automatic checks on a background thread until stopped or dropped.
#[derive(Debug)]
pub struct AutoCheckScheduler {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AutoCheckScheduler {
    /// Start checking after `startup_delay`, then whenever the
    /// coordinator's interval has elapsed since the last completed check.
    pub fn spawn(
        coordinator: UpdateCoordinator,
        startup_delay: Duration,
        sink: impl Fn(UpdateEvent) + Send + 'static,
    ) -> Result<Self> {
        let (shutdown, shutdown_rx) = bounded::<()>(0);
        let thread = thread::Builder::new()
            .name("ucm-update-scheduler".to_string())
            .spawn(move || run(&coordinator, startup_delay, &shutdown_rx, &sink))?;

        info!(
            delay_secs = startup_delay.as_secs_f64(),
            "automatic update checks scheduled"
        );
        Ok(Self {
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    /// Start per `config`; `None` when automatic checks are disabled.
    pub fn from_config(
        coordinator: UpdateCoordinator,
        config: &Config,
        sink: impl Fn(UpdateEvent) + Send + 'static,
    ) -> Result<Option<Self>> {
        if !config.update.auto_check {
            debug!("automatic update checks disabled");
            return Ok(None);
        }
        Self::spawn(coordinator, config.update.startup_delay(), sink).map(Some)
    }

    /// Stop the scheduler and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        drop(self.shutdown.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for AutoCheckScheduler {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

fn run(
    coordinator: &UpdateCoordinator,
    startup_delay: Duration,
    shutdown: &Receiver<()>,
    sink: &dyn Fn(UpdateEvent),
) {
    let mut wait = startup_delay;
    loop {
        if !matches!(shutdown.recv_timeout(wait), Err(RecvTimeoutError::Timeout)) {
            break;
        }

        if let Some(handle) = coordinator.request_check(CheckTrigger::Automatic) {
            let result = loop {
                if let Some(result) = handle.wait_timeout(SHUTDOWN_POLL) {
                    break result;
                }
                if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                    debug!("scheduler stopping during an update check");
                    return;
                }
            };
            match UpdateEvent::from_result(result) {
                Some(event) => sink(event),
                None => debug!("automatic update check: up to date"),
            }
        }

        wait = coordinator.until_next_check().max(MIN_WAIT);
        debug!(next_in_secs = wait.as_secs(), "next automatic update check");
    }
    debug!("update scheduler stopped");
}
