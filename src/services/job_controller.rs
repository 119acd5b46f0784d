use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::errors::TrackerError;
use crate::external::update_api::UpdateApi;
use crate::models::{cancel_failed_line, JobLogEntry, JobView};
use crate::services::job_poller::{self, JobStatusPoller, PollerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The runner accepted the request; the view was moved to `Cancelled`.
    Accepted,
    /// Nothing was running, no request was sent.
    NotRunning,
}

/// Single authority for starting, adopting and cancelling the dataset update.
///
/// The runner owns the job. This controller keeps a read-only snapshot,
/// owns the one poll timer and publishes every change to subscribers.
pub struct JobController {
    api: Arc<dyn UpdateApi>,
    state: Arc<watch::Sender<JobView>>,
    poller: Mutex<Option<PollerHandle>>,
    poll_interval: Duration,
    starting: AtomicBool,
}

/// Held while a start request is in flight; releases the claim when dropped.
struct StartClaim<'a>(&'a AtomicBool);

impl Drop for StartClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl JobController {
    pub fn new(api: Arc<dyn UpdateApi>, poll_interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(JobView::default());
        Self {
            api,
            state: Arc::new(tx),
            poller: Mutex::new(None),
            poll_interval,
            starting: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<JobView> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> JobView {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().is_running()
    }

    /// Ask the runner for a new update and start watching it.
    pub async fn start(&self) -> Result<(), TrackerError> {
        // Claim before checking the view: `begin` runs before the claim is released
        if self.starting.swap(true, Ordering::SeqCst) {
            warn!("Ignoring start request: another start is in flight");
            return Err(TrackerError::AlreadyRunning);
        }
        let _claim = StartClaim(&self.starting);

        if self.is_running() {
            warn!("Ignoring start request: an update is already running");
            return Err(TrackerError::AlreadyRunning);
        }

        if let Err(e) = self.api.start().await {
            error!("❌ Failed to start dataset update: {}", e);
            return Err(e.into());
        }

        info!("🚀 Dataset update started");
        self.state.send_modify(|view| view.begin(None));
        self.arm_poller();
        Ok(())
    }

    /// Join whatever the runner is doing right now, e.g. after a reload.
    ///
    /// Never issues a start request. Calling it again while running re-arms
    /// the poller instead of adding a second one.
    pub async fn resume_on_load(&self) -> Result<JobView, TrackerError> {
        let status = self.api.status().await?;

        if status.running {
            if !self.is_running() {
                info!("🔄 Attaching to running dataset update ({}s elapsed)", status.elapsed_seconds);
                self.state.send_modify(|view| view.begin(Some(&status)));
            } else {
                self.state.send_modify(|view| {
                    view.apply_status(status);
                });
            }
            self.arm_poller();
        } else if self.is_running() {
            // Finished while nobody was polling
            self.stop_poller();
            self.state.send_modify(|view| {
                view.apply_status(status);
            });
        }

        if let Err(e) = self.refresh_history().await {
            warn!("Failed to load update history: {}", e);
        }

        Ok(self.snapshot())
    }

    /// Request cancellation.
    ///
    /// An accepted request ends the run locally without waiting for the
    /// runner; a failed one leaves the run and its poller untouched.
    pub async fn cancel(&self) -> Result<CancelOutcome, TrackerError> {
        if !self.is_running() {
            return Ok(CancelOutcome::NotRunning);
        }

        match self.api.cancel().await {
            Ok(()) => {
                if self.state.send_if_modified(|view| view.mark_cancelled()) {
                    self.stop_poller();
                    info!("🛑 Dataset update cancelled");
                    Ok(CancelOutcome::Accepted)
                } else {
                    // Finished while the request was in flight; the poller still
                    // owns the terminal transition and its history reload
                    Ok(CancelOutcome::NotRunning)
                }
            }
            Err(e) => {
                error!("❌ Failed to cancel dataset update: {}", e);
                let line = cancel_failed_line(&e.user_message());
                self.state.send_if_modified(|view| {
                    if !view.is_running() {
                        return false;
                    }
                    view.progress.push(line);
                    true
                });
                Err(e.into())
            }
        }
    }

    /// Return a finished run to `Idle`.
    pub fn dismiss(&self) {
        self.state.send_if_modified(|view| view.dismiss());
    }

    pub async fn refresh_history(&self) -> Result<Vec<JobLogEntry>, TrackerError> {
        job_poller::refresh_history(self.api.as_ref(), &self.state).await?;
        Ok(self.state.borrow().history.clone())
    }

    pub async fn download_log(&self, filename: &str) -> Result<Vec<u8>, TrackerError> {
        let name = validate_log_filename(filename)?;
        Ok(self.api.download_log(name).await?)
    }

    /// Tear down the poller whatever the job state.
    pub fn shutdown(&self) {
        self.stop_poller();
    }

    pub fn has_active_poller(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn arm_poller(&self) {
        let mut slot = self.poller.lock();
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        *slot = Some(
            JobStatusPoller::new(self.api.clone(), self.state.clone(), self.poll_interval).spawn(),
        );
    }

    fn stop_poller(&self) {
        // Taken out first so a stale handle is never stopped or re-armed twice
        let handle = self.poller.lock().take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

/// Check a log name from `update/logs` and return it trimmed.
pub fn validate_log_filename(filename: &str) -> Result<&str, TrackerError> {
    let name = filename.trim();
    if name.is_empty() {
        return Err(TrackerError::Validation("Nombre de archivo vacío".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(TrackerError::Validation(format!("Nombre de archivo inválido: {}", filename)));
    }
    Ok(name)
}
