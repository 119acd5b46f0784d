use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::external::update_api::{ApiError, UpdateApi};
use crate::models::{JobLogEntry, JobStatus};

/// In-memory runner that replays queued status responses.
///
/// The last queued status repeats once the queue is down to one entry.
pub struct ScriptedUpdateApi {
    statuses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
    start_result: Mutex<Result<(), ApiError>>,
    cancel_result: Mutex<Result<(), ApiError>>,
    logs: Mutex<Vec<JobLogEntry>>,
    cancel_delay: Mutex<Duration>,
    logs_delay: Mutex<Duration>,
    pub start_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub logs_calls: AtomicUsize,
}

impl ScriptedUpdateApi {
    pub fn new(statuses: Vec<Result<JobStatus, ApiError>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            start_result: Mutex::new(Ok(())),
            cancel_result: Mutex::new(Ok(())),
            logs: Mutex::new(Vec::new()),
            cancel_delay: Mutex::new(Duration::ZERO),
            logs_delay: Mutex::new(Duration::ZERO),
            start_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            logs_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_logs(self, logs: Vec<JobLogEntry>) -> Self {
        *self.logs.lock() = logs;
        self
    }

    pub fn push_status(&self, status: Result<JobStatus, ApiError>) {
        let mut queue = self.statuses.lock();
        // Drop a repeating tail so the new entry is served next.
        if queue.len() == 1 {
            queue.pop_front();
        }
        queue.push_back(status);
    }

    pub fn fail_start(&self, err: ApiError) {
        *self.start_result.lock() = Err(err);
    }

    pub fn fail_cancel(&self, err: ApiError) {
        *self.cancel_result.lock() = Err(err);
    }

    /// Hold `cancel` responses for `delay` before answering.
    pub fn delay_cancel(&self, delay: Duration) {
        *self.cancel_delay.lock() = delay;
    }

    pub fn delay_logs(&self, delay: Duration) {
        *self.logs_delay.lock() = delay;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn reset_status_calls(&self) {
        self.status_calls.store(0, Ordering::SeqCst);
    }
}

pub fn running(progress: &[&str], elapsed_seconds: u64) -> JobStatus {
    JobStatus {
        running: true,
        progress: progress.iter().map(|s| s.to_string()).collect(),
        elapsed_seconds,
        returncode: None,
        error: None,
    }
}

pub fn finished(progress: &[&str], elapsed_seconds: u64, returncode: i32, error: Option<&str>) -> JobStatus {
    JobStatus {
        running: false,
        progress: progress.iter().map(|s| s.to_string()).collect(),
        elapsed_seconds,
        returncode: Some(returncode),
        error: error.map(str::to_string),
    }
}

#[async_trait]
impl UpdateApi for ScriptedUpdateApi {
    async fn start(&self) -> Result<(), ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        // Suspend once like a real request would
        tokio::task::yield_now().await;
        self.start_result.lock().clone()
    }

    async fn status(&self) -> Result<JobStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.statuses.lock();
        if queue.len() > 1 {
            return queue.pop_front().unwrap_or_else(|| Ok(JobStatus::idle()));
        }
        queue.front().cloned().unwrap_or_else(|| Ok(JobStatus::idle()))
    }

    async fn cancel(&self) -> Result<(), ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.cancel_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.cancel_result.lock().clone()
    }

    async fn logs(&self) -> Result<Vec<JobLogEntry>, ApiError> {
        self.logs_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.logs_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.logs.lock().clone())
    }

    async fn download_log(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        if self.logs.lock().iter().any(|l| l.filename == filename) {
            Ok(format!("log {}", filename).into_bytes())
        } else {
            Err(ApiError::DownloadFailed(format!("HTTP 404 for {}", filename)))
        }
    }
}
