use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::external::update_api::{ApiError, UpdateApi};
use crate::models::{JobPhase, JobView};

/// Owner of one running poll task. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Abort the task. Safe to call any number of times.
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polls `update/status` on a fixed interval until the run reaches a terminal state.
pub struct JobStatusPoller {
    api: Arc<dyn UpdateApi>,
    state: Arc<watch::Sender<JobView>>,
    interval: Duration,
}

impl JobStatusPoller {
    pub fn new(api: Arc<dyn UpdateApi>, state: Arc<watch::Sender<JobView>>, interval: Duration) -> Self {
        Self { api, state, interval }
    }

    pub fn spawn(self) -> PollerHandle {
        PollerHandle {
            task: tokio::spawn(self.run()),
        }
    }

    async fn run(self) {
        // First fetch happens one full interval after arming
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let status = match self.api.status().await {
                Ok(status) => status,
                Err(e) => {
                    // Next tick self-corrects
                    debug!("Status poll skipped: {}", e);
                    continue;
                }
            };

            let terminal = !status.running;
            let changed = self.state.send_if_modified(|view| view.apply_status(status));

            if !terminal {
                continue;
            }

            if changed {
                let phase = self.state.borrow().phase;
                match phase {
                    JobPhase::Completed => info!("✅ Dataset update completed"),
                    _ => warn!("❌ Dataset update finished with errors"),
                }
                if let Err(e) = refresh_history(self.api.as_ref(), &self.state).await {
                    warn!("Failed to refresh update history: {}", e);
                }
            }
            break;
        }

        debug!("Status poller stopped");
    }
}

/// Reload the finished-run list into the shared view.
pub async fn refresh_history(api: &dyn UpdateApi, state: &watch::Sender<JobView>) -> Result<(), ApiError> {
    let history = api.logs().await?;
    state.send_if_modified(|view| {
        if view.history == history {
            return false;
        }
        view.history = history;
        true
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::scripted::{finished, running, ScriptedUpdateApi};
    use crate::models::{JobLogEntry, COMPLETED_LINE};

    fn running_state() -> Arc<watch::Sender<JobView>> {
        let mut view = JobView::default();
        view.begin(None);
        Arc::new(watch::channel(view).0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_waits_one_interval() {
        let api = Arc::new(ScriptedUpdateApi::new(vec![Ok(running(&["a"], 1))]));
        let state = running_state();
        let _handle = JobStatusPoller::new(api.clone(), state.clone(), Duration::from_secs(2)).spawn();

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(ScriptedUpdateApi::count(&api.status_calls), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ScriptedUpdateApi::count(&api.status_calls), 1);
        assert_eq!(state.borrow().progress, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_skipped() {
        let api = Arc::new(ScriptedUpdateApi::new(vec![
            Err(ApiError::Network("connection reset".into())),
            Ok(running(&["a"], 2)),
            Ok(finished(&["a", "b"], 4, 0, None)),
        ]));
        let state = running_state();
        let handle = JobStatusPoller::new(api.clone(), state.clone(), Duration::from_secs(2)).spawn();

        tokio::time::sleep(Duration::from_millis(2100)).await;
        // Failed tick left the synthetic line in place
        assert_eq!(state.borrow().progress.len(), 1);
        assert!(state.borrow().is_running());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(state.borrow().progress, vec!["a"]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(state.borrow().phase, JobPhase::Completed);
        assert_eq!(state.borrow().progress.last().map(String::as_str), Some(COMPLETED_LINE));
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_refreshes_history_once_and_stops() {
        let api = Arc::new(
            ScriptedUpdateApi::new(vec![Ok(finished(&["a"], 3, 0, None))]).with_logs(vec![JobLogEntry {
                date: "2024-05-01 10:00".into(),
                filename: "update_20240501.log".into(),
            }]),
        );
        let state = running_state();
        let handle = JobStatusPoller::new(api.clone(), state.clone(), Duration::from_secs(2)).spawn();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(ScriptedUpdateApi::count(&api.status_calls), 1);
        assert_eq!(ScriptedUpdateApi::count(&api.logs_calls), 1);
        assert_eq!(state.borrow().history.len(), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let api = Arc::new(ScriptedUpdateApi::new(vec![Ok(running(&["a"], 1))]));
        let state = running_state();
        let handle = JobStatusPoller::new(api.clone(), state.clone(), Duration::from_secs(2)).spawn();

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(ScriptedUpdateApi::count(&api.status_calls), 1);

        handle.stop();
        handle.stop();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ScriptedUpdateApi::count(&api.status_calls), 1);
    }
}
