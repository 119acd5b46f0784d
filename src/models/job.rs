use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const STARTING_LINE: &str = "Iniciando actualización...";
pub const COMPLETED_LINE: &str = "✓ Actualización completada exitosamente";
pub const CANCELLED_LINE: &str = "✗ Actualización cancelada por el usuario";

/// Snapshot returned by `GET update/status`.
///
/// The server always sends the full accumulated progress log, never a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub running: bool,
    #[serde(default)]
    pub progress: Vec<String>,
    #[serde(default, deserialize_with = "de_elapsed_seconds")]
    pub elapsed_seconds: u64,
    #[serde(default)]
    pub returncode: Option<i32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatus {
    pub fn idle() -> Self {
        Self {
            running: false,
            progress: Vec::new(),
            elapsed_seconds: 0,
            returncode: None,
            error: None,
        }
    }
}

// Some runners report fractional seconds.
fn de_elapsed_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.filter(|s| s.is_finite()).map(|s| s.max(0.0).floor() as u64).unwrap_or(0))
}

/// A downloadable log artifact of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub date: String,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed | JobPhase::Cancelled)
    }
}

/// Client-side view of the dataset update, refreshed by every poll tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub phase: JobPhase,
    pub progress: Vec<String>,
    pub elapsed_seconds: u64,
    pub returncode: Option<i32>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub history: Vec<JobLogEntry>,
}

impl Default for JobView {
    fn default() -> Self {
        Self {
            phase: JobPhase::Idle,
            progress: Vec::new(),
            elapsed_seconds: 0,
            returncode: None,
            error: None,
            started_at: None,
            history: Vec::new(),
        }
    }
}

impl JobView {
    pub fn is_running(&self) -> bool {
        self.phase == JobPhase::Running
    }

    /// Enter `Running` for a run the client just started or adopted.
    pub fn begin(&mut self, status: Option<&JobStatus>) {
        self.phase = JobPhase::Running;
        self.returncode = None;
        self.error = None;
        self.started_at = Some(Utc::now());
        match status {
            Some(s) if !s.progress.is_empty() => {
                self.progress = s.progress.clone();
                self.elapsed_seconds = s.elapsed_seconds;
            }
            Some(s) => {
                self.progress = vec![STARTING_LINE.to_string()];
                self.elapsed_seconds = s.elapsed_seconds;
            }
            None => {
                self.progress = vec![STARTING_LINE.to_string()];
                self.elapsed_seconds = 0;
            }
        }
    }

    /// Apply a poll snapshot. Returns true when the view changed.
    ///
    /// Snapshots are ignored once the view has left `Running`, so a late
    /// response can never add a second terminal line.
    pub fn apply_status(&mut self, status: JobStatus) -> bool {
        if !self.is_running() {
            return false;
        }

        self.progress = status.progress;
        self.elapsed_seconds = status.elapsed_seconds;

        if status.running {
            return true;
        }

        self.returncode = status.returncode;
        self.error = status.error;
        let line = terminal_line(self.returncode, self.error.as_deref());
        self.progress.push(line);
        self.phase = if self.returncode == Some(0) {
            JobPhase::Completed
        } else {
            JobPhase::Failed
        };
        true
    }

    /// Optimistic transition after the runner accepted a cancel request.
    pub fn mark_cancelled(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.progress.push(CANCELLED_LINE.to_string());
        self.phase = JobPhase::Cancelled;
        true
    }

    pub fn dismiss(&mut self) -> bool {
        if !self.phase.is_terminal() {
            return false;
        }
        self.phase = JobPhase::Idle;
        true
    }
}

pub fn terminal_line(returncode: Option<i32>, error: Option<&str>) -> String {
    match (returncode, error.map(str::trim).filter(|e| !e.is_empty())) {
        (Some(0), _) => COMPLETED_LINE.to_string(),
        (_, Some(err)) => format!("✗ Error en la actualización: {}", err),
        (Some(code), None) => format!("✗ La actualización terminó con errores (código {})", code),
        (None, None) => "✗ La actualización terminó con errores".to_string(),
    }
}

pub fn cancel_failed_line(message: &str) -> String {
    format!("✗ Error al cancelar la actualización: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_view() -> JobView {
        let mut view = JobView::default();
        view.begin(None);
        view
    }

    #[test]
    fn test_status_parses_fractional_and_missing_fields() {
        let status: JobStatus =
            serde_json::from_str(r#"{"running": true, "elapsed_seconds": 12.7}"#).unwrap();
        assert!(status.running);
        assert!(status.progress.is_empty());
        assert_eq!(status.elapsed_seconds, 12);
        assert_eq!(status.returncode, None);

        let status: JobStatus =
            serde_json::from_str(r#"{"running": false, "elapsed_seconds": null, "returncode": 2}"#).unwrap();
        assert_eq!(status.elapsed_seconds, 0);
        assert_eq!(status.returncode, Some(2));
    }

    #[test]
    fn test_begin_without_server_progress_shows_starting_line() {
        let view = running_view();
        assert_eq!(view.phase, JobPhase::Running);
        assert_eq!(view.progress, vec![STARTING_LINE.to_string()]);
        assert!(view.started_at.is_some());
    }

    #[test]
    fn test_running_snapshot_replaces_progress_wholesale() {
        let mut view = running_view();
        let changed = view.apply_status(JobStatus {
            running: true,
            progress: vec!["a".into(), "b".into()],
            elapsed_seconds: 4,
            returncode: None,
            error: None,
        });
        assert!(changed);
        assert_eq!(view.progress, vec!["a", "b"]);
        assert_eq!(view.elapsed_seconds, 4);
        assert!(view.is_running());
    }

    #[test]
    fn test_terminal_snapshot_after_cancel_is_ignored() {
        let mut view = running_view();
        assert!(view.mark_cancelled());
        assert!(!view.mark_cancelled());

        let changed = view.apply_status(JobStatus {
            running: false,
            progress: vec!["a".into()],
            elapsed_seconds: 3,
            returncode: Some(0),
            error: None,
        });
        assert!(!changed);
        assert_eq!(view.phase, JobPhase::Cancelled);
        assert_eq!(view.progress.iter().filter(|l| l.as_str() == CANCELLED_LINE).count(), 1);
    }

    #[test]
    fn test_terminal_line_variants() {
        assert_eq!(terminal_line(Some(0), Some("ignored")), COMPLETED_LINE);
        assert!(terminal_line(Some(1), Some("disk full")).contains("disk full"));
        assert!(terminal_line(Some(3), Some("  ")).contains("código 3"));
        assert_eq!(terminal_line(None, None), "✗ La actualización terminó con errores");
    }

    #[test]
    fn test_dismiss_only_from_terminal() {
        let mut view = JobView::default();
        assert!(!view.dismiss());
        view.begin(None);
        assert!(!view.dismiss());
        view.mark_cancelled();
        assert!(view.dismiss());
        assert_eq!(view.phase, JobPhase::Idle);
    }
}
