//! Task record and lifecycle status (data model, §3).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::TaskId;

/// Lifecycle status of a task.
///
/// Transitions form a DAG: `queued -> running -> {completed, failed} ->
/// expired`. No other edges are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Admitted, awaiting a worker.
    Queued,
    /// Claimed by a worker, pipeline in flight.
    Running,
    /// Pipeline finished successfully.
    Completed,
    /// Pipeline failed; `error_code`/`error_message` populated.
    Failed,
    /// Retention window elapsed; files purged.
    Expired,
}

impl TaskStatus {
    /// Database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Whether `self -> to` is a legal edge in the status DAG.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Completed, Self::Expired)
                | (Self::Failed, Self::Expired)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("invalid task status: {s}")),
        }
    }
}

/// Maximum length of `original_filename`, after sanitization.
pub const MAX_FILENAME_LEN: usize = 255;

/// Maximum length of `error_message`, truncated on write.
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// A single document-conversion job (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub describe_images: bool,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Ordered relative paths under the task directory; `<id>.md` first.
    pub output_files: Vec<String>,
    pub webhook_last_status: Option<i64>,
    pub webhook_last_attempt_at: Option<DateTime<Utc>>,
    pub webhook_attempt_count: i64,
}

impl Task {
    /// Constructs a freshly-admitted task in `queued` status.
    #[must_use]
    pub fn new(
        original_filename: String,
        content_type: Option<String>,
        size_bytes: u64,
        describe_images: bool,
        webhook_url: Option<String>,
        retention: chrono::Duration,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            task_id: TaskId::new(),
            status: TaskStatus::Queued,
            original_filename,
            content_type,
            size_bytes,
            describe_images,
            webhook_url,
            created_at,
            started_at: None,
            finished_at: None,
            expires_at: created_at + retention,
            error_code: None,
            error_message: None,
            output_files: Vec::new(),
            webhook_last_status: None,
            webhook_last_attempt_at: None,
            webhook_attempt_count: 0,
        }
    }

    /// Truncates an error message to the documented 500-char bound.
    #[must_use]
    pub fn truncate_error_message(message: &str) -> String {
        truncate_chars(message, MAX_ERROR_MESSAGE_LEN)
    }
}

/// Truncates `s` to at most `max_chars` Unicode scalar values.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_dag_forward_edges_only() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Completed.can_transition_to(TaskStatus::Expired));
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Expired));
    }

    #[test]
    fn test_status_dag_rejects_backward_and_skip_edges() {
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Queued));
        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Expired.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Expired,
        ] {
            let parsed: TaskStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_new_task_has_monotonic_timestamps_and_queued_status() {
        let task = Task::new(
            "report.pdf".to_string(),
            Some("application/pdf".to_string()),
            1024,
            false,
            None,
            chrono::Duration::hours(24),
        );
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.started_at.is_none());
        assert!(task.finished_at.is_none());
        assert!(task.expires_at > task.created_at);
        assert!(task.output_files.is_empty());
    }

    #[test]
    fn test_truncate_error_message_respects_bound() {
        let long = "x".repeat(600);
        let truncated = Task::truncate_error_message(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_LEN);
    }

    #[test]
    fn test_truncate_chars_leaves_short_strings_untouched() {
        assert_eq!(truncate_chars("short", 500), "short");
    }
}
