//! Task Store (C1): a single-writer durable table keyed by `task_id` (§4.1).
//!
//! Grounded on the teacher's `Queue`/`Database` split: a thin manager over
//! a `SqlitePool`-backed [`Database`], one `#[instrument]`ed async method per
//! operation, atomic `UPDATE ... RETURNING` / `check_affected` idiom for
//! mutations that must report `NotFound` rather than silently no-op.

mod error;

pub use error::StoreError;

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::instrument;

use crate::db::Database;
use crate::id::TaskId;
use crate::task::{Task, TaskStatus};

type Result<T> = std::result::Result<T, StoreError>;

/// Fields a worker may update alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub output_files: Option<Vec<String>>,
}

/// Durable record of every task and its lifecycle fields; sole writer of
/// state transitions (C1).
#[derive(Debug, Clone)]
pub struct TaskStore {
    db: Database,
}

fn check_affected(task_id: TaskId, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(StoreError::NotFound(task_id))
    } else {
        Ok(())
    }
}

impl TaskStore {
    /// Wraps an already-connected, already-migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] on PK collision, or
    /// [`StoreError::Database`] for any other failure.
    #[instrument(skip(self, task), fields(task_id = %task.task_id))]
    pub async fn create(&self, task: &Task) -> Result<()> {
        let output_files_json =
            serde_json::to_string(&task.output_files).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r"INSERT INTO tasks (
                task_id, status, original_filename, content_type, size_bytes,
                describe_images, webhook_url, created_at, started_at, finished_at,
                expires_at, error_code, error_message, output_files,
                webhook_last_status, webhook_last_attempt_at, webhook_attempt_count
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.task_id.to_string())
        .bind(task.status.as_str())
        .bind(&task.original_filename)
        .bind(&task.content_type)
        .bind(task.size_bytes as i64)
        .bind(task.describe_images)
        .bind(&task.webhook_url)
        .bind(task.created_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.finished_at.map(|t| t.to_rfc3339()))
        .bind(task.expires_at.to_rfc3339())
        .bind(&task.error_code)
        .bind(&task.error_message)
        .bind(output_files_json)
        .bind(task.webhook_last_status)
        .bind(task.webhook_last_attempt_at.map(|t| t.to_rfc3339()))
        .bind(task.webhook_attempt_count)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::AlreadyExists(task.task_id))
            }
            Err(err) => Err(StoreError::Database(err)),
        }
    }

    /// Returns the row for `task_id`, or [`StoreError::NotFound`].
    #[instrument(skip(self))]
    pub async fn get(&self, task_id: TaskId) -> Result<Task> {
        let row = sqlx::query(r"SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_optional(self.db.pool())
            .await?;

        let row = row.ok_or(StoreError::NotFound(task_id))?;
        Ok(row_to_task(&row))
    }

    /// Updates `status` and any fields in `patch` atomically.
    ///
    /// Callers must enforce the transition DAG (see
    /// [`TaskStatus::can_transition_to`]); the store persists whatever is
    /// given.
    #[instrument(skip(self, patch), fields(task_id = %task_id, to_status = %to_status))]
    pub async fn update_status(
        &self,
        task_id: TaskId,
        to_status: TaskStatus,
        patch: StatusPatch,
    ) -> Result<()> {
        let output_files_json = patch
            .output_files
            .as_ref()
            .map(|files| serde_json::to_string(files).unwrap_or_else(|_| "[]".to_string()));

        let result = sqlx::query(
            r"UPDATE tasks SET
                status = ?,
                started_at = COALESCE(?, started_at),
                finished_at = COALESCE(?, finished_at),
                error_code = COALESCE(?, error_code),
                error_message = COALESCE(?, error_message),
                output_files = COALESCE(?, output_files)
              WHERE task_id = ?",
        )
        .bind(to_status.as_str())
        .bind(patch.started_at.map(|t| t.to_rfc3339()))
        .bind(patch.finished_at.map(|t| t.to_rfc3339()))
        .bind(patch.error_code)
        .bind(patch.error_message)
        .bind(output_files_json)
        .bind(task_id.to_string())
        .execute(self.db.pool())
        .await?;

        check_affected(task_id, result.rows_affected())
    }

    /// Touches only webhook telemetry fields.
    #[instrument(skip(self))]
    pub async fn update_webhook_telemetry(
        &self,
        task_id: TaskId,
        status_code: i64,
        attempt_count: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE tasks SET
                webhook_last_status = ?,
                webhook_last_attempt_at = ?,
                webhook_attempt_count = ?
              WHERE task_id = ?",
        )
        .bind(status_code)
        .bind(Utc::now().to_rfc3339())
        .bind(attempt_count)
        .bind(task_id.to_string())
        .execute(self.db.pool())
        .await?;

        check_affected(task_id, result.rows_affected())
    }

    /// Oldest-first `queued` tasks; used for crash recovery at startup.
    #[instrument(skip(self))]
    pub async fn list_queued(&self, limit: i64) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            r"SELECT * FROM tasks WHERE status = ? ORDER BY created_at ASC LIMIT ?",
        )
        .bind(TaskStatus::Queued.as_str())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_task).collect())
    }

    /// Tasks in a terminal non-expired status whose `expires_at` has passed.
    #[instrument(skip(self))]
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            r"SELECT * FROM tasks WHERE status IN (?, ?) AND expires_at < ?",
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(TaskStatus::Failed.as_str())
        .bind(now.to_rfc3339())
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_task).collect())
    }

    /// Terminal transition to `expired`.
    #[instrument(skip(self))]
    pub async fn mark_expired(&self, task_id: TaskId) -> Result<()> {
        self.update_status(task_id, TaskStatus::Expired, StatusPatch::default()).await
    }
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Task {
    let task_id: String = row.get("task_id");
    let status: String = row.get("status");
    let output_files_json: String = row.get("output_files");

    Task {
        task_id: task_id.parse().unwrap_or_default(),
        status: status.parse().unwrap_or(TaskStatus::Queued),
        original_filename: row.get("original_filename"),
        content_type: row.get("content_type"),
        size_bytes: row.get::<i64, _>("size_bytes") as u64,
        describe_images: row.get("describe_images"),
        webhook_url: row.get("webhook_url"),
        created_at: parse_rfc3339(row.get("created_at")),
        started_at: row.get::<Option<String>, _>("started_at").map(parse_rfc3339),
        finished_at: row.get::<Option<String>, _>("finished_at").map(parse_rfc3339),
        expires_at: parse_rfc3339(row.get("expires_at")),
        error_code: row.get("error_code"),
        error_message: row.get("error_message"),
        output_files: serde_json::from_str(&output_files_json).unwrap_or_default(),
        webhook_last_status: row.get("webhook_last_status"),
        webhook_last_attempt_at: row
            .get::<Option<String>, _>("webhook_last_attempt_at")
            .map(parse_rfc3339),
        webhook_attempt_count: row.get("webhook_attempt_count"),
    }
}

fn parse_rfc3339(text: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
