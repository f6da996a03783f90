//! `GET /tasks/{id}` (C8, §6).

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::id::TaskId;
use crate::task::{Task, TaskStatus};

use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub original_filename: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<Task> for TaskStatusResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id.to_string(),
            status: task.status,
            original_filename: task.original_filename,
            size_bytes: task.size_bytes,
            created_at: task.created_at,
            started_at: task.started_at,
            finished_at: task.finished_at,
            outputs: (!task.output_files.is_empty()).then_some(task.output_files),
            error_code: task.error_code,
            error_message: task.error_message,
        }
    }
}

#[instrument(skip(state))]
pub async fn status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let task_id: TaskId =
        task_id.parse().map_err(|_| ApiError::NotFound)?;
    let task = state.store.get(task_id).await?;
    Ok(Json(task.into()))
}
