//! Webhook payload shape (§4.6), serialized byte-for-byte to match the
//! Python precursor's `WebhookPayload` Pydantic model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub task_id: String,
    pub status: TaskStatus,
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

impl From<&Task> for WebhookPayload {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id.to_string(),
            status: task.status,
            created_at: task.created_at,
            started_at: task.started_at,
            finished_at: task.finished_at,
            outputs: (!task.output_files.is_empty()).then(|| task.output_files.clone()),
            error_code: task.error_code.clone(),
            error_message: task.error_message.clone(),
        }
    }
}
