//! `GET /tasks/{id}/files/{path}` and `GET /tasks/{id}/download.zip` (C8, §6).
//!
//! Path-traversal policy: reject any path containing `..` segments or
//! absolute components outright, then confirm the resolved candidate is
//! still inside the task directory before opening it — defense in depth
//! against a traversal that slips past the first check via symlinks.
//! Zip bundling grounded on
//! `golemcloud-golem/cli/golem-cli/src/command_handler/component/ifs.rs`'s
//! `async_zip::tokio::write::ZipFileWriter` usage.

use std::path::{Component, Path, PathBuf};

use async_zip::{Compression, ZipEntryBuilder};
use async_zip::tokio::write::ZipFileWriter;
use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::instrument;

use crate::error::ApiError;
use crate::id::TaskId;
use crate::task::{Task, TaskStatus};

use super::state::AppState;

#[instrument(skip(state))]
pub async fn download_file(
    State(state): State<AppState>,
    AxumPath((task_id, path)): AxumPath<(String, String)>,
) -> Result<Response, ApiError> {
    let (_task, task_dir) = load_downloadable_task(&state, &task_id).await?;

    let resolved = resolve_within(&task_dir, &path)?;
    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|_| ApiError::NotFound)?;

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&path))],
        bytes,
    )
        .into_response())
}

#[instrument(skip(state))]
pub async fn download_zip(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<String>,
) -> Result<Response, ApiError> {
    let (task, task_dir) = load_downloadable_task(&state, &task_id).await?;

    let mut buffer: Vec<u8> = Vec::new();
    {
        let mut writer = ZipFileWriter::with_tokio(&mut buffer);
        for relative in &task.output_files {
            let full_path = task_dir.join(relative);
            let content = tokio::fs::read(&full_path).await?;
            let builder = ZipEntryBuilder::new(relative.clone().into(), Compression::Deflate);
            writer
                .write_entry_whole(builder, &content)
                .await
                .map_err(|err| ApiError::Internal(err.to_string()))?;
        }
        writer.close().await.map_err(|err| ApiError::Internal(err.to_string()))?;
    }

    let filename = format!("{}.zip", task.task_id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        Body::from(buffer),
    )
        .into_response())
}

/// Loads the task, enforcing the shared 404/410/400 rules the two download
/// routes share (§6 error column).
async fn load_downloadable_task(state: &AppState, task_id: &str) -> Result<(Task, PathBuf), ApiError> {
    let task_id: TaskId = task_id.parse().map_err(|_| ApiError::NotFound)?;
    let task = state.store.get(task_id).await?;

    if task.status == TaskStatus::Expired {
        return Err(ApiError::Gone);
    }
    if task.status != TaskStatus::Completed {
        return Err(ApiError::PreconditionFailed(task.status.to_string()));
    }

    let task_dir = state.config.task_dir(&task.task_id.to_string());
    Ok((task, task_dir))
}

/// Rejects `..` segments and absolute components outright, then confirms
/// the canonicalized candidate is still under `task_dir`.
fn resolve_within(task_dir: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    let requested_path = Path::new(requested);
    if requested_path.is_absolute()
        || requested_path.components().any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ApiError::Validation("path traversal rejected".to_string()));
    }

    let candidate = task_dir.join(requested_path);
    let canonical_dir = task_dir.canonicalize().map_err(|_| ApiError::NotFound)?;
    let canonical_candidate = candidate.canonicalize().map_err(|_| ApiError::NotFound)?;

    if !canonical_candidate.starts_with(&canonical_dir) {
        return Err(ApiError::Validation("path traversal rejected".to_string()));
    }

    Ok(canonical_candidate)
}

fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path).extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_within_rejects_parent_dir_segments() {
        let task_dir = Path::new("/data/tasks/abc");
        let result = resolve_within(task_dir, "../../../etc/passwd");
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_resolve_within_rejects_absolute_paths() {
        let task_dir = Path::new("/data/tasks/abc");
        let result = resolve_within(task_dir, "/etc/passwd");
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_content_type_for_known_extensions() {
        assert_eq!(content_type_for("a.md"), "text/markdown; charset=utf-8");
        assert_eq!(content_type_for("images/a.png"), "image/png");
        assert_eq!(content_type_for("images/a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
