//! `POST /tasks` (C8 admission, §6).
//!
//! Streams the uploaded file straight to `tasks/<id>/input/<filename>` in
//! fixed-size chunks (`axum::extract::Multipart::chunk`), rejecting with
//! `413` and deleting the partial directory the moment the running total
//! crosses `max_upload_size` — grounded on the teacher's `HttpClient`
//! streaming-to-disk idiom, generalized from download to upload. Multipart
//! field handling itself is grounded on
//! `golemcloud-golem/integration-tests/tests/api/component.rs`'s
//! `axum::extract::Multipart` loop.

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::error::ApiError;
use crate::id::TaskId;
use crate::task::{MAX_FILENAME_LEN, Task};

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdmitQuery {
    #[serde(default)]
    pub describe_images: bool,
}

#[derive(Debug, Serialize)]
pub struct AdmitResponse {
    pub task_id: String,
    pub status: &'static str,
}

#[instrument(skip(state, multipart))]
pub async fn admit(
    State(state): State<AppState>,
    Query(query): Query<AdmitQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = TaskId::new();
    let task_dir = state.config.task_dir(&task_id.to_string());
    let input_dir = task_dir.join("input");
    tokio::fs::create_dir_all(&input_dir).await?;

    let mut webhook_url: Option<String> = None;
    let mut original_filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut size_bytes: u64 = 0;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let _ = tokio::fs::remove_dir_all(&task_dir).await;
                return Err(ApiError::Validation(err.to_string()));
            }
        };

        match field.name().unwrap_or("").to_string().as_str() {
            "webhook_url" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::Validation(err.to_string()))?;
                if !text.trim().is_empty() {
                    if let Err(message) = validate_webhook_url(&text) {
                        let _ = tokio::fs::remove_dir_all(&task_dir).await;
                        return Err(ApiError::Validation(message));
                    }
                    webhook_url = Some(text);
                }
            }
            "file" => {
                original_filename =
                    Some(sanitize_filename(field.file_name().unwrap_or("upload")));
                content_type = field.content_type().map(ToString::to_string);

                let dest_path = input_dir.join(original_filename.as_ref().expect("just set"));
                let mut dest = tokio::fs::File::create(&dest_path).await?;
                let mut field = field;

                loop {
                    let chunk = match field.chunk().await {
                        Ok(Some(chunk)) => chunk,
                        Ok(None) => break,
                        Err(err) => {
                            let _ = tokio::fs::remove_dir_all(&task_dir).await;
                            return Err(ApiError::Validation(err.to_string()));
                        }
                    };

                    size_bytes += chunk.len() as u64;
                    if size_bytes > state.config.max_upload_size {
                        drop(dest);
                        let _ = tokio::fs::remove_dir_all(&task_dir).await;
                        return Err(ApiError::SizeExceeded);
                    }

                    dest.write_all(&chunk).await?;
                }
            }
            _ => {}
        }
    }

    let Some(original_filename) = original_filename else {
        let _ = tokio::fs::remove_dir_all(&task_dir).await;
        return Err(ApiError::MissingFile);
    };

    let retention = chrono::Duration::from_std(state.config.retention)
        .unwrap_or_else(|_| chrono::Duration::hours(24));
    let mut task = Task::new(
        original_filename,
        content_type,
        size_bytes,
        query.describe_images,
        webhook_url,
        retention,
    );
    task.task_id = task_id;

    state.store.create(&task).await?;
    if state.queue.enqueue(task.task_id).is_err() {
        return Err(ApiError::Internal("job queue is closed".to_string()));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(AdmitResponse { task_id: task.task_id.to_string(), status: "queued" }),
    ))
}

/// Basename-only, `[A-Za-z0-9_.\-\s]` allowlist, 255-char cap preserving
/// the extension (§6 admission rules).
fn sanitize_filename(raw: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let sanitized: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') || c.is_whitespace() {
                c
            } else {
                '_'
            }
        })
        .collect();

    truncate_preserving_extension(&sanitized, MAX_FILENAME_LEN)
}

fn truncate_preserving_extension(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    match ext {
        Some(ext) => {
            let ext_len = ext.chars().count() + 1;
            let stem_budget = max_len.saturating_sub(ext_len);
            let truncated_stem: String = stem.chars().take(stem_budget).collect();
            format!("{truncated_stem}.{ext}")
        }
        None => name.chars().take(max_len).collect(),
    }
}

/// Must parse, scheme in `{http, https}`, host non-empty (§6).
fn validate_webhook_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|_| "Invalid webhook URL".to_string())?;
    let scheme_ok = matches!(parsed.scheme(), "http" | "https");
    let host_ok = parsed.host_str().is_some_and(|host| !host.is_empty());

    if scheme_ok && host_ok { Ok(()) } else { Err("Invalid webhook URL".to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_directory_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\report.pdf"), "report.pdf");
    }

    #[test]
    fn test_sanitize_filename_replaces_disallowed_characters() {
        assert_eq!(sanitize_filename("rep*ort?.pdf"), "rep_ort_.pdf");
    }

    #[test]
    fn test_sanitize_filename_truncates_preserving_extension() {
        let long_stem = "a".repeat(300);
        let name = format!("{long_stem}.pdf");
        let sanitized = sanitize_filename(&name);
        assert_eq!(sanitized.chars().count(), MAX_FILENAME_LEN);
        assert!(sanitized.ends_with(".pdf"));
    }

    #[test]
    fn test_validate_webhook_url_accepts_http_and_https() {
        assert!(validate_webhook_url("http://example.com/hook").is_ok());
        assert!(validate_webhook_url("https://example.com/hook").is_ok());
    }

    #[test]
    fn test_validate_webhook_url_rejects_malformed_and_wrong_scheme() {
        assert!(validate_webhook_url("not-a-url").is_err());
        assert!(validate_webhook_url("ftp://example.com/hook").is_err());
    }
}
