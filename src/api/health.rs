//! `GET /health` (C8, §6). Liveness only — no dependency checks.

use axum::http::StatusCode;

pub async fn health() -> StatusCode {
    StatusCode::OK
}
