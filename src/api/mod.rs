//! HTTP surface (C8, §6).
//!
//! Router/state/bind idiom grounded on
//! `golemcloud-golem/cli/golem-cli/src/serve.rs`
//! (`Router::new().route(...).with_state(state)`,
//! `axum::serve(TcpListener::bind(...), app)`). The panic-catching fallback
//! layer mirrors `original_source/main.py`'s catch-all exception handler
//! (§6 "Supplemented from original_source").

pub mod admission;
pub mod download;
pub mod health;
pub mod state;
pub mod status;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use state::AppState;

/// Slack added on top of `max_upload_size` for multipart framing overhead;
/// the precise byte-for-byte ceiling is enforced by streaming admission
/// itself (§6), not by this layer.
const BODY_LIMIT_SLACK: u64 = 10 * 1024 * 1024;

/// Builds the full router: routes, tracing, panic isolation, body-size
/// backstop.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size + BODY_LIMIT_SLACK;

    Router::new()
        .route("/health", get(health::health))
        .route("/tasks", post(admission::admit))
        .route("/tasks/:id", get(status::status))
        .route("/tasks/:id/files/*path", get(download::download_file))
        .route("/tasks/:id/download.zip", get(download::download_zip))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit as usize))
        .with_state(state)
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let message = if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };

    error!(panic = %message, "request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "detail": "Internal server error" })),
    )
        .into_response()
}
