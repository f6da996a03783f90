//! Shared application state threaded through every handler (C8).

use std::sync::Arc;

use crate::config::Config;
use crate::jobqueue::JobQueue;
use crate::store::TaskStore;

/// Handles are cheap to clone (`axum::extract::State` clones per request).
#[derive(Clone)]
pub struct AppState {
    pub store: TaskStore,
    pub queue: JobQueue,
    pub config: Arc<Config>,
}
