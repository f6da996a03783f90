//! Janitor (C7): periodic retention sweep (§4.7).
//!
//! Grounded on `original_source/service/app/workers/janitor.py`'s tick
//! loop — list expired, delete files, mark expired, log-and-continue on
//! individual failures — with the loop itself written in the teacher's
//! background-task idiom (a `tokio::select!` between an interval tick and
//! a shutdown signal).

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::store::TaskStore;

/// Periodic sweep that deletes files of expired tasks and marks them
/// `expired` (C7).
pub struct Janitor {
    store: TaskStore,
    data_dir: std::path::PathBuf,
}

impl Janitor {
    #[must_use]
    pub fn new(store: TaskStore, config: &Config) -> Self {
        Self { store, data_dir: config.tasks_dir() }
    }

    /// Runs the sweep loop on `config.cleanup_interval`, until `shutdown`
    /// fires. Individual task failures are logged and do not abort the
    /// sweep (§4.7).
    pub async fn run(&self, interval: std::time::Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the janitor's first
        // real sweep happens one interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("janitor shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Runs a single sweep: idempotent per §8 R2 — running it twice with no
    /// new expirations in between has the same effect as running it once.
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let expired = match self.store.list_expired(Utc::now()).await {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(error = %err, "janitor failed to list expired tasks");
                return;
            }
        };

        for task in expired {
            let task_dir = self.data_dir.join(task.task_id.to_string());
            if let Err(err) = tokio::fs::remove_dir_all(&task_dir).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(task_id = %task.task_id, error = %err, "janitor failed to remove task directory");
                }
            }

            if let Err(err) = self.store.mark_expired(task.task_id).await {
                error!(task_id = %task.task_id, error = %err, "janitor failed to mark task expired");
                continue;
            }

            info!(task_id = %task.task_id, "task expired");
        }
    }
}
