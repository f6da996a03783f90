//! Worker Pool (C3): a fixed set of tasks draining the job queue (§4.3).
//!
//! Grounded on the teacher's `DownloadEngine` — semaphore-bounded
//! concurrent dispatch over queue items — generalized from "one permit per
//! in-flight download" to "N long-lived workers, one `dequeue` each,"
//! since here the unit of concurrency is a whole worker, not a permit.
//! Each pipeline run is isolated in its own `tokio::spawn` so a panic
//! inside extraction surfaces as a `CONVERSION_ERROR` rather than taking
//! the worker down (§4.3 step 4).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::jobqueue::JobQueue;
use crate::pipeline::Pipeline;
use crate::store::{StatusPatch, TaskStore};
use crate::task::{Task, TaskStatus};
use crate::webhook::WebhookNotifier;

const CONVERSION_ERROR: &str = "CONVERSION_ERROR";

/// A fixed pool of workers consuming [`JobQueue`] entries (C3).
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers, each looping `dequeue -> run pipeline ->
    /// commit terminal state -> notify` until the queue closes or
    /// `shutdown` fires.
    #[must_use]
    pub fn spawn(
        count: usize,
        queue: JobQueue,
        store: TaskStore,
        pipeline: Pipeline,
        notifier: WebhookNotifier,
        config: Arc<Config>,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        let handles = (0..count.max(1))
            .map(|worker_id| {
                let queue = queue.clone();
                let store = store.clone();
                let pipeline = pipeline.clone();
                let notifier = notifier.clone();
                let config = config.clone();
                let mut shutdown = shutdown.clone();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            biased;
                            _ = shutdown.changed() => {
                                if *shutdown.borrow() {
                                    info!(worker_id, "worker shutting down");
                                    return;
                                }
                            }
                            next = queue.dequeue() => {
                                match next {
                                    Some(task_id) => {
                                        process_one(task_id, &store, &pipeline, &notifier, &config).await;
                                    }
                                    None => {
                                        info!(worker_id, "job queue closed, worker exiting");
                                        return;
                                    }
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        Self { handles }
    }

    /// Waits for every worker to exit (after the queue closes or shutdown
    /// fires).
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(error = %err, "worker task panicked");
                }
            }
        }
    }
}

#[instrument(skip(store, pipeline, notifier, config), fields(task_id = %task_id))]
async fn process_one(
    task_id: crate::id::TaskId,
    store: &TaskStore,
    pipeline: &Pipeline,
    notifier: &WebhookNotifier,
    config: &Config,
) {
    let task = match store.get(task_id).await {
        Ok(task) => task,
        Err(err) => {
            error!(error = %err, "worker could not load dequeued task");
            return;
        }
    };

    let started_at = chrono::Utc::now();
    if let Err(err) = store
        .update_status(
            task_id,
            TaskStatus::Running,
            StatusPatch { started_at: Some(started_at), ..Default::default() },
        )
        .await
    {
        error!(error = %err, "worker failed to record running transition");
        return;
    }

    let outcome = run_isolated(pipeline.clone(), task.clone(), config.clone()).await;

    let terminal = match outcome {
        Ok(output_files) => {
            let patch = StatusPatch {
                finished_at: Some(chrono::Utc::now()),
                output_files: Some(output_files),
                ..Default::default()
            };
            store.update_status(task_id, TaskStatus::Completed, patch).await
        }
        Err(message) => {
            warn!(error = %message, "task conversion failed");
            let patch = StatusPatch {
                finished_at: Some(chrono::Utc::now()),
                error_code: Some(CONVERSION_ERROR.to_string()),
                error_message: Some(Task::truncate_error_message(&message)),
                ..Default::default()
            };
            store.update_status(task_id, TaskStatus::Failed, patch).await
        }
    };

    if let Err(err) = terminal {
        error!(error = %err, "worker failed to record terminal transition");
        return;
    }

    match store.get(task_id).await {
        Ok(finished_task) => notifier.notify(&finished_task, config).await,
        Err(err) => error!(error = %err, "worker could not reload task for webhook delivery"),
    }
}

/// Runs `pipeline.run` on its own task so a panic inside extraction is
/// caught here rather than taking the worker loop down.
async fn run_isolated(pipeline: Pipeline, task: Task, config: Config) -> Result<Vec<String>, String> {
    let handle = tokio::spawn(async move { pipeline.run(&task, &config).await });

    match handle.await {
        Ok(Ok(output_files)) => Ok(output_files),
        Ok(Err(pipeline_error)) => Err(pipeline_error.to_string()),
        Err(join_error) if join_error.is_panic() => Err("conversion task panicked".to_string()),
        Err(join_error) => Err(join_error.to_string()),
    }
}
