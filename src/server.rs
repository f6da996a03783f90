//! Process lifecycle container (§9 "lifecycle-scoped container").
//!
//! Starts the database, worker pool, janitor, and HTTP listener; stops
//! them in reverse order on `SIGINT`/`SIGTERM` — grounded on
//! `original_source/main.py`'s `lifespan` context
//! (`janitor -> workers -> db` on shutdown), with the signal plumbing
//! itself grounded on the `tokio::signal` usage pattern common across the
//! pack (e.g. `golem-cli/src/serve.rs`'s server entry point).

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::janitor::Janitor;
use crate::jobqueue::JobQueue;
use crate::pipeline::Pipeline;
use crate::pipeline::extractor::Extractor;
use crate::store::TaskStore;
use crate::vision::VisionDescriber;
use crate::webhook::WebhookNotifier;
use crate::worker::WorkerPool;

/// Wires every component and runs until a shutdown signal arrives.
///
/// `extractor`/`vision` are the external-collaborator ports (§1 out of
/// scope): this function takes them as parameters rather than constructing
/// a concrete implementation, so a consumer of `docflow_core` supplies its
/// own before going to production.
pub async fn run(
    config: Config,
    extractor: Arc<dyn Extractor>,
    vision: Option<Arc<VisionDescriber>>,
) -> anyhow::Result<()> {
    let config = Arc::new(config);

    tokio::fs::create_dir_all(config.tasks_dir()).await?;
    let db = Database::new(&config.db_path).await?;
    let store = TaskStore::new(db);

    let queue = JobQueue::new();
    recover_queued_tasks(&store, &queue).await;

    let pipeline = Pipeline::new(extractor, vision);
    let notifier = WebhookNotifier::new(reqwest::Client::new(), store.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let workers = WorkerPool::spawn(
        config.max_concurrent_tasks,
        queue.clone(),
        store.clone(),
        pipeline,
        notifier,
        config.clone(),
        shutdown_rx.clone(),
    );

    let janitor = Janitor::new(store.clone(), &config);
    let janitor_interval = config.cleanup_interval;
    let janitor_shutdown = shutdown_rx.clone();
    let janitor_handle =
        tokio::spawn(async move { janitor.run(janitor_interval, janitor_shutdown).await });

    let app_state = crate::api::state::AppState { store, queue, config: config.clone() };
    let router = crate::api::build_router(app_state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "docflow listening");

    let server_shutdown = shutdown_rx.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown_signal(server_shutdown))
        .await?;

    info!("http listener stopped, shutting down janitor and workers");
    let _ = shutdown_tx.send(true);
    janitor_handle.await?;
    workers.join().await;

    Ok(())
}

/// Re-enqueues any task left in `queued` status from a previous crash
/// (§5 "queue is in-process only"; recovery rescans the durable store).
async fn recover_queued_tasks(store: &TaskStore, queue: &JobQueue) {
    match store.list_queued(i64::MAX).await {
        Ok(tasks) => {
            for task in tasks {
                if queue.enqueue(task.task_id).is_err() {
                    break;
                }
            }
        }
        Err(err) => tracing::error!(error = %err, "failed to recover queued tasks at startup"),
    }
}

async fn wait_for_shutdown_signal(mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
        _ = shutdown_rx.changed() => {}
    }

    info!("shutdown signal received");
}
