//! Job Queue (C2): an in-process FIFO of task IDs awaiting work (§4.2).
//!
//! Intentionally in-memory only — on crash, any `queued` task is recovered
//! by rescanning the task store at startup and re-enqueuing it (see
//! [`crate::server::Server::start`]). `enqueue` is non-blocking; `dequeue`
//! blocks until an ID is available or the queue is closed. Multiple workers
//! share one receiver behind a mutex so any worker may claim any ID —
//! idiomatic Rust async in place of the teacher's thread-per-item dispatch,
//! per `SPEC_FULL.md` §5.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::instrument;

use crate::id::TaskId;

/// Errors surfaced by job queue operations.
#[derive(Debug, Error)]
pub enum JobQueueError {
    /// `enqueue` was called after the queue was closed.
    #[error("job queue is closed")]
    Closed,
}

/// Process-local FIFO of task IDs (C2).
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<TaskId>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<TaskId>>>,
}

impl JobQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver: Arc::new(Mutex::new(receiver)) }
    }

    /// Enqueues a task ID. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Closed`] if the queue's receiver has been
    /// dropped.
    #[instrument(skip(self))]
    pub fn enqueue(&self, task_id: TaskId) -> Result<(), JobQueueError> {
        self.sender.send(task_id).map_err(|_| JobQueueError::Closed)
    }

    /// Blocks until a task ID is available, or returns `None` once the
    /// queue is closed and drained.
    ///
    /// Tasks dequeue in the order they were enqueued within this process.
    #[instrument(skip(self))]
    pub async fn dequeue(&self) -> Option<TaskId> {
        self.receiver.lock().await.recv().await
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dequeue_returns_enqueued_ids_in_order() {
        let queue = JobQueue::new();
        let first = TaskId::new();
        let second = TaskId::new();
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();

        assert_eq!(queue.dequeue().await, Some(first));
        assert_eq!(queue.dequeue().await, Some(second));
    }

    #[tokio::test]
    async fn test_multiple_workers_share_one_queue() {
        let queue = JobQueue::new();
        for _ in 0..4 {
            queue.enqueue(TaskId::new()).unwrap();
        }

        let worker_a = queue.clone();
        let worker_b = queue.clone();
        let (a, b) = tokio::join!(worker_a.dequeue(), worker_b.dequeue());
        assert!(a.is_some());
        assert!(b.is_some());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_after_close() {
        let queue = JobQueue::new();
        let receiver = queue.receiver.clone();
        drop(queue);
        assert!(receiver.lock().await.recv().await.is_none());
    }
}
