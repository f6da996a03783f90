//! `docflow`: an asynchronous PDF-to-Markdown conversion service.
//!
//! Tasks are admitted over HTTP, converted by a fixed worker pool, and
//! served back (or posted to a webhook) once terminal. The library is
//! organized into the following modules:
//! - [`config`] - environment-driven application configuration
//! - [`id`] / [`task`] - task identifiers and the lifecycle data model
//! - [`db`] - `SQLite` connection and schema management
//! - [`store`] - the durable task store (C1)
//! - [`jobqueue`] - the in-process FIFO (C2)
//! - [`worker`] - the fixed worker pool (C3)
//! - [`pipeline`] - per-task conversion orchestration (C4)
//! - [`vision`] - bounded-concurrency image description (C5)
//! - [`webhook`] - best-effort terminal-state notification (C6)
//! - [`janitor`] - periodic retention sweep (C7)
//! - [`api`] - the HTTP surface (C8)
//! - [`server`] - process lifecycle: wiring, startup recovery, shutdown

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod id;
pub mod janitor;
pub mod jobqueue;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod task;
pub mod vision;
pub mod webhook;
pub mod worker;

pub use config::Config;
pub use db::Database;
pub use error::ApiError;
pub use id::TaskId;
pub use jobqueue::JobQueue;
pub use pipeline::Pipeline;
pub use store::TaskStore;
pub use task::{Task, TaskStatus};
pub use worker::WorkerPool;
