//! Vision Describer (C5) — see [`describer::VisionDescriber`].

pub mod client;
pub mod describer;
pub mod retry;

pub use client::{FakeVisionClient, VisionClient};
pub use describer::VisionDescriber;
pub use retry::{RetryDecision, RetryPolicy, VisionCallError, VisionFailure, classify};
