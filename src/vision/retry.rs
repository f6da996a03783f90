//! Per-image retry classification and backoff for the Vision Describer
//! (§4.5 retry table).
//!
//! Shaped directly on the teacher's `download::retry` module
//! (`FailureType`, `RetryPolicy`, `classify_error`): an enum classifying
//! the failure, a policy deciding whether/how long to wait, and a pure
//! `classify` function mapping call errors to the enum. The multipliers
//! diverge from the teacher's defaults to match the table in §4.5: `base ×
//! 2^attempt` for transient/server/other, `base × 2^attempt × 2` for
//! rate-limited.

use std::time::Duration;

use tracing::debug;

/// Classification of a single `VisionClient.describe` failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionFailure {
    /// Server signalled rate limiting — back off harder.
    RateLimited,
    /// Connection/transport-level error.
    Transport,
    /// Server error (status >= 500).
    ServerError,
    /// Client error (4xx, not rate-limited) — retrying would not help.
    ClientError,
    /// The referenced image file is missing — retrying would not help.
    ImageMissing,
    /// Anything else unclassified.
    Other,
}

impl VisionFailure {
    fn is_retryable(self) -> bool {
        !matches!(self, Self::ClientError | Self::ImageMissing)
    }
}

/// Raw failure signal from a [`crate::vision::client::VisionClient`] call.
#[derive(Debug, Clone)]
pub enum VisionCallError {
    RateLimited,
    Transport(String),
    Server(u16),
    Client(u16),
    ImageMissing,
    Other(String),
}

impl std::fmt::Display for VisionCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Server(status) => write!(f, "server error: {status}"),
            Self::Client(status) => write!(f, "client error: {status}"),
            Self::ImageMissing => write!(f, "image file missing"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// Classifies a call error into a [`VisionFailure`] (§4.5 retry table).
#[must_use]
pub fn classify(error: &VisionCallError) -> VisionFailure {
    match error {
        VisionCallError::RateLimited => VisionFailure::RateLimited,
        VisionCallError::Transport(_) => VisionFailure::Transport,
        VisionCallError::Server(_) => VisionFailure::ServerError,
        VisionCallError::Client(_) => VisionFailure::ClientError,
        VisionCallError::ImageMissing => VisionFailure::ImageMissing,
        VisionCallError::Other(_) => VisionFailure::Other,
    }
}

/// Decision on whether to retry a failed description attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration, attempt: u32 },
    DoNotRetry,
}

/// Bounded exponential backoff for vision describer retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry, given the failure just observed and the
    /// attempt number that just failed (1-indexed).
    pub fn should_retry(&self, failure: VisionFailure, attempt: u32) -> RetryDecision {
        if !failure.is_retryable() {
            return RetryDecision::DoNotRetry;
        }
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "vision retries exhausted");
            return RetryDecision::DoNotRetry;
        }

        let delay = self.calculate_delay(failure, attempt);
        RetryDecision::Retry { delay, attempt: attempt + 1 }
    }

    /// `base × 2^attempt`, doubled again for rate-limited failures.
    fn calculate_delay(&self, failure: VisionFailure, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = attempt as i32;
        let mut delay_ms = base_ms * 2f64.powi(exponent);
        if failure == VisionFailure::RateLimited {
            delay_ms *= 2.0;
        }
        Duration::from_millis(delay_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_does_not_retry() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.should_retry(VisionFailure::ClientError, 1), RetryDecision::DoNotRetry);
    }

    #[test]
    fn test_image_missing_does_not_retry() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.should_retry(VisionFailure::ImageMissing, 1), RetryDecision::DoNotRetry);
    }

    #[test]
    fn test_transient_retries_until_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert!(matches!(
            policy.should_retry(VisionFailure::Transport, 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(VisionFailure::Transport, 2),
            RetryDecision::Retry { .. }
        ));
        assert_eq!(policy.should_retry(VisionFailure::Transport, 3), RetryDecision::DoNotRetry);
    }

    #[test]
    fn test_rate_limited_delay_is_double_transient_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let transient = policy.should_retry(VisionFailure::Transport, 1);
        let rate_limited = policy.should_retry(VisionFailure::RateLimited, 1);

        let (RetryDecision::Retry { delay: transient_delay, .. }, RetryDecision::Retry { delay: rate_limited_delay, .. }) =
            (transient, rate_limited)
        else {
            panic!("expected both to retry");
        };
        assert_eq!(rate_limited_delay, transient_delay * 2);
    }

    #[test]
    fn test_classify_maps_each_variant() {
        assert_eq!(classify(&VisionCallError::RateLimited), VisionFailure::RateLimited);
        assert_eq!(classify(&VisionCallError::Transport("x".into())), VisionFailure::Transport);
        assert_eq!(classify(&VisionCallError::Server(503)), VisionFailure::ServerError);
        assert_eq!(classify(&VisionCallError::Client(400)), VisionFailure::ClientError);
        assert_eq!(classify(&VisionCallError::ImageMissing), VisionFailure::ImageMissing);
        assert_eq!(classify(&VisionCallError::Other("x".into())), VisionFailure::Other);
    }
}
