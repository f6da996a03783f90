//! The `VisionClient` port (§9 "two explicit ports"): the LLM vision
//! endpoint is an external collaborator, consumed only through this
//! interface (§1 out-of-scope).

use async_trait::async_trait;

use super::retry::VisionCallError;

/// Maps image bytes + surrounding context to a description string.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn describe(
        &self,
        image_bytes: &[u8],
        media_type: &str,
        context_before: &str,
        context_after: &str,
    ) -> Result<String, VisionCallError>;
}

/// Deterministic test double for [`VisionClient`].
#[derive(Debug, Clone)]
pub enum FakeVisionClient {
    AlwaysSucceed(String),
    AlwaysFail(VisionCallErrorKind),
    FailThenSucceed { failures: u32, description: String },
}

/// A `Clone`-friendly stand-in for [`VisionCallError`] (which wraps
/// `String`s and is not meaningfully `Copy`).
#[derive(Debug, Clone, Copy)]
pub enum VisionCallErrorKind {
    RateLimited,
    Transport,
    Server,
    Client,
    ImageMissing,
}

impl VisionCallErrorKind {
    fn into_error(self) -> VisionCallError {
        match self {
            Self::RateLimited => VisionCallError::RateLimited,
            Self::Transport => VisionCallError::Transport("fake transport failure".to_string()),
            Self::Server => VisionCallError::Server(503),
            Self::Client => VisionCallError::Client(400),
            Self::ImageMissing => VisionCallError::ImageMissing,
        }
    }
}

#[async_trait]
impl VisionClient for FakeVisionClient {
    async fn describe(
        &self,
        _image_bytes: &[u8],
        _media_type: &str,
        _context_before: &str,
        _context_after: &str,
    ) -> Result<String, VisionCallError> {
        match self {
            Self::AlwaysSucceed(description) => Ok(description.clone()),
            Self::AlwaysFail(kind) => Err(kind.into_error()),
            Self::FailThenSucceed { failures, description } => {
                // Stateless fake: callers in tests use a fresh client per
                // attempt count they want to exercise, mirroring the
                // teacher's wiremock expectation-per-mock pattern rather
                // than hidden interior mutability.
                if *failures > 0 {
                    Err(VisionCallErrorKind::Transport.into_error())
                } else {
                    Ok(description.clone())
                }
            }
        }
    }
}
