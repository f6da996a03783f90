//! The `Extractor` port (§9 "two explicit ports"): PDF text-and-image
//! extraction is an external collaborator, consumed only through this
//! narrow interface (§1 out-of-scope).

use async_trait::async_trait;
use std::path::Path;

/// One image extracted from a page, with its placement coordinates and
/// surrounding textual context.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Unique (within a task) identifier; used as the placeholder id and
    /// output filename stem.
    pub image_id: String,
    /// 1-indexed page the image appears on.
    pub page: u32,
    /// Ordering among images on the same page.
    pub index: u32,
    /// Raw, possibly non-PNG/JPEG, image bytes.
    pub raw_bytes: Vec<u8>,
    /// Extractor-supplied hint about the encoding (advisory only; §4.4
    /// step 3 determines the actual on-disk format from magic bytes).
    pub format_hint: Option<String>,
    /// Pixel width, when known (required to interpret raw packed pixels).
    pub width: Option<u32>,
    /// Pixel height, when known.
    pub height: Option<u32>,
    /// Up to `context_chars` of Markdown text immediately preceding the
    /// image's position.
    pub context_before: String,
    /// Up to `context_chars` of Markdown text immediately following.
    pub context_after: String,
}

/// Result of extracting a PDF: the rewritten Markdown skeleton plus the
/// ordered image records and authoritative page count.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub markdown: String,
    pub images: Vec<ImageRecord>,
    pub page_count: u32,
}

/// Errors an [`Extractor`] implementation may report.
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Converts a PDF file into Markdown plus extracted images.
///
/// Implementations are injected into C4, enabling fakes for tests (§9).
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extracts `pdf_path`, writing nothing itself — callers persist
    /// `images` per the policy in §4.4 step 3.
    async fn extract(
        &self,
        pdf_path: &Path,
        context_chars: usize,
    ) -> Result<ExtractionResult, ExtractorError>;
}

/// Deterministic test double for [`Extractor`].
///
/// Ignores `pdf_path`'s contents and always returns the configured result,
/// the same way the teacher's `tests/download_engine_integration.rs` drives
/// `DownloadEngine` against a `wiremock::MockServer` instead of real
/// network calls.
#[derive(Debug, Clone, Default)]
pub struct FakeExtractor {
    pub result: Option<ExtractionResult>,
    pub fail_with: Option<String>,
}

impl FakeExtractor {
    #[must_use]
    pub fn succeeding(result: ExtractionResult) -> Self {
        Self { result: Some(result), fail_with: None }
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self { result: None, fail_with: Some(message.to_string()) }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(
        &self,
        _pdf_path: &Path,
        _context_chars: usize,
    ) -> Result<ExtractionResult, ExtractorError> {
        if let Some(message) = &self.fail_with {
            return Err(ExtractorError::Failed(message.clone()));
        }
        self.result.clone().ok_or_else(|| ExtractorError::Failed("no result configured".to_string()))
    }
}
