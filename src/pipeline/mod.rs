//! Conversion Pipeline (C4): per-task orchestration (§4.4).
//!
//! Extract -> persist images -> rewrite image placeholders -> optionally
//! describe -> materialize outputs. Grounded on
//! `original_source/service/app/converters/pipeline.py` and
//! `pdf_extractor.py` for exact step ordering and edge-case handling, with
//! the `Extractor`/`VisionClient` ports (§9) as the seams a fake
//! implementation plugs into for tests — the same role the teacher's
//! `HttpClient` trait plays for `DownloadEngine`.

pub mod extractor;
pub mod images;
pub mod markdown;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{instrument, warn};

use crate::config::Config;
use crate::task::Task;
use crate::vision::VisionDescriber;
use extractor::{Extractor, ExtractorError};

/// Context window (characters) requested from the extractor around each
/// image, per §4.4 step 2.
const CONTEXT_CHARS: usize = 500;

/// Errors the conversion pipeline can report. Every variant maps to a
/// worker-side `CONVERSION_ERROR` terminal transition (§4.3 step 4, §7).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no input file present")]
    MissingInput,
    #[error("unsupported format: expected .pdf")]
    UnsupportedFormat,
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractorError),
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-task orchestration (C4).
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn Extractor>,
    vision: Option<Arc<VisionDescriber>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(extractor: Arc<dyn Extractor>, vision: Option<Arc<VisionDescriber>>) -> Self {
        Self { extractor, vision }
    }

    /// Runs the full pipeline for `task`, returning the ordered
    /// `output_files` list (§4.4 step 8) on success.
    #[instrument(skip(self, task, config), fields(task_id = %task.task_id))]
    pub async fn run(&self, task: &Task, config: &Config) -> Result<Vec<String>, PipelineError> {
        let task_dir = config.task_dir(&task.task_id.to_string());
        let input_path = locate_input_file(&task_dir.join("input")).await?;

        let result = self.extractor.extract(&input_path, CONTEXT_CHARS).await?;

        let images_dir = task_dir.join("images");
        tokio::fs::create_dir_all(&images_dir).await?;

        let mut image_paths: HashMap<String, String> = HashMap::new();
        for record in &result.images {
            if let Some(relative) =
                images::persist_image(record, &images_dir, "images").await
            {
                image_paths.insert(record.image_id.clone(), relative);
            }
        }

        let with_locators = markdown::insert_page_locators(&result.markdown, result.page_count);
        let placed = markdown::place_images(&with_locators, &result.images, &image_paths);

        let final_markdown = if task.describe_images {
            if let Some(vision) = &self.vision {
                vision.describe_and_rewrite(&placed, &result.images, &image_paths, config).await
            } else {
                warn!(task_id = %task.task_id, "describe_images requested but no vision client configured; skipping");
                placed
            }
        } else {
            placed
        };

        let md_filename = format!("{}.md", task.task_id);
        tokio::fs::write(task_dir.join(&md_filename), final_markdown.as_bytes()).await?;

        let mut output_files = vec![md_filename];
        let mut image_files: Vec<String> = image_paths.into_values().collect();
        image_files.sort();
        output_files.extend(image_files);

        Ok(output_files)
    }
}

/// Locates the single file under `input_dir`. More than one file is not
/// expected given how C8 writes it; if it happens, the first by directory
/// iteration order is used (matches the Python precursor's `input_files[0]`).
async fn locate_input_file(input_dir: &Path) -> Result<PathBuf, PipelineError> {
    let mut entries = tokio::fs::read_dir(input_dir).await.map_err(|_| PipelineError::MissingInput)?;
    let mut first: Option<PathBuf> = None;

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            first = Some(entry.path());
            break;
        }
    }

    let path = first.ok_or(PipelineError::MissingInput)?;
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return Err(PipelineError::UnsupportedFormat);
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use extractor::{ExtractionResult, FakeExtractor, ImageRecord};

    async fn task_dir_with_input(filename: &str, bytes: &[u8]) -> (tempfile::TempDir, Config) {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        let task_id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
        let input_dir = config.task_dir(task_id).join("input");
        tokio::fs::create_dir_all(&input_dir).await.unwrap();
        tokio::fs::write(input_dir.join(filename), bytes).await.unwrap();
        (temp, config)
    }

    fn sample_task(task_id: &str, describe_images: bool) -> Task {
        let mut task = Task::new(
            "report.pdf".to_string(),
            Some("application/pdf".to_string()),
            10,
            describe_images,
            None,
            chrono::Duration::hours(24),
        );
        task.task_id = task_id.parse().unwrap();
        task
    }

    #[tokio::test]
    async fn test_happy_path_produces_markdown_and_sorted_outputs() {
        let task_id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
        let (_temp, config) = task_dir_with_input("in.pdf", b"%PDF-1.4").await;
        let task = sample_task(task_id, false);

        let extractor = Arc::new(FakeExtractor::succeeding(ExtractionResult {
            markdown: "Hello\n".to_string(),
            images: vec![],
            page_count: 1,
        }));
        let pipeline = Pipeline::new(extractor, None);

        let outputs = pipeline.run(&task, &config).await.unwrap();
        assert_eq!(outputs[0], format!("{task_id}.md"));

        let written = tokio::fs::read_to_string(config.task_dir(task_id).join(format!("{task_id}.md")))
            .await
            .unwrap();
        assert!(written.contains("<!-- Page 1 / 1 -->"));
        assert!(written.contains("Hello"));
    }

    #[tokio::test]
    async fn test_missing_input_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        let task_id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
        tokio::fs::create_dir_all(config.task_dir(task_id).join("input")).await.unwrap();
        let task = sample_task(task_id, false);

        let extractor = Arc::new(FakeExtractor::default());
        let pipeline = Pipeline::new(extractor, None);

        let result = pipeline.run(&task, &config).await;
        assert!(matches!(result, Err(PipelineError::MissingInput)));
    }

    #[tokio::test]
    async fn test_non_pdf_extension_is_unsupported_format() {
        let task_id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
        let (_temp, config) = task_dir_with_input("in.txt", b"not a pdf").await;
        let task = sample_task(task_id, false);

        let extractor = Arc::new(FakeExtractor::default());
        let pipeline = Pipeline::new(extractor, None);

        let result = pipeline.run(&task, &config).await;
        assert!(matches!(result, Err(PipelineError::UnsupportedFormat)));
    }

    #[tokio::test]
    async fn test_extractor_failure_propagates() {
        let task_id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
        let (_temp, config) = task_dir_with_input("in.pdf", b"%PDF-1.4").await;
        let task = sample_task(task_id, false);

        let extractor = Arc::new(FakeExtractor::failing("broken pdf"));
        let pipeline = Pipeline::new(extractor, None);

        let result = pipeline.run(&task, &config).await;
        assert!(matches!(result, Err(PipelineError::Extraction(_))));
    }

    #[tokio::test]
    async fn test_images_are_persisted_and_listed_sorted() {
        let task_id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
        let (_temp, config) = task_dir_with_input("in.pdf", b"%PDF-1.4").await;
        let task = sample_task(task_id, false);

        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(b"rest");

        let extractor = Arc::new(FakeExtractor::succeeding(ExtractionResult {
            markdown: "Page one.\n".to_string(),
            images: vec![
                ImageRecord {
                    image_id: "p1-i2".to_string(),
                    page: 1,
                    index: 2,
                    raw_bytes: jpeg.clone(),
                    format_hint: None,
                    width: None,
                    height: None,
                    context_before: String::new(),
                    context_after: String::new(),
                },
                ImageRecord {
                    image_id: "p1-i1".to_string(),
                    page: 1,
                    index: 1,
                    raw_bytes: jpeg,
                    format_hint: None,
                    width: None,
                    height: None,
                    context_before: String::new(),
                    context_after: String::new(),
                },
            ],
            page_count: 1,
        }));
        let pipeline = Pipeline::new(extractor, None);

        let outputs = pipeline.run(&task, &config).await.unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0], format!("{task_id}.md"));
        assert_eq!(outputs[1], "images/p1-i1.jpeg");
        assert_eq!(outputs[2], "images/p1-i2.jpeg");
    }
}
