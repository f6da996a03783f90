//! Vision Describer (C5): bounded-concurrency, typed-retry mapping from
//! image records to description text, then Markdown rewrite (§4.5).

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::pipeline::extractor::ImageRecord;
use crate::task::truncate_chars;

use super::client::VisionClient;
use super::retry::{RetryDecision, RetryPolicy, classify};

/// Maximum length of the per-image last-error string embedded in a
/// description-unavailable sentinel (§4.5).
const MAX_LAST_ERROR_LEN: usize = 100;

/// C5: per-task fan-out over `VisionClient.describe`, then literal
/// substring rewrite of bare image references into description blocks.
pub struct VisionDescriber {
    client: Arc<dyn VisionClient>,
}

impl VisionDescriber {
    #[must_use]
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        Self { client }
    }

    /// Describes every image in `images` (bounded by
    /// `config.max_concurrent_descriptions`) and rewrites `markdown`,
    /// replacing each bare `![<id>](images/<filename>)` reference with a
    /// description block. Images not present in `image_paths` (dropped
    /// during persistence) are left untouched.
    pub async fn describe_and_rewrite(
        &self,
        markdown: &str,
        images: &[ImageRecord],
        image_paths: &HashMap<String, String>,
        config: &Config,
    ) -> String {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_descriptions.max(1)));
        let policy = Arc::new(RetryPolicy::new(
            config.description_max_retries,
            config.description_retry_delay,
        ));

        let tasks = images.iter().filter(|image| image_paths.contains_key(&image.image_id)).map(
            |image| {
                let semaphore = semaphore.clone();
                let policy = policy.clone();
                let client = self.client.clone();
                let image = image.clone();
                async move {
                    let _permit = semaphore.acquire().await;
                    let result = describe_one(client.as_ref(), &policy, &image).await;
                    (image.image_id.clone(), result)
                }
            },
        );

        let results: HashMap<String, Result<String, String>> = join_all(tasks).await.into_iter().collect();

        let mut out = markdown.to_string();
        for image in images {
            let Some(path) = image_paths.get(&image.image_id) else { continue };
            let Some(result) = results.get(&image.image_id) else { continue };

            let description = match result {
                Ok(description) => description.clone(),
                Err(last_error) => format!("description unavailable ({last_error})"),
            };

            let placeholder = format!("![{}]({})", image.image_id, path);
            let block = build_description_block(
                &image.image_id,
                path,
                &image.context_before,
                &image.context_after,
                &description,
            );
            out = out.replacen(&placeholder, &block, 1);
        }

        out
    }
}

/// Runs the retry state machine for one image, returning either the
/// description or the (100-char-truncated) last error string.
async fn describe_one(
    client: &dyn VisionClient,
    policy: &RetryPolicy,
    image: &ImageRecord,
) -> Result<String, String> {
    let media_type = media_type_for(image);
    let mut attempt = 1u32;

    loop {
        match client
            .describe(&image.raw_bytes, &media_type, &image.context_before, &image.context_after)
            .await
        {
            Ok(description) => return Ok(description),
            Err(call_error) => {
                let failure = classify(&call_error);
                match policy.should_retry(failure, attempt) {
                    RetryDecision::Retry { delay, attempt: next_attempt } => {
                        tokio::time::sleep(delay).await;
                        attempt = next_attempt;
                    }
                    RetryDecision::DoNotRetry => {
                        return Err(truncate_chars(&call_error.to_string(), MAX_LAST_ERROR_LEN));
                    }
                }
            }
        }
    }
}

fn media_type_for(image: &ImageRecord) -> String {
    if let Some(hint) = &image.format_hint {
        return hint.clone();
    }
    "application/octet-stream".to_string()
}

/// Builds the Markdown fragment that replaces a bare image reference
/// (§4.5 "Markdown rewrite"). `context_before`/`context_after` lines are
/// omitted when empty.
fn build_description_block(
    image_id: &str,
    relative_path: &str,
    context_before: &str,
    context_after: &str,
    description: &str,
) -> String {
    let mut block = String::new();
    if !context_before.is_empty() {
        block.push_str(context_before);
        block.push_str("\n\n");
    }
    block.push_str(&format!("![{image_id}]({relative_path})\n"));
    block.push_str(&format!("Image {image_id}: {description}\n"));
    block.push('\n');
    if !context_after.is_empty() {
        block.push_str(context_after);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::client::{FakeVisionClient, VisionCallErrorKind};

    fn image(id: &str) -> ImageRecord {
        ImageRecord {
            image_id: id.to_string(),
            page: 1,
            index: 1,
            raw_bytes: vec![0xFF, 0xD8],
            format_hint: Some("image/jpeg".to_string()),
            width: None,
            height: None,
            context_before: "Before text.".to_string(),
            context_after: "After text.".to_string(),
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.description_retry_delay = std::time::Duration::from_millis(1);
        config
    }

    #[tokio::test]
    async fn test_successful_description_rewrites_reference() {
        let describer = VisionDescriber::new(Arc::new(FakeVisionClient::AlwaysSucceed(
            "a red circle".to_string(),
        )));
        let img = image("p1-i1");
        let mut paths = HashMap::new();
        paths.insert("p1-i1".to_string(), "images/p1-i1.jpeg".to_string());
        let markdown = "Before text.\n\n![p1-i1](images/p1-i1.jpeg)\n\nAfter text.\n";

        let out = describer.describe_and_rewrite(markdown, &[img], &paths, &config()).await;
        assert!(out.contains("Image p1-i1: a red circle"));
        assert!(!out.contains("![p1-i1](images/p1-i1.jpeg)\n\nAfter"));
    }

    #[tokio::test]
    async fn test_failing_client_produces_unavailable_sentinel() {
        let describer = VisionDescriber::new(Arc::new(FakeVisionClient::AlwaysFail(
            VisionCallErrorKind::Client,
        )));
        let img = image("p1-i1");
        let mut paths = HashMap::new();
        paths.insert("p1-i1".to_string(), "images/p1-i1.jpeg".to_string());
        let markdown = "![p1-i1](images/p1-i1.jpeg)\n";

        let out = describer.describe_and_rewrite(markdown, &[img], &paths, &config()).await;
        assert!(out.contains("description unavailable (client error: 400)"));
    }

    #[tokio::test]
    async fn test_image_dropped_during_persistence_is_left_untouched() {
        let describer =
            VisionDescriber::new(Arc::new(FakeVisionClient::AlwaysSucceed("x".to_string())));
        let img = image("p1-i1");
        let paths = HashMap::new();
        let markdown = "no image reference here\n";

        let out = describer.describe_and_rewrite(markdown, &[img], &paths, &config()).await;
        assert_eq!(out, markdown);
    }

    #[test]
    fn test_build_description_block_omits_empty_context() {
        let block = build_description_block("p1-i1", "images/p1-i1.png", "", "", "a cat");
        assert!(!block.starts_with('\n'));
        assert!(block.contains("Image p1-i1: a cat"));
    }
}
