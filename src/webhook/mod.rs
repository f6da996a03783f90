//! Webhook Notifier (C6): best-effort POST on terminal task state, with
//! bounded *linear* retry (§4.6).
//!
//! Deliberately diverges from C5's exponential backoff (`classify` +
//! `RetryPolicy` in [`crate::vision::retry`]): the delay here is `retry_delay
//! × attempt`, computed directly rather than through a shared policy type,
//! because the source's retry tables genuinely differ per component.

pub mod payload;

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::store::TaskStore;
use crate::task::Task;
use payload::WebhookPayload;

/// Best-effort delivery of a task's terminal state to its registered URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    store: TaskStore,
}

impl WebhookNotifier {
    #[must_use]
    pub fn new(http: reqwest::Client, store: TaskStore) -> Self {
        Self { http, store }
    }

    /// Delivers `task`'s terminal state to its `webhook_url`, if any.
    /// Never returns an error: failures are absorbed into telemetry and
    /// logged, per §7 ("WebhookError ... never fails the task").
    pub async fn notify(&self, task: &Task, config: &Config) {
        let Some(url) = &task.webhook_url else { return };
        let payload = WebhookPayload::from(task);

        let mut attempt = 1u32;
        loop {
            let outcome = self.send_once(url, &payload, config.webhook_timeout).await;
            let status_code = outcome.unwrap_or(0);

            if let Err(err) = self.store.update_webhook_telemetry(task.task_id, status_code, i64::from(attempt)).await {
                warn!(task_id = %task.task_id, error = %err, "failed to record webhook telemetry");
            }

            if (200..300).contains(&status_code) {
                debug!(task_id = %task.task_id, status_code, "webhook delivered");
                return;
            }

            if attempt >= config.webhook_max_retries {
                warn!(task_id = %task.task_id, status_code, attempts = attempt, "webhook delivery exhausted retries");
                return;
            }

            let delay = linear_delay(config.webhook_retry_delay, attempt);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Sends one attempt, returning the observed HTTP status code, or `None`
    /// on a transport-level failure (no response at all).
    async fn send_once(&self, url: &str, payload: &WebhookPayload, timeout: Duration) -> Option<u16> {
        let response = self
            .http
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await;

        match response {
            Ok(resp) => Some(resp.status().as_u16()),
            Err(err) => {
                debug!(url, error = %err, "webhook request failed");
                None
            }
        }
    }
}

/// `retry_delay × attempt` — linear, not exponential (§4.6).
fn linear_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store() -> TaskStore {
        let db = crate::db::Database::new_in_memory().await.unwrap();
        TaskStore::new(db)
    }

    fn sample_task(webhook_url: Option<String>) -> Task {
        let mut task = Task::new(
            "a.pdf".to_string(),
            None,
            1,
            false,
            webhook_url,
            chrono::Duration::hours(1),
        );
        task.status = crate::task::TaskStatus::Completed;
        task.finished_at = Some(chrono::Utc::now());
        task.output_files = vec!["a.md".to_string()];
        task
    }

    #[test]
    fn test_linear_delay_scales_by_attempt() {
        let base = Duration::from_secs(5);
        assert_eq!(linear_delay(base, 1), Duration::from_secs(5));
        assert_eq!(linear_delay(base, 2), Duration::from_secs(10));
        assert_eq!(linear_delay(base, 3), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_successful_delivery_records_status_and_stops() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = store().await;
        let task = sample_task(Some(format!("{}/hook", mock_server.uri())));
        store.create(&task).await.unwrap();

        let notifier = WebhookNotifier::new(reqwest::Client::new(), store.clone());
        let mut config = Config::default();
        config.webhook_retry_delay = Duration::from_millis(1);
        notifier.notify(&task, &config).await;

        let fetched = store.get(task.task_id).await.unwrap();
        assert_eq!(fetched.webhook_last_status, Some(200));
        assert_eq!(fetched.webhook_attempt_count, 1);
    }

    #[tokio::test]
    async fn test_no_webhook_url_is_a_no_op() {
        let store = store().await;
        let task = sample_task(None);
        store.create(&task).await.unwrap();

        let notifier = WebhookNotifier::new(reqwest::Client::new(), store.clone());
        notifier.notify(&task, &Config::default()).await;

        let fetched = store.get(task.task_id).await.unwrap();
        assert_eq!(fetched.webhook_attempt_count, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_records_last_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = store().await;
        let task = sample_task(Some(format!("{}/hook", mock_server.uri())));
        store.create(&task).await.unwrap();

        let notifier = WebhookNotifier::new(reqwest::Client::new(), store.clone());
        let mut config = Config::default();
        config.webhook_retry_delay = Duration::from_millis(1);
        config.webhook_max_retries = 2;
        notifier.notify(&task, &config).await;

        let fetched = store.get(task.task_id).await.unwrap();
        assert_eq!(fetched.webhook_last_status, Some(500));
        assert_eq!(fetched.webhook_attempt_count, 2);
    }
}
