//! Webhook notification sink.
//!
//! Posts a small JSON document per reminder. Delivery is attempted once;
//! the caller decides what to do with a failure (log it and move on).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::NotificationSink;

#[derive(Debug, Serialize)]
struct ReminderPayload<'a> {
    event: &'static str,
    study_id: &'a str,
    test_id: Uuid,
    sent_at: String,
}

#[derive(Debug, Clone)]
pub struct WebhookNotificationSink {
    http: Client,
    url: String,
}

impl WebhookNotificationSink {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn send_completion_reminder(&self, study_id: &str, test_id: Uuid) -> DomainResult<()> {
        let payload = ReminderPayload {
            event: "completion_reminder",
            study_id,
            test_id,
            sent_at: Utc::now().to_rfc3339(),
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::NotificationFailed(format!("webhook request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(DomainError::NotificationFailed(format!(
                "webhook returned {}",
                resp.status()
            )));
        }

        tracing::debug!(study_id, test_id = %test_id, "Completion reminder delivered");
        Ok(())
    }
}
