//! Reminder notification sinks.

pub mod log_sink;
pub mod webhook;

pub use log_sink::LogNotificationSink;
pub use webhook::WebhookNotificationSink;

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::NotificationConfig;
use crate::domain::ports::NotificationSink;

/// Pick the sink for the configuration: the webhook when a URL is set, log-only otherwise.
pub fn sink_from_config(config: &NotificationConfig) -> DomainResult<Arc<dyn NotificationSink>> {
    match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Ok(Arc::new(WebhookNotificationSink::new(url, config.timeout_secs)?)),
        None => Ok(Arc::new(LogNotificationSink)),
    }
}
