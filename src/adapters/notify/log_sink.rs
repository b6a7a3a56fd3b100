//! Notification sink that only writes a log line.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::ports::NotificationSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send_completion_reminder(&self, study_id: &str, test_id: Uuid) -> DomainResult<()> {
        tracing::info!(study_id, test_id = %test_id, "Study still running; completion reminder");
        Ok(())
    }
}
