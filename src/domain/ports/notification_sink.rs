//! Port for fire-and-forget reminder delivery.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Tell operators a study is still running. Callers log and drop failures.
    async fn send_completion_reminder(&self, study_id: &str, test_id: Uuid) -> DomainResult<()>;
}
