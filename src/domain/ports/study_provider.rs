//! Port for the external panel provider. Read-only.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::StudyRecord;

#[async_trait]
pub trait StudyProvider: Send + Sync {
    /// Wait until the next request is allowed by the provider's rate limit.
    ///
    /// Callers await this before [`get_study`](Self::get_study) and keep it
    /// outside any per-request deadline.
    async fn ready(&self) {}

    /// Fetch the current state of an external study.
    async fn get_study(&self, study_id: &str) -> DomainResult<StudyRecord>;
}
