//! Repository port for A/B test persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AbTest, TestStatus};

/// Filter for listing tests.
#[derive(Debug, Default, Clone)]
pub struct TestFilter {
    pub status: Option<TestStatus>,
    /// Exclude tests carrying the manual block flag.
    pub exclude_blocked: bool,
}

#[async_trait]
pub trait TestRepository: Send + Sync {
    /// Insert a new test.
    async fn create(&self, test: &AbTest) -> DomainResult<()>;

    /// Get a test by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<AbTest>>;

    /// List tests matching the filter, oldest first.
    async fn list(&self, filter: TestFilter) -> DomainResult<Vec<AbTest>>;

    /// List all tests currently in the `active` status.
    async fn list_active(&self) -> DomainResult<Vec<AbTest>> {
        self.list(TestFilter {
            status: Some(TestStatus::Active),
            exclude_blocked: false,
        })
        .await
    }

    /// Set the test status, filtered by test id.
    ///
    /// Returns whether a row changed. Writing the status a test already has
    /// changes nothing.
    async fn update_status(&self, id: Uuid, status: TestStatus) -> DomainResult<bool>;

    /// Set or clear the manual block flag.
    async fn set_blocked(&self, id: Uuid, blocked: bool) -> DomainResult<()>;
}
