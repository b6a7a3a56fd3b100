//! Work queue port for on-demand variation checks.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::VariationCheckJob;

#[async_trait]
pub trait VariationCheckQueue: Send + Sync {
    /// Add a pending job.
    async fn enqueue(&self, job: &VariationCheckJob) -> DomainResult<()>;

    /// Claim the oldest pending job, marking it running.
    async fn claim_next(&self) -> DomainResult<Option<VariationCheckJob>>;

    /// Remove a handled job from the queue.
    async fn complete(&self, id: Uuid) -> DomainResult<()>;

    /// Record a failure. The job stays failed and is not picked up again.
    async fn fail(&self, id: Uuid, error: &str) -> DomainResult<()>;

    /// Number of jobs waiting to be claimed.
    async fn pending_count(&self) -> DomainResult<u64>;

    /// Put running jobs not updated within `lease` back to pending.
    /// Covers workers that died between claim and complete/fail.
    async fn reclaim_stale(&self, lease: Duration) -> DomainResult<u64>;

    /// Delete failed jobs last updated more than `retention` ago.
    async fn prune_failed(&self, retention: Duration) -> DomainResult<u64>;
}
