//! Repository port for variation persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Variation, VariationStatus, VariationType};

#[async_trait]
pub trait VariationRepository: Send + Sync {
    /// Insert or replace a variation keyed by `(test_id, variation_type)`.
    async fn upsert(&self, variation: &Variation) -> DomainResult<()>;

    /// Get the variation of a test with the given type.
    async fn get(&self, test_id: Uuid, variation_type: VariationType) -> DomainResult<Option<Variation>>;

    /// List every variation of a test ordered by type.
    async fn list_for_test(&self, test_id: Uuid) -> DomainResult<Vec<Variation>>;

    /// Advance the local status keyed by `(test_id, variation_type)`.
    ///
    /// The write only applies when `status` ranks above the stored status, so
    /// re-applying an observation or applying a stale one changes nothing.
    /// Returns whether a row changed.
    async fn advance_status(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
        status: VariationStatus,
    ) -> DomainResult<bool>;
}
