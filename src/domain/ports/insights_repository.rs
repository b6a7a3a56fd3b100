//! Repository port for response records and derived insights.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ComparisonResponse, CompetitiveInsight, Demographics, SurveyResponse, TestSummary,
    VariantCounts, VariationType,
};

#[async_trait]
pub trait InsightsRepository: Send + Sync {
    /// Surveys recorded for `product_id` in sessions of the given variant.
    async fn surveys_for_variant(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
        product_id: Uuid,
    ) -> DomainResult<Vec<SurveyResponse>>;

    /// Competitor comparisons recorded in sessions of the given variant.
    async fn comparisons_for_variant(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
    ) -> DomainResult<Vec<ComparisonResponse>>;

    /// Aggregate counts for share-of-buy and share-of-click.
    async fn variant_counts(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
        product_id: Uuid,
    ) -> DomainResult<VariantCounts>;

    /// Insert a summary unless one exists for `(test_id, variant_type)`.
    /// Returns whether a row was inserted.
    async fn insert_summary(&self, summary: &TestSummary) -> DomainResult<bool>;

    /// Insert a competitive insight unless one exists for
    /// `(test_id, variant_type, competitor_product_id)`.
    async fn insert_competitive_insight(&self, insight: &CompetitiveInsight) -> DomainResult<bool>;

    /// The stored summary for one variant, if any.
    async fn summary_for_variant(
        &self,
        test_id: Uuid,
        variant_type: VariationType,
    ) -> DomainResult<Option<TestSummary>>;

    async fn summaries_for_test(&self, test_id: Uuid) -> DomainResult<Vec<TestSummary>>;

    async fn competitive_insights_for_test(&self, test_id: Uuid) -> DomainResult<Vec<CompetitiveInsight>>;

    async fn demographics_for_test(&self, test_id: Uuid) -> DomainResult<Option<Demographics>>;
}
