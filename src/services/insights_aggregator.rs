//! Insights aggregation.
//!
//! Turns raw per-tester response records into per-variant summary rows and
//! per-competitor comparison rows, and projects everything into a read-only
//! report. Writes are inserts keyed by natural identifiers, so running the
//! aggregation twice never duplicates rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AbTest, ComparisonResponse, CompetitiveInsight, CompetitorInsights, InsightsGeneration,
    InsightsReport, SurveyResponse, TestStatus, TestSummary, VariantCounts, Variation,
};
use crate::domain::ports::{InsightsRepository, TestRepository, VariationRepository};
use crate::services::metrics;

/// Build a summary row from already-loaded inputs.
pub fn summarize_variant(
    test_id: Uuid,
    variation: &Variation,
    counts: &VariantCounts,
    surveys: &[SurveyResponse],
) -> TestSummary {
    TestSummary {
        id: Uuid::new_v4(),
        test_id,
        variant_type: variation.variation_type,
        product_id: variation.product_id,
        share_of_buy: metrics::share_of_buy(counts),
        share_of_click: metrics::share_of_click(counts),
        value_score: metrics::value_score(surveys),
        win: false,
        created_at: Utc::now(),
    }
}

/// Build one competitive insight per competitor found in the comparisons.
/// Output is ordered by competitor product id.
pub fn summarize_competitors(
    test_id: Uuid,
    variation: &Variation,
    total_clicks: u64,
    comparisons: &[ComparisonResponse],
) -> Vec<CompetitiveInsight> {
    let mut by_competitor: BTreeMap<Uuid, Vec<&ComparisonResponse>> = BTreeMap::new();
    for comparison in comparisons {
        by_competitor
            .entry(comparison.competitor_product_id)
            .or_default()
            .push(comparison);
    }

    by_competitor
        .into_iter()
        .map(|(competitor_product_id, rows)| {
            let [value, aesthetics, utility, trust, convenience] = metrics::comparison_scores(&rows);
            CompetitiveInsight {
                id: Uuid::new_v4(),
                test_id,
                variant_type: variation.variation_type,
                competitor_product_id,
                share_of_buy: metrics::percentage(rows.len() as u64, total_clicks),
                value,
                aesthetics,
                utility,
                trust,
                convenience,
                created_at: Utc::now(),
            }
        })
        .collect()
}

pub struct InsightsAggregator {
    tests: Arc<dyn TestRepository>,
    variations: Arc<dyn VariationRepository>,
    insights: Arc<dyn InsightsRepository>,
}

impl InsightsAggregator {
    pub fn new(
        tests: Arc<dyn TestRepository>,
        variations: Arc<dyn VariationRepository>,
        insights: Arc<dyn InsightsRepository>,
    ) -> Self {
        Self {
            tests,
            variations,
            insights,
        }
    }

    fn product_of(variation: &Variation) -> DomainResult<Uuid> {
        variation.product_id.ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "variation {} of test {} has no product",
                variation.variation_type, variation.test_id
            ))
        })
    }

    async fn persist_variant_summary(
        &self,
        test: &AbTest,
        variation: &Variation,
    ) -> DomainResult<(TestSummary, VariantCounts, bool)> {
        let product_id = Self::product_of(variation)?;
        let counts = self
            .insights
            .variant_counts(test.id, variation.variation_type, product_id)
            .await?;
        let surveys = self
            .insights
            .surveys_for_variant(test.id, variation.variation_type, product_id)
            .await?;

        let summary = summarize_variant(test.id, variation, &counts, &surveys);
        if self.insights.insert_summary(&summary).await? {
            return Ok((summary, counts, true));
        }

        debug!(
            test_id = %test.id,
            variation_type = %variation.variation_type,
            "Summary already exists; keeping stored row"
        );
        let stored = self
            .insights
            .summary_for_variant(test.id, variation.variation_type)
            .await?
            .ok_or_else(|| {
                DomainError::DatabaseError(format!(
                    "summary for variant {} of test {} vanished after insert conflict",
                    variation.variation_type, test.id
                ))
            })?;
        Ok((stored, counts, false))
    }

    /// Compute and persist the summary row for one variant.
    ///
    /// Summaries are written once. When a row already exists the stored row
    /// is returned unchanged.
    #[instrument(skip(self, test, variation), fields(test_id = %test.id, variation_type = %variation.variation_type))]
    pub async fn compute_variant_summary(
        &self,
        test: &AbTest,
        variation: &Variation,
    ) -> DomainResult<TestSummary> {
        self.persist_variant_summary(test, variation)
            .await
            .map(|(summary, _, _)| summary)
    }

    /// Compute and persist "variant vs. competitor" rows for one variant.
    /// Returns the stored rows when some already existed.
    pub async fn compute_competitive_insights(
        &self,
        test: &AbTest,
        variation: &Variation,
    ) -> DomainResult<Vec<CompetitiveInsight>> {
        let product_id = Self::product_of(variation)?;
        let counts = self
            .insights
            .variant_counts(test.id, variation.variation_type, product_id)
            .await?;
        let (insights, _) = self.persist_competitors(test, variation, counts.total_clicks).await?;
        Ok(insights)
    }

    async fn persist_competitors(
        &self,
        test: &AbTest,
        variation: &Variation,
        total_clicks: u64,
    ) -> DomainResult<(Vec<CompetitiveInsight>, usize)> {
        let comparisons = self
            .insights
            .comparisons_for_variant(test.id, variation.variation_type)
            .await?;
        let insights = summarize_competitors(test.id, variation, total_clicks, &comparisons);

        let mut inserted = 0;
        for insight in &insights {
            if self.insights.insert_competitive_insight(insight).await? {
                inserted += 1;
            }
        }
        if inserted == insights.len() {
            return Ok((insights, inserted));
        }

        let stored = self
            .insights
            .competitive_insights_for_test(test.id)
            .await?
            .into_iter()
            .filter(|i| i.variant_type == variation.variation_type)
            .collect();
        Ok((stored, inserted))
    }

    /// Summaries and competitive insights for every variation that has a product.
    #[instrument(skip(self))]
    pub async fn generate_for_test(&self, test_id: Uuid) -> DomainResult<InsightsGeneration> {
        let test = self
            .tests
            .get(test_id)
            .await?
            .ok_or(DomainError::TestNotFound(test_id))?;
        if test.status != TestStatus::Complete {
            warn!(test_id = %test_id, status = %test.status, "Generating insights for a test that is not complete");
        }

        let mut generation = InsightsGeneration {
            test_id,
            ..Default::default()
        };

        for variation in self.variations.list_for_test(test_id).await? {
            if variation.product_id.is_none() {
                warn!(test_id = %test_id, variation_type = %variation.variation_type, "Skipping variation without product");
                continue;
            }

            let (_, counts, inserted) = self.persist_variant_summary(&test, &variation).await?;
            if inserted {
                generation.summaries_inserted += 1;
            }
            let (_, competitive) = self
                .persist_competitors(&test, &variation, counts.total_clicks)
                .await?;
            generation.competitive_inserted += competitive;
            generation.variants.push(variation.variation_type);
        }

        info!(
            test_id = %test_id,
            variants = generation.variants.len(),
            summaries_inserted = generation.summaries_inserted,
            competitive_inserted = generation.competitive_inserted,
            "Insights generated"
        );
        Ok(generation)
    }

    /// Join test metadata, demographics, summaries and competitive insights. Read-only.
    pub async fn build_insights_report(&self, test_id: Uuid) -> DomainResult<InsightsReport> {
        let test = self
            .tests
            .get(test_id)
            .await?
            .ok_or(DomainError::TestNotFound(test_id))?;
        let demographics = self.insights.demographics_for_test(test_id).await?;
        let summaries = self.insights.summaries_for_test(test_id).await?;

        let mut grouped: BTreeMap<Uuid, Vec<CompetitiveInsight>> = BTreeMap::new();
        for insight in self.insights.competitive_insights_for_test(test_id).await? {
            grouped
                .entry(insight.competitor_product_id)
                .or_default()
                .push(insight);
        }
        let competitors = grouped
            .into_iter()
            .map(|(competitor_product_id, insights)| CompetitorInsights {
                competitor_product_id,
                insights,
            })
            .collect();

        Ok(InsightsReport {
            test,
            demographics,
            summaries,
            competitors,
        })
    }
}
