//! Response records and the per-variant metrics derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ab_test::AbTest;
use super::variation::VariationType;

/// Post-choice survey filled in by a tester about the product they picked.
///
/// Sub-scores are on a 1-5 scale; a `None` is a non-numeric or missing answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub test_id: Uuid,
    pub product_id: Uuid,
    /// Derived through the tester's session.
    pub variation_type: VariationType,
    pub appearance: Option<f64>,
    pub confidence: Option<f64>,
    pub value: Option<f64>,
    pub convenience: Option<f64>,
    pub brand: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl SurveyResponse {
    pub fn sub_scores(&self) -> [Option<f64>; 5] {
        [
            self.appearance,
            self.confidence,
            self.value,
            self.convenience,
            self.brand,
        ]
    }
}

/// Survey filled in by a tester who chose a competitor over the variant,
/// rating the variant relative to that competitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub test_id: Uuid,
    pub competitor_product_id: Uuid,
    /// Derived through the tester's session.
    pub variation_type: VariationType,
    pub value: Option<f64>,
    pub aesthetics: Option<f64>,
    pub utility: Option<f64>,
    pub trust: Option<f64>,
    pub convenience: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Raw counts feeding the share-of-buy and share-of-click figures for one variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCounts {
    /// Surveys recorded against the variant's product (testers who bought it).
    pub chosen_times: u64,
    /// Interaction events that landed on the variant's product.
    pub choice_events: u64,
    /// All interaction events in sessions of this variant.
    pub total_clicks: u64,
}

/// Per-variant summary row, created once during insights generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSummary {
    pub id: Uuid,
    pub test_id: Uuid,
    pub variant_type: VariationType,
    pub product_id: Option<Uuid>,
    /// Percentage, one decimal.
    pub share_of_buy: f64,
    /// Percentage, one decimal.
    pub share_of_click: f64,
    /// 1-5 scale, one decimal; 0 when no surveys exist.
    pub value_score: f64,
    /// Set later by the comparison pass.
    pub win: bool,
    pub created_at: DateTime<Utc>,
}

/// "This variant vs. this competitor" scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitiveInsight {
    pub id: Uuid,
    pub test_id: Uuid,
    pub variant_type: VariationType,
    pub competitor_product_id: Uuid,
    pub share_of_buy: f64,
    pub value: f64,
    pub aesthetics: f64,
    pub utility: f64,
    pub trust: f64,
    pub convenience: f64,
    pub created_at: DateTime<Utc>,
}

/// Audience breakdown of the testers who took part in a test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub test_id: Uuid,
    pub tester_count: u32,
    pub age_ranges: Vec<String>,
    pub genders: Vec<String>,
    pub locations: Vec<String>,
    pub interests: Vec<String>,
}

/// Competitive insights for one competitor product across variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorInsights {
    pub competitor_product_id: Uuid,
    pub insights: Vec<CompetitiveInsight>,
}

/// Read-only projection of everything known about a finished test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsReport {
    pub test: AbTest,
    pub demographics: Option<Demographics>,
    pub summaries: Vec<TestSummary>,
    pub competitors: Vec<CompetitorInsights>,
}

/// What one `generate_for_test` run wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightsGeneration {
    pub test_id: Uuid,
    pub variants: Vec<VariationType>,
    pub summaries_inserted: usize,
    pub competitive_inserted: usize,
}
