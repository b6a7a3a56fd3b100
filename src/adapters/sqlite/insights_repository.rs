//! SQLite adapter for InsightsRepository.
//!
//! Response rows carry their variation type only through the tester's
//! session, so every read joins `tester_sessions`.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default, parse_optional_uuid, parse_uuid, parse_variation_type};
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ComparisonResponse, CompetitiveInsight, Demographics, SurveyResponse, TestSummary,
    VariantCounts, VariationType,
};
use crate::domain::ports::insights_repository::InsightsRepository;

/// Select a score column, reading anything that is not stored as a number as NULL.
macro_rules! numeric_or_null {
    ($column:literal) => {
        concat!(
            "CASE WHEN typeof(", $column, ") IN ('real', 'integer') THEN ", $column,
            " ELSE NULL END"
        )
    };
}

#[derive(Clone)]
pub struct SqliteInsightsRepository {
    pool: SqlitePool,
}

impl SqliteInsightsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SurveyRow {
    id: String,
    session_id: String,
    test_id: String,
    product_id: String,
    variation_type: String,
    appearance: Option<f64>,
    confidence: Option<f64>,
    value: Option<f64>,
    convenience: Option<f64>,
    brand: Option<f64>,
    created_at: String,
}

fn row_to_survey(row: SurveyRow) -> DomainResult<SurveyResponse> {
    Ok(SurveyResponse {
        id: parse_uuid(&row.id)?,
        session_id: parse_uuid(&row.session_id)?,
        test_id: parse_uuid(&row.test_id)?,
        product_id: parse_uuid(&row.product_id)?,
        variation_type: parse_variation_type(&row.variation_type)?,
        appearance: row.appearance,
        confidence: row.confidence,
        value: row.value,
        convenience: row.convenience,
        brand: row.brand,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct ComparisonRow {
    id: String,
    session_id: String,
    test_id: String,
    competitor_product_id: String,
    variation_type: String,
    value: Option<f64>,
    aesthetics: Option<f64>,
    utility: Option<f64>,
    trust: Option<f64>,
    convenience: Option<f64>,
    created_at: String,
}

fn row_to_comparison(row: ComparisonRow) -> DomainResult<ComparisonResponse> {
    Ok(ComparisonResponse {
        id: parse_uuid(&row.id)?,
        session_id: parse_uuid(&row.session_id)?,
        test_id: parse_uuid(&row.test_id)?,
        competitor_product_id: parse_uuid(&row.competitor_product_id)?,
        variation_type: parse_variation_type(&row.variation_type)?,
        value: row.value,
        aesthetics: row.aesthetics,
        utility: row.utility,
        trust: row.trust,
        convenience: row.convenience,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    test_id: String,
    variant_type: String,
    product_id: Option<String>,
    share_of_buy: f64,
    share_of_click: f64,
    value_score: f64,
    win: bool,
    created_at: String,
}

fn row_to_summary(row: SummaryRow) -> DomainResult<TestSummary> {
    Ok(TestSummary {
        id: parse_uuid(&row.id)?,
        test_id: parse_uuid(&row.test_id)?,
        variant_type: parse_variation_type(&row.variant_type)?,
        product_id: parse_optional_uuid(row.product_id)?,
        share_of_buy: row.share_of_buy,
        share_of_click: row.share_of_click,
        value_score: row.value_score,
        win: row.win,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct CompetitiveRow {
    id: String,
    test_id: String,
    variant_type: String,
    competitor_product_id: String,
    share_of_buy: f64,
    value: f64,
    aesthetics: f64,
    utility: f64,
    trust: f64,
    convenience: f64,
    created_at: String,
}

fn row_to_competitive(row: CompetitiveRow) -> DomainResult<CompetitiveInsight> {
    Ok(CompetitiveInsight {
        id: parse_uuid(&row.id)?,
        test_id: parse_uuid(&row.test_id)?,
        variant_type: parse_variation_type(&row.variant_type)?,
        competitor_product_id: parse_uuid(&row.competitor_product_id)?,
        share_of_buy: row.share_of_buy,
        value: row.value,
        aesthetics: row.aesthetics,
        utility: row.utility,
        trust: row.trust,
        convenience: row.convenience,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct DemographicsRow {
    test_id: String,
    tester_count: i64,
    age_ranges: Option<String>,
    genders: Option<String>,
    locations: Option<String>,
    interests: Option<String>,
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    chosen_times: i64,
    choice_events: i64,
    total_clicks: i64,
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl InsightsRepository for SqliteInsightsRepository {
    async fn surveys_for_variant(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
        product_id: Uuid,
    ) -> DomainResult<Vec<SurveyResponse>> {
        let rows: Vec<SurveyRow> = sqlx::query_as(concat!(
            "SELECT s.id, s.session_id, s.test_id, s.product_id, ts.variation_type, ",
            numeric_or_null!("s.appearance"), " AS appearance, ",
            numeric_or_null!("s.confidence"), " AS confidence, ",
            numeric_or_null!("s.value"), " AS value, ",
            numeric_or_null!("s.convenience"), " AS convenience, ",
            numeric_or_null!("s.brand"), " AS brand, ",
            "s.created_at
             FROM surveys s
             JOIN tester_sessions ts ON ts.id = s.session_id
             WHERE s.test_id = ?1 AND ts.variation_type = ?2 AND s.product_id = ?3
             ORDER BY s.created_at ASC"
        ))
        .bind(test_id.to_string())
        .bind(variation_type.as_str())
        .bind(product_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_survey).collect()
    }

    async fn comparisons_for_variant(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
    ) -> DomainResult<Vec<ComparisonResponse>> {
        let rows: Vec<ComparisonRow> = sqlx::query_as(concat!(
            "SELECT c.id, c.session_id, c.test_id, c.competitor_product_id, ts.variation_type, ",
            numeric_or_null!("c.value"), " AS value, ",
            numeric_or_null!("c.aesthetics"), " AS aesthetics, ",
            numeric_or_null!("c.utility"), " AS utility, ",
            numeric_or_null!("c.trust"), " AS trust, ",
            numeric_or_null!("c.convenience"), " AS convenience, ",
            "c.created_at
             FROM comparisons c
             JOIN tester_sessions ts ON ts.id = c.session_id
             WHERE c.test_id = ?1 AND ts.variation_type = ?2
             ORDER BY c.created_at ASC"
        ))
        .bind(test_id.to_string())
        .bind(variation_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_comparison).collect()
    }

    async fn variant_counts(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
        product_id: Uuid,
    ) -> DomainResult<VariantCounts> {
        let row: CountsRow = sqlx::query_as(
            "SELECT
               (SELECT COUNT(*) FROM surveys s
                  JOIN tester_sessions ts ON ts.id = s.session_id
                 WHERE s.test_id = ?1 AND ts.variation_type = ?2 AND s.product_id = ?3) AS chosen_times,
               (SELECT COUNT(*) FROM interaction_events e
                  JOIN tester_sessions ts ON ts.id = e.session_id
                 WHERE ts.test_id = ?1 AND ts.variation_type = ?2 AND e.product_id = ?3) AS choice_events,
               (SELECT COUNT(*) FROM interaction_events e
                  JOIN tester_sessions ts ON ts.id = e.session_id
                 WHERE ts.test_id = ?1 AND ts.variation_type = ?2) AS total_clicks",
        )
        .bind(test_id.to_string())
        .bind(variation_type.as_str())
        .bind(product_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(VariantCounts {
            chosen_times: to_count(row.chosen_times),
            choice_events: to_count(row.choice_events),
            total_clicks: to_count(row.total_clicks),
        })
    }

    async fn insert_summary(&self, summary: &TestSummary) -> DomainResult<bool> {
        let result = sqlx::query(
            "INSERT INTO test_summary
             (id, test_id, variant_type, product_id, share_of_buy, share_of_click, value_score, win, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(test_id, variant_type) DO NOTHING",
        )
        .bind(summary.id.to_string())
        .bind(summary.test_id.to_string())
        .bind(summary.variant_type.as_str())
        .bind(summary.product_id.map(|id| id.to_string()))
        .bind(summary.share_of_buy)
        .bind(summary.share_of_click)
        .bind(summary.value_score)
        .bind(summary.win)
        .bind(summary.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_competitive_insight(&self, insight: &CompetitiveInsight) -> DomainResult<bool> {
        let result = sqlx::query(
            "INSERT INTO competitive_insights
             (id, test_id, variant_type, competitor_product_id, share_of_buy,
              value, aesthetics, utility, trust, convenience, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(test_id, variant_type, competitor_product_id) DO NOTHING",
        )
        .bind(insight.id.to_string())
        .bind(insight.test_id.to_string())
        .bind(insight.variant_type.as_str())
        .bind(insight.competitor_product_id.to_string())
        .bind(insight.share_of_buy)
        .bind(insight.value)
        .bind(insight.aesthetics)
        .bind(insight.utility)
        .bind(insight.trust)
        .bind(insight.convenience)
        .bind(insight.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn summary_for_variant(
        &self,
        test_id: Uuid,
        variant_type: VariationType,
    ) -> DomainResult<Option<TestSummary>> {
        let row: Option<SummaryRow> =
            sqlx::query_as("SELECT * FROM test_summary WHERE test_id = ? AND variant_type = ?")
                .bind(test_id.to_string())
                .bind(variant_type.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_summary).transpose()
    }

    async fn summaries_for_test(&self, test_id: Uuid) -> DomainResult<Vec<TestSummary>> {
        let rows: Vec<SummaryRow> =
            sqlx::query_as("SELECT * FROM test_summary WHERE test_id = ? ORDER BY variant_type ASC")
                .bind(test_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_summary).collect()
    }

    async fn competitive_insights_for_test(&self, test_id: Uuid) -> DomainResult<Vec<CompetitiveInsight>> {
        let rows: Vec<CompetitiveRow> = sqlx::query_as(
            "SELECT * FROM competitive_insights
             WHERE test_id = ?
             ORDER BY competitor_product_id ASC, variant_type ASC",
        )
        .bind(test_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_competitive).collect()
    }

    async fn demographics_for_test(&self, test_id: Uuid) -> DomainResult<Option<Demographics>> {
        let row: Option<DemographicsRow> =
            sqlx::query_as("SELECT * FROM test_demographics WHERE test_id = ?")
                .bind(test_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|row| {
            Ok(Demographics {
                test_id: parse_uuid(&row.test_id)?,
                tester_count: u32::try_from(row.tester_count).unwrap_or(0),
                age_ranges: parse_json_or_default(row.age_ranges)?,
                genders: parse_json_or_default(row.genders)?,
                locations: parse_json_or_default(row.locations)?,
                interests: parse_json_or_default(row.interests)?,
            })
        })
        .transpose()
    }
}
