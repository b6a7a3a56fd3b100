//! SQLite adapter for VariationRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_uuid, parse_uuid, parse_variation_type};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Variation, VariationStatus, VariationType};
use crate::domain::ports::variation_repository::VariationRepository;

/// Rank of a stored status column; NULL ranks as pending.
macro_rules! status_rank {
    ($column:literal) => {
        concat!(
            "(CASE COALESCE(", $column, ", 'pending') ",
            "WHEN 'pending' THEN 0 WHEN 'active' THEN 1 ",
            "WHEN 'needs_review' THEN 2 WHEN 'complete' THEN 3 ELSE 0 END)"
        )
    };
}

#[derive(Clone)]
pub struct SqliteVariationRepository {
    pool: SqlitePool,
}

impl SqliteVariationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct VariationRow {
    id: String,
    test_id: String,
    product_id: Option<String>,
    variation_type: String,
    external_study_id: Option<String>,
    prolific_status: Option<String>,
    created_at: String,
    updated_at: String,
}

fn row_to_variation(row: VariationRow) -> DomainResult<Variation> {
    let prolific_status = row
        .prolific_status
        .map(|s| {
            VariationStatus::from_str(&s).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown variation status: {s}"))
            })
        })
        .transpose()?;

    Ok(Variation {
        id: parse_uuid(&row.id)?,
        test_id: parse_uuid(&row.test_id)?,
        product_id: parse_optional_uuid(row.product_id)?,
        variation_type: parse_variation_type(&row.variation_type)?,
        external_study_id: row.external_study_id,
        prolific_status,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl VariationRepository for SqliteVariationRepository {
    async fn upsert(&self, variation: &Variation) -> DomainResult<()> {
        // The status column keeps whichever of the stored and incoming values ranks higher.
        sqlx::query(concat!(
            "INSERT INTO variations
             (id, test_id, product_id, variation_type, external_study_id, prolific_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(test_id, variation_type) DO UPDATE SET
               product_id = excluded.product_id,
               external_study_id = COALESCE(excluded.external_study_id, variations.external_study_id),
               prolific_status = CASE WHEN ",
            status_rank!("excluded.prolific_status"),
            " > ",
            status_rank!("variations.prolific_status"),
            " THEN excluded.prolific_status ELSE variations.prolific_status END,
               updated_at = excluded.updated_at"
        ))
        .bind(variation.id.to_string())
        .bind(variation.test_id.to_string())
        .bind(variation.product_id.map(|id| id.to_string()))
        .bind(variation.variation_type.as_str())
        .bind(&variation.external_study_id)
        .bind(variation.prolific_status.map(|s| s.as_str()))
        .bind(variation.created_at.to_rfc3339())
        .bind(variation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, test_id: Uuid, variation_type: VariationType) -> DomainResult<Option<Variation>> {
        let row: Option<VariationRow> =
            sqlx::query_as("SELECT * FROM variations WHERE test_id = ?1 AND variation_type = ?2")
                .bind(test_id.to_string())
                .bind(variation_type.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_variation).transpose()
    }

    async fn list_for_test(&self, test_id: Uuid) -> DomainResult<Vec<Variation>> {
        let rows: Vec<VariationRow> =
            sqlx::query_as("SELECT * FROM variations WHERE test_id = ? ORDER BY variation_type ASC")
                .bind(test_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_variation).collect()
    }

    async fn advance_status(
        &self,
        test_id: Uuid,
        variation_type: VariationType,
        status: VariationStatus,
    ) -> DomainResult<bool> {
        let result = sqlx::query(concat!(
            "UPDATE variations SET prolific_status = ?3, updated_at = ?4
             WHERE test_id = ?1 AND variation_type = ?2 AND ",
            status_rank!("prolific_status"),
            " < ?5"
        ))
        .bind(test_id.to_string())
        .bind(variation_type.as_str())
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(i64::from(status.rank()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteTestRepository};
    use crate::domain::models::{AbTest, TestStatus};
    use crate::domain::ports::TestRepository;

    async fn setup() -> (SqliteVariationRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let test = AbTest::new("Granola").with_status(TestStatus::Active);
        SqliteTestRepository::new(pool.clone()).create(&test).await.unwrap();
        (SqliteVariationRepository::new(pool), test.id)
    }

    #[tokio::test]
    async fn test_upsert_and_list_ordered_by_type() {
        let (repo, test_id) = setup().await;
        repo.upsert(&Variation::new(test_id, VariationType::B).dispatched("study-b"))
            .await
            .unwrap();
        repo.upsert(&Variation::new(test_id, VariationType::A).dispatched("study-a"))
            .await
            .unwrap();

        let listed = repo.list_for_test(test_id).await.unwrap();
        let types: Vec<_> = listed.iter().map(|v| v.variation_type).collect();
        assert_eq!(types, vec![VariationType::A, VariationType::B]);
        assert_eq!(listed[0].external_study_id.as_deref(), Some("study-a"));
        assert_eq!(listed[0].status(), VariationStatus::Active);
    }

    #[tokio::test]
    async fn test_advance_status_is_monotonic() {
        let (repo, test_id) = setup().await;
        repo.upsert(&Variation::new(test_id, VariationType::A).dispatched("study-a"))
            .await
            .unwrap();

        assert!(repo
            .advance_status(test_id, VariationType::A, VariationStatus::Complete)
            .await
            .unwrap());
        // Second identical observation writes nothing.
        assert!(!repo
            .advance_status(test_id, VariationType::A, VariationStatus::Complete)
            .await
            .unwrap());
        // A stale, lower observation writes nothing either.
        assert!(!repo
            .advance_status(test_id, VariationType::A, VariationStatus::Active)
            .await
            .unwrap());

        let stored = repo.get(test_id, VariationType::A).await.unwrap().unwrap();
        assert_eq!(stored.status(), VariationStatus::Complete);
    }

    #[tokio::test]
    async fn test_advance_from_null_status() {
        let (repo, test_id) = setup().await;
        repo.upsert(&Variation::new(test_id, VariationType::C)).await.unwrap();

        assert!(repo
            .advance_status(test_id, VariationType::C, VariationStatus::Active)
            .await
            .unwrap());
        let stored = repo.get(test_id, VariationType::C).await.unwrap().unwrap();
        assert_eq!(stored.prolific_status, Some(VariationStatus::Active));
    }

    #[tokio::test]
    async fn test_upsert_never_lowers_status() {
        let (repo, test_id) = setup().await;
        let completed = Variation::new(test_id, VariationType::A)
            .dispatched("study-a")
            .with_status(VariationStatus::Complete);
        repo.upsert(&completed).await.unwrap();
        let stale = Variation::new(test_id, VariationType::A).dispatched("study-a");
        repo.upsert(&stale).await.unwrap();

        let stored = repo.get(test_id, VariationType::A).await.unwrap().unwrap();
        assert_eq!(stored.status(), VariationStatus::Complete);
        assert_eq!(repo.list_for_test(test_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advance_missing_variation_changes_nothing() {
        let (repo, test_id) = setup().await;
        assert!(!repo
            .advance_status(test_id, VariationType::B, VariationStatus::Complete)
            .await
            .unwrap());
    }
}
