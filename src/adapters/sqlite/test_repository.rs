//! SQLite adapter for TestRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AbTest, TestStatus};
use crate::domain::ports::test_repository::{TestFilter, TestRepository};

#[derive(Clone)]
pub struct SqliteTestRepository {
    pool: SqlitePool,
}

impl SqliteTestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TestRow {
    id: String,
    name: String,
    objective: Option<String>,
    status: String,
    search_term: Option<String>,
    block: bool,
    created_at: String,
    updated_at: String,
}

fn row_to_test(row: TestRow) -> DomainResult<AbTest> {
    let status = TestStatus::from_str(&row.status).ok_or_else(|| {
        DomainError::SerializationError(format!("unknown test status: {}", row.status))
    })?;

    Ok(AbTest {
        id: parse_uuid(&row.id)?,
        name: row.name,
        objective: row.objective,
        status,
        search_term: row.search_term,
        block: row.block,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl TestRepository for SqliteTestRepository {
    async fn create(&self, test: &AbTest) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO tests (id, name, objective, status, search_term, block, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(test.id.to_string())
        .bind(&test.name)
        .bind(&test.objective)
        .bind(test.status.as_str())
        .bind(&test.search_term)
        .bind(test.block)
        .bind(test.created_at.to_rfc3339())
        .bind(test.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AbTest>> {
        let row: Option<TestRow> = sqlx::query_as("SELECT * FROM tests WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_test).transpose()
    }

    async fn list(&self, filter: TestFilter) -> DomainResult<Vec<AbTest>> {
        let rows: Vec<TestRow> = sqlx::query_as(
            "SELECT * FROM tests
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 = 0 OR block = 0)
             ORDER BY created_at ASC",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.exclude_blocked)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_test).collect()
    }

    async fn update_status(&self, id: Uuid, status: TestStatus) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE tests SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status != ?2",
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_blocked(&self, id: Uuid, blocked: bool) -> DomainResult<()> {
        let result = sqlx::query("UPDATE tests SET block = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(blocked)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TestNotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_test_repo() -> SqliteTestRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTestRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_test() {
        let repo = setup_test_repo().await;
        let test = AbTest::new("Oat milk packaging")
            .with_status(TestStatus::Active)
            .with_search_term("oat milk");

        repo.create(&test).await.unwrap();

        let retrieved = repo.get(test.id).await.unwrap().unwrap();
        assert_eq!(retrieved.name, "Oat milk packaging");
        assert_eq!(retrieved.status, TestStatus::Active);
        assert_eq!(retrieved.search_term.as_deref(), Some("oat milk"));
        assert!(!retrieved.block);
    }

    #[tokio::test]
    async fn test_list_active_filters_status() {
        let repo = setup_test_repo().await;
        let active = AbTest::new("Active").with_status(TestStatus::Active);
        let draft = AbTest::new("Draft");
        let blocked = AbTest::new("Blocked").with_status(TestStatus::Active).blocked();
        for t in [&active, &draft, &blocked] {
            repo.create(t).await.unwrap();
        }

        let listed = repo.list_active().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|t| t.status == TestStatus::Active));

        let unblocked = repo
            .list(TestFilter {
                status: Some(TestStatus::Active),
                exclude_blocked: true,
            })
            .await
            .unwrap();
        assert_eq!(unblocked.len(), 1);
        assert_eq!(unblocked[0].id, active.id);
    }

    #[tokio::test]
    async fn test_update_status_reports_change_once() {
        let repo = setup_test_repo().await;
        let test = AbTest::new("T").with_status(TestStatus::Active);
        repo.create(&test).await.unwrap();

        assert!(repo.update_status(test.id, TestStatus::Complete).await.unwrap());
        assert!(!repo.update_status(test.id, TestStatus::Complete).await.unwrap());
        assert_eq!(repo.get(test.id).await.unwrap().unwrap().status, TestStatus::Complete);
    }

    #[tokio::test]
    async fn test_set_blocked_missing_test() {
        let repo = setup_test_repo().await;
        let err = repo.set_blocked(Uuid::new_v4(), true).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
