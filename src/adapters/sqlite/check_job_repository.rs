//! SQLite adapter for the variation-check work queue.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid, parse_variation_type};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CheckJobStatus, VariationCheckJob};
use crate::domain::ports::check_queue::VariationCheckQueue;

#[derive(Clone)]
pub struct SqliteVariationCheckQueue {
    pool: SqlitePool,
}

impl SqliteVariationCheckQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a job by id regardless of its status.
    pub async fn get(&self, id: Uuid) -> DomainResult<Option<VariationCheckJob>> {
        let row: Option<CheckJobRow> = sqlx::query_as("SELECT * FROM variation_check_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_job).transpose()
    }
}

/// RFC3339 timestamp `age` before now, comparable with stored `updated_at` values.
fn cutoff(age: Duration) -> DomainResult<String> {
    let age = chrono::Duration::from_std(age)
        .map_err(|e| DomainError::ValidationFailed(format!("invalid queue age: {e}")))?;
    Utc::now()
        .checked_sub_signed(age)
        .map(|t| t.to_rfc3339())
        .ok_or_else(|| DomainError::ValidationFailed("queue age out of range".to_string()))
}

#[derive(sqlx::FromRow)]
struct CheckJobRow {
    id: String,
    study_id: String,
    test_id: String,
    variation_type: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

fn row_to_job(row: CheckJobRow) -> DomainResult<VariationCheckJob> {
    let status = CheckJobStatus::from_str(&row.status).ok_or_else(|| {
        DomainError::SerializationError(format!("unknown check job status: {}", row.status))
    })?;

    Ok(VariationCheckJob {
        id: parse_uuid(&row.id)?,
        study_id: row.study_id,
        test_id: parse_uuid(&row.test_id)?,
        variation_type: parse_variation_type(&row.variation_type)?,
        status,
        attempts: u32::try_from(row.attempts).unwrap_or(u32::MAX),
        last_error: row.last_error,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl VariationCheckQueue for SqliteVariationCheckQueue {
    async fn enqueue(&self, job: &VariationCheckJob) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO variation_check_jobs
             (id, study_id, test_id, variation_type, status, attempts, last_error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(job.id.to_string())
        .bind(&job.study_id)
        .bind(job.test_id.to_string())
        .bind(job.variation_type.as_str())
        .bind(job.status.as_str())
        .bind(i64::from(job.attempts))
        .bind(&job.last_error)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Claim inside a transaction and only return the job if our UPDATE actually
    /// moved it from pending to running.
    async fn claim_next(&self) -> DomainResult<Option<VariationCheckJob>> {
        let mut tx = self.pool.begin().await?;

        let next: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM variation_check_jobs
             WHERE status = 'pending'
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((job_id,)) = next else {
            debug!("No pending variation checks to claim");
            tx.rollback().await?;
            return Ok(None);
        };

        let claimed = sqlx::query(
            "UPDATE variation_check_jobs
             SET status = 'running', attempts = attempts + 1, updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(&job_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            warn!(job_id = %job_id, "Variation check was claimed by another worker");
            tx.rollback().await?;
            return Ok(None);
        }

        let row: CheckJobRow = sqlx::query_as("SELECT * FROM variation_check_jobs WHERE id = ?")
            .bind(&job_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        row_to_job(row).map(Some)
    }

    async fn complete(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM variation_check_jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str) -> DomainResult<()> {
        sqlx::query(
            "UPDATE variation_check_jobs SET status = 'failed', last_error = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_count(&self) -> DomainResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM variation_check_jobs WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn reclaim_stale(&self, lease: Duration) -> DomainResult<u64> {
        let result = sqlx::query(
            "UPDATE variation_check_jobs
             SET status = 'pending', updated_at = ?2
             WHERE status = 'running' AND updated_at < ?1",
        )
        .bind(cutoff(lease)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let reclaimed = result.rows_affected();
        if reclaimed > 0 {
            warn!(reclaimed, lease_secs = lease.as_secs(), "Reclaimed variation checks past their lease");
        }
        Ok(reclaimed)
    }

    async fn prune_failed(&self, retention: Duration) -> DomainResult<u64> {
        let result = sqlx::query(
            "DELETE FROM variation_check_jobs WHERE status = 'failed' AND updated_at < ?",
        )
        .bind(cutoff(retention)?)
        .execute(&self.pool)
        .await?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            info!(pruned, "Pruned failed variation checks");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::VariationType;

    async fn setup_queue() -> SqliteVariationCheckQueue {
        SqliteVariationCheckQueue::new(create_migrated_test_pool().await.unwrap())
    }

    async fn backdate(queue: &SqliteVariationCheckQueue, id: Uuid, age: chrono::Duration) {
        sqlx::query("UPDATE variation_check_jobs SET updated_at = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind((Utc::now() - age).to_rfc3339())
            .execute(&queue.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_claim_oldest_first_and_only_once() {
        let queue = setup_queue().await;
        let test_id = Uuid::new_v4();
        let mut first = VariationCheckJob::new("study-a", test_id, VariationType::A);
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        let second = VariationCheckJob::new("study-b", test_id, VariationType::B);
        queue.enqueue(&second).await.unwrap();
        queue.enqueue(&first).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 2);

        let claimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, CheckJobStatus::Running);
        assert_eq!(claimed.attempts, 1);

        let next = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(next.id, second.id);
        assert!(queue.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_removes_and_fail_parks_job() {
        let queue = setup_queue().await;
        let done = VariationCheckJob::new("study-a", Uuid::new_v4(), VariationType::A);
        let broken = VariationCheckJob::new("study-b", Uuid::new_v4(), VariationType::B);
        queue.enqueue(&done).await.unwrap();
        queue.enqueue(&broken).await.unwrap();

        queue.complete(done.id).await.unwrap();
        assert!(queue.get(done.id).await.unwrap().is_none());

        queue.fail(broken.id, "provider timeout").await.unwrap();
        let parked = queue.get(broken.id).await.unwrap().unwrap();
        assert_eq!(parked.status, CheckJobStatus::Failed);
        assert_eq!(parked.last_error.as_deref(), Some("provider timeout"));
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        assert!(queue.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_claim_is_handed_out_again_after_lease() {
        let queue = setup_queue().await;
        let job = VariationCheckJob::new("study-a", Uuid::new_v4(), VariationType::A);
        queue.enqueue(&job).await.unwrap();

        // Claimed, then the worker goes away without complete or fail.
        queue.claim_next().await.unwrap().unwrap();
        assert!(queue.claim_next().await.unwrap().is_none());

        let lease = Duration::from_secs(600);
        assert_eq!(queue.reclaim_stale(lease).await.unwrap(), 0);

        backdate(&queue, job.id, chrono::Duration::minutes(11)).await;
        assert_eq!(queue.reclaim_stale(lease).await.unwrap(), 1);
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        let reclaimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(reclaimed.id, job.id);
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn test_prune_removes_only_old_failed_jobs() {
        let queue = setup_queue().await;
        let old = VariationCheckJob::new("study-a", Uuid::new_v4(), VariationType::A);
        let recent = VariationCheckJob::new("study-b", Uuid::new_v4(), VariationType::B);
        let waiting = VariationCheckJob::new("study-c", Uuid::new_v4(), VariationType::C);
        for job in [&old, &recent, &waiting] {
            queue.enqueue(job).await.unwrap();
        }
        queue.fail(old.id, "404").await.unwrap();
        queue.fail(recent.id, "404").await.unwrap();
        backdate(&queue, old.id, chrono::Duration::days(8)).await;
        backdate(&queue, waiting.id, chrono::Duration::days(8)).await;

        let retention = Duration::from_secs(7 * 86_400);
        assert_eq!(queue.prune_failed(retention).await.unwrap(), 1);

        assert!(queue.get(old.id).await.unwrap().is_none());
        assert!(queue.get(recent.id).await.unwrap().is_some());
        assert!(queue.get(waiting.id).await.unwrap().is_some());
    }
}
