//! Shared fixtures for integration tests.
//!
//! Record-store seeding goes through the public repositories where one
//! exists; tester sessions and raw responses are written with plain SQL
//! because nothing in the crate writes them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use panelsync::adapters::sqlite::{
    create_migrated_test_pool, SqliteInsightsRepository, SqliteTestRepository,
    SqliteVariationCheckQueue, SqliteVariationRepository,
};
use panelsync::domain::errors::{DomainError, DomainResult};
use panelsync::domain::models::{
    AbTest, ProviderStudyStatus, StudyRecord, TestStatus, Variation, VariationType,
};
use panelsync::domain::ports::{NotificationSink, StudyProvider, TestRepository, VariationRepository};
use panelsync::services::{CompletionReconciler, InsightsAggregator, ReconcilerConfig};

/// Setup test logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Repositories over one fresh in-memory database.
pub struct TestDb {
    pub pool: SqlitePool,
    pub tests: Arc<SqliteTestRepository>,
    pub variations: Arc<SqliteVariationRepository>,
    pub insights: Arc<SqliteInsightsRepository>,
    pub queue: Arc<SqliteVariationCheckQueue>,
}

impl TestDb {
    pub async fn new() -> Self {
        let pool = create_migrated_test_pool()
            .await
            .expect("failed to create test database");
        Self {
            tests: Arc::new(SqliteTestRepository::new(pool.clone())),
            variations: Arc::new(SqliteVariationRepository::new(pool.clone())),
            insights: Arc::new(SqliteInsightsRepository::new(pool.clone())),
            queue: Arc::new(SqliteVariationCheckQueue::new(pool.clone())),
            pool,
        }
    }

    pub fn aggregator(&self) -> Arc<InsightsAggregator> {
        Arc::new(InsightsAggregator::new(
            self.tests.clone(),
            self.variations.clone(),
            self.insights.clone(),
        ))
    }

    pub fn reconciler(
        &self,
        provider: Arc<ScriptedProvider>,
        notifier: Arc<RecordingNotifier>,
        config: ReconcilerConfig,
    ) -> CompletionReconciler {
        CompletionReconciler::new(
            self.tests.clone(),
            self.variations.clone(),
            provider,
            notifier,
            config,
        )
    }

    /// Active test with one dispatched variation per given type.
    /// Study ids are `study-<type>`, each variation gets its own product.
    pub async fn seed_active_test(&self, name: &str, types: &[VariationType]) -> AbTest {
        let test = AbTest::new(name).with_status(TestStatus::Active);
        self.tests.create(&test).await.expect("create test");
        for &variation_type in types {
            let variation = Variation::new(test.id, variation_type)
                .with_product(Uuid::new_v4())
                .dispatched(study_id(variation_type));
            self.variations.upsert(&variation).await.expect("upsert variation");
        }
        test
    }

    pub async fn variation(&self, test_id: Uuid, variation_type: VariationType) -> Variation {
        self.variations
            .get(test_id, variation_type)
            .await
            .expect("get variation")
            .expect("variation exists")
    }

    pub async fn test_status(&self, test_id: Uuid) -> TestStatus {
        self.tests
            .get(test_id)
            .await
            .expect("get test")
            .expect("test exists")
            .status
    }

    pub async fn insert_session(&self, test_id: Uuid, variation_type: VariationType) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO tester_sessions (id, test_id, variation_type, prolific_pid, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.to_string())
        .bind(test_id.to_string())
        .bind(variation_type.as_str())
        .bind(format!("pid-{}", &id.simple().to_string()[..8]))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .expect("insert session");
        id
    }

    pub async fn insert_clicks(&self, session_id: Uuid, product_id: Uuid, count: usize) {
        for _ in 0..count {
            sqlx::query(
                "INSERT INTO interaction_events (id, session_id, product_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(session_id.to_string())
            .bind(product_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .expect("insert click");
        }
    }

    /// Survey with every sub-score set to `score`.
    pub async fn insert_survey(&self, session_id: Uuid, test_id: Uuid, product_id: Uuid, score: f64) {
        sqlx::query(
            "INSERT INTO surveys
             (id, session_id, test_id, product_id, appearance, confidence, value, convenience, brand, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5, ?5, ?5, ?6)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id.to_string())
        .bind(test_id.to_string())
        .bind(product_id.to_string())
        .bind(score)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .expect("insert survey");
    }

    /// Comparison with scores in the order value, aesthetics, utility, trust, convenience.
    pub async fn insert_comparison(
        &self,
        session_id: Uuid,
        test_id: Uuid,
        competitor: Uuid,
        scores: [f64; 5],
    ) {
        sqlx::query(
            "INSERT INTO comparisons
             (id, session_id, test_id, competitor_product_id, value, aesthetics, utility, trust, convenience, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id.to_string())
        .bind(test_id.to_string())
        .bind(competitor.to_string())
        .bind(scores[0])
        .bind(scores[1])
        .bind(scores[2])
        .bind(scores[3])
        .bind(scores[4])
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .expect("insert comparison");
    }

    pub async fn insert_demographics(&self, test_id: Uuid, tester_count: u32) {
        sqlx::query(
            "INSERT INTO test_demographics (test_id, tester_count, age_ranges, genders, locations, interests)
             VALUES (?1, ?2, '[\"18-24\",\"25-34\"]', '[\"female\",\"male\"]', '[\"US\"]', '[]')",
        )
        .bind(test_id.to_string())
        .bind(i64::from(tester_count))
        .execute(&self.pool)
        .await
        .expect("insert demographics");
    }
}

pub fn study_id(variation_type: VariationType) -> String {
    format!("study-{variation_type}")
}

/// Provider double answering from a script keyed by study id.
/// Unscripted studies fail like a 404.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<HashMap<String, Result<ProviderStudyStatus, String>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, study_id: &str, status: ProviderStudyStatus) {
        self.responses
            .lock()
            .unwrap()
            .insert(study_id.to_string(), Ok(status));
    }

    pub fn set_failing(&self, study_id: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(study_id.to_string(), Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StudyProvider for ScriptedProvider {
    async fn get_study(&self, study_id: &str) -> DomainResult<StudyRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.responses.lock().unwrap().get(study_id).cloned();
        match scripted {
            Some(Ok(status)) => Ok(StudyRecord::new(study_id, status)),
            Some(Err(message)) => Err(DomainError::ProviderRequestFailed {
                study_id: study_id.to_string(),
                message,
            }),
            None => Err(DomainError::ProviderRequestFailed {
                study_id: study_id.to_string(),
                message: "provider returned 404 Not Found".to_string(),
            }),
        }
    }
}

/// Notification double that records every reminder.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Uuid)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, Uuid)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send_completion_reminder(&self, study_id: &str, test_id: Uuid) -> DomainResult<()> {
        self.sent.lock().unwrap().push((study_id.to_string(), test_id));
        Ok(())
    }
}
