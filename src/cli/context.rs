//! Wiring of adapters and services for CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::notify::sink_from_config;
use crate::adapters::prolific::ProlificClient;
use crate::adapters::sqlite::{
    initialize_from_config, SqliteInsightsRepository, SqliteTestRepository,
    SqliteVariationCheckQueue, SqliteVariationRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::VariationCheckQueue;
use crate::services::{
    CompletionReconciler, InsightsAggregator, ReconcilerConfig, VariationCheckWorker, WorkerConfig,
};

/// Repositories over one open database.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub tests: Arc<SqliteTestRepository>,
    pub variations: Arc<SqliteVariationRepository>,
    pub insights: Arc<SqliteInsightsRepository>,
    pub queue: Arc<SqliteVariationCheckQueue>,
}

impl AppContext {
    /// Open (and migrate) the configured database.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_from_config(&config.database)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database at {}. Run 'panelsync init' first.",
                    config.database.path
                )
            })?;

        Ok(Self {
            tests: Arc::new(SqliteTestRepository::new(pool.clone())),
            variations: Arc::new(SqliteVariationRepository::new(pool.clone())),
            insights: Arc::new(SqliteInsightsRepository::new(pool.clone())),
            queue: Arc::new(SqliteVariationCheckQueue::new(pool.clone())),
            pool,
            config,
        })
    }

    pub fn aggregator(&self) -> Arc<InsightsAggregator> {
        Arc::new(InsightsAggregator::new(
            self.tests.clone(),
            self.variations.clone(),
            self.insights.clone(),
        ))
    }

    /// Build the reconciler. Needs provider credentials.
    pub fn reconciler(&self) -> Result<Arc<CompletionReconciler>> {
        let provider = ProlificClient::from_config(&self.config.provider)
            .context("Failed to configure study provider client")?;
        let notifier = sink_from_config(&self.config.notifications)
            .context("Failed to configure notification sink")?;

        Ok(Arc::new(
            CompletionReconciler::new(
                self.tests.clone(),
                self.variations.clone(),
                Arc::new(provider),
                notifier,
                ReconcilerConfig::from_config(&self.config),
            )
            .with_insights(self.aggregator()),
        ))
    }

    pub fn worker(&self, reconciler: Arc<CompletionReconciler>) -> VariationCheckWorker {
        VariationCheckWorker::new(
            self.queue.clone(),
            reconciler,
            WorkerConfig::from(&self.config.reconcile),
        )
    }

    pub async fn queue_pending(&self) -> Result<u64> {
        self.queue
            .pending_count()
            .await
            .context("Failed to count pending variation checks")
    }
}
