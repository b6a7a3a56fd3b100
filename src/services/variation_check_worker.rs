//! On-demand variation checks.
//!
//! One queue job is created per variation dispatch (when enabled). The worker
//! claims jobs and runs the single-variation reconciliation for each. A job
//! is never put back on the queue: a study that is not complete yet gets a
//! reminder and the job is removed, leaving later coverage to the sweep.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ReconcileConfig, VariationCheckJob, VariationCheckOutcome, VariationType};
use crate::domain::ports::VariationCheckQueue;
use crate::services::completion_reconciler::CompletionReconciler;
use crate::services::sweep_daemon::StopSignal;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    /// When false, `enqueue_check` does nothing and only the sweep runs.
    pub enqueue_on_dispatch: bool,
    /// Running jobs older than this are assumed abandoned and re-queued.
    pub claim_lease: Duration,
    /// Failed jobs are kept this long for inspection.
    pub failed_retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            enqueue_on_dispatch: false,
            claim_lease: Duration::from_secs(600),
            failed_retention: Duration::from_secs(7 * 86_400),
        }
    }
}

impl From<&ReconcileConfig> for WorkerConfig {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            poll_interval: config.worker_poll_interval(),
            enqueue_on_dispatch: config.enqueue_on_dispatch,
            claim_lease: config.claim_lease(),
            failed_retention: config.failed_job_retention(),
        }
    }
}

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobResult {
    /// Job ran and was removed from the queue.
    Done {
        job_id: Uuid,
        outcome: VariationCheckOutcome,
    },
    /// Job errored and was parked as failed.
    Failed { job_id: Uuid, error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    pub processed: usize,
    pub failed: usize,
}

/// Result of one queue housekeeping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueMaintenance {
    pub reclaimed: u64,
    pub pruned: u64,
}

pub struct VariationCheckWorker {
    queue: Arc<dyn VariationCheckQueue>,
    reconciler: Arc<CompletionReconciler>,
    config: WorkerConfig,
}

impl VariationCheckWorker {
    pub fn new(
        queue: Arc<dyn VariationCheckQueue>,
        reconciler: Arc<CompletionReconciler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            reconciler,
            config,
        }
    }

    /// Queue a check for a freshly dispatched variation.
    ///
    /// Returns the job id, or `None` when on-demand checks are disabled.
    pub async fn enqueue_check(
        &self,
        study_id: &str,
        test_id: Uuid,
        variation_type: VariationType,
    ) -> DomainResult<Option<Uuid>> {
        if !self.config.enqueue_on_dispatch {
            debug!(study_id, test_id = %test_id, "On-demand checks disabled; relying on sweep");
            return Ok(None);
        }
        self.enqueue_unconditionally(study_id, test_id, variation_type)
            .await
            .map(Some)
    }

    /// Queue a check regardless of `enqueue_on_dispatch`.
    pub async fn enqueue_unconditionally(
        &self,
        study_id: &str,
        test_id: Uuid,
        variation_type: VariationType,
    ) -> DomainResult<Uuid> {
        let job = VariationCheckJob::new(study_id, test_id, variation_type);
        self.queue.enqueue(&job).await?;
        info!(job_id = %job.id, study_id, test_id = %test_id, %variation_type, "Variation check queued");
        Ok(job.id)
    }

    async fn run_job(&self, job: &VariationCheckJob) -> DomainResult<JobResult> {
        let result = self
            .reconciler
            .reconcile_one_variation(&job.study_id, job.test_id, job.variation_type)
            .await;

        match result {
            Ok(outcome) => {
                self.queue.complete(job.id).await?;
                debug!(job_id = %job.id, ?outcome, "Variation check done");
                Ok(JobResult::Done {
                    job_id: job.id,
                    outcome,
                })
            }
            Err(e) => {
                warn!(job_id = %job.id, study_id = %job.study_id, error = %e, "Variation check failed");
                let error = e.to_string();
                self.queue.fail(job.id, &error).await?;
                Ok(JobResult::Failed {
                    job_id: job.id,
                    error,
                })
            }
        }
    }

    /// Claim and run one job. `None` when the queue is empty.
    pub async fn process_next(&self) -> DomainResult<Option<JobResult>> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(None);
        };
        self.run_job(&job).await.map(Some)
    }

    /// Re-queue abandoned claims and drop expired failed jobs.
    pub async fn maintain(&self) -> DomainResult<QueueMaintenance> {
        Ok(QueueMaintenance {
            reclaimed: self.queue.reclaim_stale(self.config.claim_lease).await?,
            pruned: self.queue.prune_failed(self.config.failed_retention).await?,
        })
    }

    /// Run jobs until the queue has nothing pending.
    pub async fn drain(&self) -> DomainResult<DrainReport> {
        let mut report = DrainReport::default();
        while let Some(result) = self.process_next().await? {
            report.processed += 1;
            if matches!(result, JobResult::Failed { .. }) {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    /// Poll the queue until `stop` fires. Queue errors are logged and the
    /// loop waits for the next poll.
    pub async fn run(&self, stop: StopSignal) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Variation check worker started"
        );
        while !stop.is_stopped() {
            if let Err(e) = self.maintain().await {
                warn!(error = %e, "Variation check queue maintenance failed");
            }
            match self.drain().await {
                Ok(report) if report.processed > 0 => {
                    info!(processed = report.processed, failed = report.failed, "Variation checks drained");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Variation check queue unavailable"),
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                () = stop.stopped() => break,
            }
        }
        info!("Variation check worker stopped");
    }
}
