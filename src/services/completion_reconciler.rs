//! Completion reconciliation.
//!
//! Brings local variation and test status in line with the state of the
//! external studies that back each variation. Both entry points (the
//! periodic sweep and the on-demand single-variation check) go through this
//! service so they share one set of semantics:
//!
//! - only an external `COMPLETED` observation writes local state
//! - variation status only ever moves up the rank order
//! - test completion is always re-derived from stored variation state
//! - a failure for one variation or one test never stops the others

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    all_dispatched_complete, AbTest, Config, FinalizeOutcome, InsightsGeneration,
    ReconcileOutcome, SkipReason, StudyRecord, SweepReport, TestStatus, VariationCheckOutcome,
    VariationFailure, VariationStatus, VariationType,
};
use crate::domain::ports::{NotificationSink, StudyProvider, TestRepository, VariationRepository};
use crate::services::insights_aggregator::InsightsAggregator;
use crate::services::test_locks::TestLocks;

/// Configuration for the completion reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Upper bound on a single provider call.
    pub provider_timeout: Duration,
    /// How many tests a sweep reconciles at once.
    pub max_concurrent_tests: usize,
    /// Run the insights aggregator when a test finalizes.
    pub generate_insights_on_complete: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            max_concurrent_tests: 4,
            generate_insights_on_complete: true,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider_timeout: config.provider.request_timeout(),
            max_concurrent_tests: config.reconcile.max_concurrent_tests.max(1),
            generate_insights_on_complete: config.reconcile.generate_insights_on_complete,
        }
    }
}

pub struct CompletionReconciler {
    tests: Arc<dyn TestRepository>,
    variations: Arc<dyn VariationRepository>,
    provider: Arc<dyn StudyProvider>,
    notifier: Arc<dyn NotificationSink>,
    insights: Option<Arc<InsightsAggregator>>,
    locks: Arc<TestLocks>,
    config: ReconcilerConfig,
}

impl CompletionReconciler {
    pub fn new(
        tests: Arc<dyn TestRepository>,
        variations: Arc<dyn VariationRepository>,
        provider: Arc<dyn StudyProvider>,
        notifier: Arc<dyn NotificationSink>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            tests,
            variations,
            provider,
            notifier,
            insights: None,
            locks: Arc::new(TestLocks::new()),
            config,
        }
    }

    /// Attach the aggregator run after a test finalizes.
    pub fn with_insights(mut self, insights: Arc<InsightsAggregator>) -> Self {
        self.insights = Some(insights);
        self
    }

    /// Share a lock registry with another reconciler instance.
    pub fn with_locks(mut self, locks: Arc<TestLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    async fn load_test(&self, test_id: Uuid) -> DomainResult<AbTest> {
        self.tests
            .get(test_id)
            .await?
            .ok_or(DomainError::TestNotFound(test_id))
    }

    /// The block flag can be set while a sweep is running, so it is re-read
    /// from the store right before every write.
    async fn is_blocked(&self, test_id: Uuid) -> DomainResult<bool> {
        Ok(self.load_test(test_id).await?.block)
    }

    /// The rate-limit wait runs before the deadline starts.
    async fn fetch_study(&self, study_id: &str) -> DomainResult<StudyRecord> {
        self.provider.ready().await;
        match tokio::time::timeout(self.config.provider_timeout, self.provider.get_study(study_id))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DomainError::ProviderTimeout {
                study_id: study_id.to_string(),
                timeout: self.config.provider_timeout,
            }),
        }
    }

    async fn send_reminder(&self, study_id: &str, test_id: Uuid) -> bool {
        match self.notifier.send_completion_reminder(study_id, test_id).await {
            Ok(()) => {
                info!(study_id, test_id = %test_id, "Completion reminder sent");
                true
            }
            Err(e) => {
                warn!(study_id, test_id = %test_id, error = %e, "Completion reminder failed");
                false
            }
        }
    }

    /// Generate insights when `finalization` completed the test.
    /// Returns the generation or the error text; both `None` when nothing ran.
    async fn insights_after(
        &self,
        test_id: Uuid,
        finalization: FinalizeOutcome,
    ) -> (Option<InsightsGeneration>, Option<String>) {
        if !finalization.completed || !self.config.generate_insights_on_complete {
            return (None, None);
        }
        let Some(aggregator) = self.insights.as_ref() else {
            return (None, None);
        };
        match aggregator.generate_for_test(test_id).await {
            Ok(generation) => (Some(generation), None),
            Err(e) => {
                error!(test_id = %test_id, error = %e, "Insights generation failed");
                (None, Some(e.to_string()))
            }
        }
    }

    /// Re-derive test completion from stored variation state.
    ///
    /// Writes `complete` only when every dispatched variation is complete and
    /// the stored status is not already `complete`. Calling it again after
    /// that returns `completed: false` and writes nothing.
    #[instrument(skip(self))]
    pub async fn finalize_if_complete(&self, test_id: Uuid) -> DomainResult<FinalizeOutcome> {
        let _guard = self.locks.lock(test_id).await;

        let test = self.load_test(test_id).await?;
        if test.block {
            info!(test_id = %test_id, "Test is blocked; not finalizing");
            return Ok(FinalizeOutcome::unchanged(test.status));
        }
        if test.status == TestStatus::Complete {
            return Ok(FinalizeOutcome::unchanged(test.status));
        }

        let variations = self.variations.list_for_test(test_id).await?;
        if !all_dispatched_complete(&variations) {
            debug!(test_id = %test_id, "Not every dispatched variation is complete");
            return Ok(FinalizeOutcome::unchanged(test.status));
        }

        if self.tests.update_status(test_id, TestStatus::Complete).await? {
            info!(test_id = %test_id, "Test finalized as complete");
            Ok(FinalizeOutcome::completed())
        } else {
            Ok(FinalizeOutcome::unchanged(TestStatus::Complete))
        }
    }

    /// Reconcile every pollable variation of one test.
    ///
    /// Provider failures are recorded per variation and never abort the
    /// siblings. Errors returned here come from the record store.
    #[instrument(skip(self, test), fields(test_id = %test.id))]
    pub async fn reconcile_test(&self, test: &AbTest) -> DomainResult<ReconcileOutcome> {
        if test.block {
            info!("Test is blocked; skipping");
            return Ok(ReconcileOutcome::skipped(test.id, SkipReason::Blocked));
        }
        if test.status != TestStatus::Active {
            return Ok(ReconcileOutcome::skipped(test.id, SkipReason::NotActive));
        }

        let variations = self.variations.list_for_test(test.id).await?;
        if variations.is_empty() {
            debug!("Test has no variations; skipping");
            return Ok(ReconcileOutcome::skipped(test.id, SkipReason::NoVariations));
        }

        let mut outcome = ReconcileOutcome::new(test.id);
        let mut observed_complete = false;
        let mut reminder_candidate: Option<String> = None;

        for variation in variations.iter().filter(|v| v.needs_polling()) {
            let Some(study_id) = variation.external_study_id.as_deref() else {
                continue;
            };

            let study = match self.fetch_study(study_id).await {
                Ok(study) => study,
                Err(e) => {
                    warn!(
                        study_id,
                        variation_type = %variation.variation_type,
                        error = %e,
                        "Study lookup failed; continuing with remaining variations"
                    );
                    outcome.failures.push(VariationFailure {
                        variation_type: variation.variation_type,
                        study_id: study_id.to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if !study.status.is_complete() {
                debug!(
                    study_id,
                    variation_type = %variation.variation_type,
                    provider_status = %study.status,
                    "Study not complete yet"
                );
                reminder_candidate.get_or_insert_with(|| study_id.to_string());
                continue;
            }

            if self.is_blocked(test.id).await? {
                info!("Test was blocked during reconciliation; stopping");
                outcome.skipped = Some(SkipReason::Blocked);
                return Ok(outcome);
            }

            observed_complete = true;
            if self
                .variations
                .advance_status(test.id, variation.variation_type, VariationStatus::Complete)
                .await?
            {
                info!(study_id, variation_type = %variation.variation_type, "Variation marked complete");
                outcome.transitioned.push(variation.variation_type);
            }
        }

        // A previous run may have written every variation but died before
        // finalizing; the snapshot check picks that up.
        if observed_complete || all_dispatched_complete(&variations) {
            let finalization = self.finalize_if_complete(test.id).await?;
            outcome.finalization = Some(finalization);
            (outcome.insights, outcome.insights_error) = self.insights_after(test.id, finalization).await;
        }

        if let Some(study_id) = reminder_candidate {
            if !outcome.test_completed() && self.send_reminder(&study_id, test.id).await {
                outcome.reminder_sent_for = Some(study_id);
            }
        }

        Ok(outcome)
    }

    /// Check a single variation, as dispatched from the work queue.
    ///
    /// Only `active` tests are checked. A not-yet-complete study produces a
    /// reminder instead of a retry.
    #[instrument(skip(self))]
    pub async fn reconcile_one_variation(
        &self,
        study_id: &str,
        test_id: Uuid,
        variation_type: VariationType,
    ) -> DomainResult<VariationCheckOutcome> {
        let test = self.load_test(test_id).await?;
        if test.block {
            info!("Test is blocked; skipping variation check");
            return Ok(VariationCheckOutcome::Blocked);
        }
        if test.status != TestStatus::Active {
            debug!(status = %test.status, "Test is not active; skipping variation check");
            return Ok(VariationCheckOutcome::NotActive { status: test.status });
        }

        let variation = self
            .variations
            .get(test_id, variation_type)
            .await?
            .ok_or(DomainError::VariationNotFound {
                test_id,
                variation_type,
            })?;

        if variation.external_study_id.as_deref() != Some(study_id) {
            warn!(
                stored_study_id = ?variation.external_study_id,
                "Checking a study id that differs from the stored one"
            );
        }

        if variation.is_complete() {
            let finalization = self.finalize_if_complete(test_id).await?;
            let (insights, insights_error) = self.insights_after(test_id, finalization).await;
            return Ok(VariationCheckOutcome::AlreadyComplete {
                finalization,
                insights,
                insights_error,
            });
        }

        let study = self.fetch_study(study_id).await?;
        if !study.status.is_complete() {
            let reminder_sent = self.send_reminder(study_id, test_id).await;
            return Ok(VariationCheckOutcome::NotComplete {
                provider_status: study.status.to_string(),
                reminder_sent,
            });
        }

        if self.is_blocked(test_id).await? {
            return Ok(VariationCheckOutcome::Blocked);
        }

        if self
            .variations
            .advance_status(test_id, variation_type, VariationStatus::Complete)
            .await?
        {
            info!("Variation marked complete");
        }

        let finalization = self.finalize_if_complete(test_id).await?;
        let (insights, insights_error) = self.insights_after(test_id, finalization).await;
        Ok(VariationCheckOutcome::Completed {
            finalization,
            insights,
            insights_error,
        })
    }

    /// Reconcile every active test.
    ///
    /// Only a failure to enumerate active tests is returned as an error;
    /// per-test failures are collected in the report.
    #[instrument(skip(self))]
    pub async fn daily_sweep(&self) -> DomainResult<SweepReport> {
        let tests = self.tests.list_active().await?;
        info!(active_tests = tests.len(), "Starting completion sweep");

        let results: Vec<(Uuid, DomainResult<ReconcileOutcome>)> = stream::iter(tests)
            .map(|test| async move {
                let result = self.reconcile_test(&test).await;
                (test.id, result)
            })
            .buffer_unordered(self.config.max_concurrent_tests.max(1))
            .collect()
            .await;

        let mut report = SweepReport::default();
        for (test_id, result) in results {
            match result {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!(test_id = %test_id, error = %e, "Reconciliation failed for test");
                    report.record_error(test_id, e.to_string());
                }
            }
        }

        info!(
            tests_seen = report.tests_seen,
            tests_completed = report.tests_completed,
            variations_completed = report.variations_completed,
            variation_failures = report.variation_failures,
            reminders_sent = report.reminders_sent,
            test_errors = report.test_errors.len(),
            "Completion sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-process port implementations for service tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::domain::errors::{DomainError, DomainResult};
    use crate::domain::models::{ProviderStudyStatus, StudyRecord};
    use crate::domain::ports::{NotificationSink, StudyProvider};

    #[derive(Debug, Clone)]
    pub enum Scripted {
        Status(ProviderStudyStatus),
        Fail(String),
        Hang(Duration),
    }

    #[derive(Debug, Default)]
    pub struct ScriptedProvider {
        responses: Mutex<HashMap<String, Scripted>>,
        calls: AtomicUsize,
        ready_delay: Duration,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, study_id: &str, response: Scripted) {
            self.responses
                .lock()
                .unwrap()
                .insert(study_id.to_string(), response);
        }

        pub fn status(self, study_id: &str, status: ProviderStudyStatus) -> Self {
            self.set(study_id, Scripted::Status(status));
            self
        }

        pub fn failing(self, study_id: &str, message: &str) -> Self {
            self.set(study_id, Scripted::Fail(message.to_string()));
            self
        }

        /// Every request waits `delay` for a rate-limit slot first.
        pub fn throttled(mut self, delay: Duration) -> Self {
            self.ready_delay = delay;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StudyProvider for ScriptedProvider {
        async fn ready(&self) {
            tokio::time::sleep(self.ready_delay).await;
        }

        async fn get_study(&self, study_id: &str) -> DomainResult<StudyRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.responses.lock().unwrap().get(study_id).cloned();
            match scripted {
                Some(Scripted::Status(status)) => Ok(StudyRecord::new(study_id, status)),
                Some(Scripted::Fail(message)) => Err(DomainError::ProviderRequestFailed {
                    study_id: study_id.to_string(),
                    message,
                }),
                Some(Scripted::Hang(delay)) => {
                    tokio::time::sleep(delay).await;
                    Ok(StudyRecord::new(study_id, ProviderStudyStatus::Completed))
                }
                None => Err(DomainError::ProviderRequestFailed {
                    study_id: study_id.to_string(),
                    message: "404 Not Found".to_string(),
                }),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(String, Uuid)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<(String, Uuid)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingNotifier {
        async fn send_completion_reminder(&self, study_id: &str, test_id: Uuid) -> DomainResult<()> {
            if self.fail {
                return Err(DomainError::NotificationFailed("webhook returned 500".to_string()));
            }
            self.sent.lock().unwrap().push((study_id.to_string(), test_id));
            Ok(())
        }
    }
}
