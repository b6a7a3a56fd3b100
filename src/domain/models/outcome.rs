//! Structured results of reconciliation operations.
//!
//! Callers and tests assert on these instead of scraping log output.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ab_test::TestStatus;
use super::insights::InsightsGeneration;
use super::variation::VariationType;

/// Result of re-deriving test completion from variation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    /// True only when this call wrote the `complete` status.
    pub completed: bool,
    pub status: TestStatus,
}

impl FinalizeOutcome {
    pub fn unchanged(status: TestStatus) -> Self {
        Self {
            completed: false,
            status,
        }
    }

    pub fn completed() -> Self {
        Self {
            completed: true,
            status: TestStatus::Complete,
        }
    }
}

/// Why a test was not reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Manual block flag is set
    Blocked,
    /// Test is not in the `active` status
    NotActive,
    /// Test has no variations
    NoVariations,
}

/// A provider query that failed for one variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationFailure {
    pub variation_type: VariationType,
    pub study_id: String,
    pub error: String,
}

/// Outcome of reconciling one test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub test_id: Uuid,
    pub skipped: Option<SkipReason>,
    /// Variations whose status this run moved to complete.
    pub transitioned: Vec<VariationType>,
    pub failures: Vec<VariationFailure>,
    /// Study id the reminder went out for, if one was sent successfully.
    pub reminder_sent_for: Option<String>,
    pub finalization: Option<FinalizeOutcome>,
    pub insights: Option<InsightsGeneration>,
    /// Set when insights generation was attempted and failed.
    pub insights_error: Option<String>,
}

impl ReconcileOutcome {
    pub fn new(test_id: Uuid) -> Self {
        Self {
            test_id,
            ..Default::default()
        }
    }

    pub fn skipped(test_id: Uuid, reason: SkipReason) -> Self {
        Self {
            test_id,
            skipped: Some(reason),
            ..Default::default()
        }
    }

    pub fn test_completed(&self) -> bool {
        self.finalization.is_some_and(|f| f.completed)
    }
}

/// Outcome of the on-demand single-variation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VariationCheckOutcome {
    /// The study finished and the variation was moved to complete by this call.
    Completed {
        finalization: FinalizeOutcome,
        /// Rows written when this call finalized the test.
        insights: Option<InsightsGeneration>,
        /// Set when insights generation was attempted and failed.
        insights_error: Option<String>,
    },
    /// The variation was already complete locally; only the test completion was re-derived.
    AlreadyComplete {
        finalization: FinalizeOutcome,
        insights: Option<InsightsGeneration>,
        insights_error: Option<String>,
    },
    /// The study is still running; a reminder was attempted instead of re-queuing.
    NotComplete {
        provider_status: String,
        reminder_sent: bool,
    },
    /// The test is blocked; nothing was written.
    Blocked,
    /// The test is not `active`; nothing was polled or written.
    NotActive { status: TestStatus },
}

/// Totals for one sweep over every active test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub tests_seen: usize,
    pub tests_reconciled: usize,
    pub tests_skipped: usize,
    pub tests_completed: usize,
    pub variations_completed: usize,
    pub variation_failures: usize,
    pub reminders_sent: usize,
    /// Tests whose reconciliation hit an error outside the per-variation loop.
    pub test_errors: Vec<(Uuid, String)>,
}

impl SweepReport {
    pub fn record(&mut self, outcome: &ReconcileOutcome) {
        self.tests_seen += 1;
        if outcome.skipped.is_some() {
            self.tests_skipped += 1;
            return;
        }
        self.tests_reconciled += 1;
        self.variations_completed += outcome.transitioned.len();
        self.variation_failures += outcome.failures.len();
        if outcome.reminder_sent_for.is_some() {
            self.reminders_sent += 1;
        }
        if outcome.test_completed() {
            self.tests_completed += 1;
        }
    }

    pub fn record_error(&mut self, test_id: Uuid, error: String) {
        self.tests_seen += 1;
        self.test_errors.push((test_id, error));
    }
}
