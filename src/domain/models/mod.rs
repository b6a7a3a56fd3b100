pub mod check_job;
pub mod config;
pub mod insights;
pub mod outcome;
pub mod study;
pub mod variation;

pub use ab_test::{AbTest, TestStatus};
pub use check_job::{CheckJobStatus, VariationCheckJob};
pub use config::{
    Config, DatabaseConfig, LoggingConfig, NotificationConfig, ProviderConfig, ReconcileConfig,
};
pub use insights::{
    ComparisonResponse, CompetitiveInsight, CompetitorInsights, Demographics, InsightsGeneration,
    InsightsReport, SurveyResponse, TestSummary, VariantCounts,
};
pub use outcome::{
    FinalizeOutcome, ReconcileOutcome, SkipReason, SweepReport, VariationCheckOutcome,
    VariationFailure,
};
pub use study::{ProviderStudyStatus, StudyRecord};
pub use variation::{all_dispatched_complete, Variation, VariationStatus, VariationType};
