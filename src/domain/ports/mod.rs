//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces the reconciliation core depends on:
//! - TestRepository / VariationRepository / InsightsRepository: the record store
//! - VariationCheckQueue: on-demand check jobs
//! - StudyProvider: the external panel provider
//! - NotificationSink: reminder delivery

pub mod check_queue;
pub mod insights_repository;
pub mod notification_sink;
pub mod study_provider;
pub mod test_repository;
pub mod variation_repository;

pub use check_queue::VariationCheckQueue;
pub use insights_repository::InsightsRepository;
pub use notification_sink::NotificationSink;
pub use study_provider::StudyProvider;
pub use test_repository::{TestFilter, TestRepository};
pub use variation_repository::VariationRepository;
