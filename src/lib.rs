//! panelsync - completion reconciliation for panel-hosted A/B tests
//!
//! Keeps local test and variation status in line with the external panel
//! studies that back each variation, and turns raw tester responses into
//! per-variant insights once a test completes.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, outcomes and port traits
//! - **Adapters** (`adapters`): SQLite record store, panel provider client, notification sinks
//! - **Service Layer** (`services`): reconciliation, sweep scheduling, queue worker, insights
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AbTest, Config, FinalizeOutcome, InsightsReport, ReconcileOutcome, SweepReport, TestStatus,
    TestSummary, Variation, VariationCheckOutcome, VariationStatus, VariationType,
};
pub use services::{CompletionReconciler, InsightsAggregator, SweepDaemon, VariationCheckWorker};
