//! Panel provider (Prolific) adapter.
//!
//! Read-only: the reconciliation core only ever asks for the current state of
//! a study. Provider payloads are mapped into [`StudyRecord`] here and never
//! leak further.
//!
//! [`StudyRecord`]: crate::domain::models::StudyRecord

pub mod client;
pub mod models;

pub use client::ProlificClient;
