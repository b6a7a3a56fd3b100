//! Domain layer for the panelsync reconciliation system
//!
//! This module contains the test/variation state machine, insights types and
//! the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
