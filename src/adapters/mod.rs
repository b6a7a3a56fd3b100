//! Infrastructure adapters for external systems.

pub mod notify;
pub mod prolific;
pub mod sqlite;
