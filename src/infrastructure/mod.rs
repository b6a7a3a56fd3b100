//! Infrastructure layer module
//!
//! Cross-cutting concerns that are not ports of the domain:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;
