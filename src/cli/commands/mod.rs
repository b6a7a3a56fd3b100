//! CLI command implementations.

pub mod check;
pub mod init;
pub mod insights;
pub mod sweep;
