//! Domain errors for the panelsync reconciliation system.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use super::models::VariationType;

/// Domain-level errors that can occur while reconciling tests or computing insights.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Test not found: {0}")]
    TestNotFound(Uuid),

    #[error("Variation {variation_type} not found for test {test_id}")]
    VariationNotFound {
        test_id: Uuid,
        variation_type: VariationType,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Study provider request failed for {study_id}: {message}")]
    ProviderRequestFailed { study_id: String, message: String },

    #[error("Study provider timed out after {}s for {study_id}", .timeout.as_secs())]
    ProviderTimeout { study_id: String, timeout: Duration },

    #[error("Notification failed: {0}")]
    NotificationFailed(String),
}

impl DomainError {
    /// Whether the error is a transient external failure that the next sweep may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProviderRequestFailed { .. } | Self::ProviderTimeout { .. }
        )
    }

    /// Whether the error means the unit of work refers to a record that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TestNotFound(_) | Self::VariationNotFound { .. })
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = DomainError::ProviderTimeout {
            study_id: "s1".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert!(timeout.is_transient());
        assert!(!timeout.is_not_found());
        assert_eq!(
            timeout.to_string(),
            "Study provider timed out after 30s for s1"
        );

        let missing = DomainError::VariationNotFound {
            test_id: Uuid::nil(),
            variation_type: VariationType::B,
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_transient());
    }
}
