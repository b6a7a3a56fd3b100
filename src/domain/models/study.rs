//! External study state as reported by the panel provider.
//!
//! Provider wording lives only here. Everything stored locally goes through
//! [`ProviderStudyStatus::to_local`] first.

use serde::{Deserialize, Serialize};

use super::variation::VariationStatus;

/// Study status in the provider's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderStudyStatus {
    Unpublished,
    Scheduled,
    Publishing,
    Active,
    Paused,
    AwaitingReview,
    Completed,
    /// Any value the provider adds later; always treated as not complete.
    Other(String),
}

impl ProviderStudyStatus {
    /// Parse a provider status string. Unknown values never fail.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "UNPUBLISHED" => Self::Unpublished,
            "SCHEDULED" => Self::Scheduled,
            "PUBLISHING" => Self::Publishing,
            "ACTIVE" => Self::Active,
            "PAUSED" => Self::Paused,
            "AWAITING REVIEW" => Self::AwaitingReview,
            "COMPLETED" => Self::Completed,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_provider_str(&self) -> &str {
        match self {
            Self::Unpublished => "UNPUBLISHED",
            Self::Scheduled => "SCHEDULED",
            Self::Publishing => "PUBLISHING",
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::AwaitingReview => "AWAITING REVIEW",
            Self::Completed => "COMPLETED",
            Self::Other(raw) => raw,
        }
    }

    /// Translate into the local variation vocabulary.
    ///
    /// Unknown statuses map to `Active` so they can never complete a variation.
    pub fn to_local(&self) -> VariationStatus {
        match self {
            Self::Unpublished | Self::Scheduled => VariationStatus::Pending,
            Self::Publishing | Self::Active | Self::Paused | Self::Other(_) => {
                VariationStatus::Active
            }
            Self::AwaitingReview => VariationStatus::NeedsReview,
            Self::Completed => VariationStatus::Complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.to_local().is_terminal()
    }
}

impl From<String> for ProviderStudyStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ProviderStudyStatus> for String {
    fn from(status: ProviderStudyStatus) -> Self {
        status.as_provider_str().to_string()
    }
}

impl std::fmt::Display for ProviderStudyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_provider_str())
    }
}

/// Snapshot of one external study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRecord {
    pub id: String,
    pub status: ProviderStudyStatus,
    pub internal_name: Option<String>,
    pub total_available_places: Option<u32>,
    pub places_taken: Option<u32>,
}

impl StudyRecord {
    pub fn new(id: impl Into<String>, status: ProviderStudyStatus) -> Self {
        Self {
            id: id.into(),
            status,
            internal_name: None,
            total_available_places: None,
            places_taken: None,
        }
    }
}
