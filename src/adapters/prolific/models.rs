//! Prolific API response models.
//!
//! These structs map to the Prolific REST API JSON payloads. Only the fields
//! the reconciler consumes are declared; everything else is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::models::{ProviderStudyStatus, StudyRecord};

/// A study returned by `GET /studies/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProlificStudy {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub internal_name: Option<String>,
    /// Provider status string, e.g. "ACTIVE", "AWAITING REVIEW", "COMPLETED".
    pub status: String,
    #[serde(default)]
    pub total_available_places: Option<u32>,
    #[serde(default)]
    pub places_taken: Option<u32>,
}

impl From<ProlificStudy> for StudyRecord {
    fn from(study: ProlificStudy) -> Self {
        Self {
            id: study.id,
            status: ProviderStudyStatus::parse(&study.status),
            internal_name: study.internal_name.or(study.name),
            total_available_places: study.total_available_places,
            places_taken: study.places_taken,
        }
    }
}
