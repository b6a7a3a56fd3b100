//! Queued on-demand variation checks.
//!
//! One job is enqueued per variation dispatch when on-demand checking is
//! enabled. A job is removed once handled and never re-queued; studies that
//! are still running are picked up again by the periodic sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::variation::VariationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckJobStatus {
    Pending,
    Running,
    Failed,
}

impl CheckJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A request to reconcile exactly one variation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationCheckJob {
    pub id: Uuid,
    pub study_id: String,
    pub test_id: Uuid,
    pub variation_type: VariationType,
    pub status: CheckJobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VariationCheckJob {
    pub fn new(study_id: impl Into<String>, test_id: Uuid, variation_type: VariationType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            study_id: study_id.into(),
            test_id,
            variation_type,
            status: CheckJobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
