//! Variation domain model.
//!
//! Each variation is one treatment (a, b or c) of a test and maps 1:1 to a
//! study on the external panel provider once dispatched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Treatment slot of a variation within its test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationType {
    A,
    B,
    C,
}

impl VariationType {
    pub const ALL: [VariationType; 3] = [Self::A, Self::B, Self::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            "c" => Some(Self::C),
            _ => None,
        }
    }
}

impl std::fmt::Display for VariationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local mirror of a variation's external study state.
///
/// This is our own vocabulary; provider wording is translated into it by
/// [`ProviderStudyStatus::to_local`](super::ProviderStudyStatus::to_local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationStatus {
    /// Not dispatched, or dispatched but not yet live
    Pending,
    /// Study is collecting responses
    Active,
    /// Study stopped collecting and waits for submissions to be reviewed
    NeedsReview,
    /// Study finished; terminal
    Complete,
}

impl Default for VariationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl VariationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::NeedsReview => "needs_review",
            Self::Complete => "complete",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "needs_review" | "needs-review" => Some(Self::NeedsReview),
            "complete" | "completed" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Position in the monotonic order; a stored status never moves to a lower rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::NeedsReview => 2,
            Self::Complete => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn can_advance_to(&self, next: Self) -> bool {
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for VariationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One treatment of a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
    pub id: Uuid,
    pub test_id: Uuid,
    pub product_id: Option<Uuid>,
    pub variation_type: VariationType,
    /// External study id; `None` until the study has been dispatched.
    pub external_study_id: Option<String>,
    /// `None` is the stored null and reads as pending.
    pub prolific_status: Option<VariationStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variation {
    pub fn new(test_id: Uuid, variation_type: VariationType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            test_id,
            product_id: None,
            variation_type,
            external_study_id: None,
            prolific_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_product(mut self, product_id: Uuid) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Mark the variation as dispatched to the given external study.
    pub fn dispatched(mut self, study_id: impl Into<String>) -> Self {
        self.external_study_id = Some(study_id.into());
        self.prolific_status = Some(VariationStatus::Active);
        self
    }

    pub fn with_status(mut self, status: VariationStatus) -> Self {
        self.prolific_status = Some(status);
        self
    }

    pub fn status(&self) -> VariationStatus {
        self.prolific_status.unwrap_or_default()
    }

    pub fn is_dispatched(&self) -> bool {
        self.external_study_id.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_terminal()
    }

    /// Whether the sweep should ask the provider about this variation.
    pub fn needs_polling(&self) -> bool {
        self.is_dispatched() && !self.is_complete()
    }
}

/// Test-level completion derived from variation state.
///
/// A test is complete iff every dispatched variation is locally complete.
/// A test with no dispatched variations is never complete.
pub fn all_dispatched_complete(variations: &[Variation]) -> bool {
    let mut dispatched = variations.iter().filter(|v| v.is_dispatched()).peekable();
    dispatched.peek().is_some() && dispatched.all(Variation::is_complete)
}
