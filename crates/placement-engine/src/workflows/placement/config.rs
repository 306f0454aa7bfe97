use serde::{Deserialize, Serialize};

use super::eligibility::PlacedStudentPolicy;

/// Where single-offer exclusivity is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferExclusivity {
    /// Students may hold several `selected` offers; accepting one withdraws the rest.
    AtAcceptance,
    /// Companies cannot select a student who already holds an outstanding or accepted offer.
    AtSelection,
}

impl OfferExclusivity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "at_acceptance" | "acceptance" => Some(Self::AtAcceptance),
            "at_selection" | "selection" => Some(Self::AtSelection),
            _ => None,
        }
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub placed_student_policy: PlacedStudentPolicy,
    pub offer_exclusivity: OfferExclusivity,
    /// Compare-and-swap attempts per mutation before reporting `ConcurrentModification`.
    pub max_commit_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placed_student_policy: PlacedStudentPolicy::Block,
            offer_exclusivity: OfferExclusivity::AtAcceptance,
            max_commit_attempts: 5,
        }
    }
}
