use serde::{Deserialize, Serialize};

use super::super::domain::{JobDrive, PlacementStatus, StudentSnapshot};
use super::rules::IneligibilityReason;

/// Pluggable predicate deciding whether a student's placement status permits applying.
pub trait PlacementPolicy: Send + Sync {
    /// Returns the blocker when the student may not apply, `None` otherwise.
    fn assess(&self, student: &StudentSnapshot, drive: &JobDrive) -> Option<IneligibilityReason>;
}

/// Built-in placement-status rules selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacedStudentPolicy {
    /// Placed students may not apply anywhere else.
    Block,
    /// Placement status is ignored.
    Allow,
    /// Placed students may apply only to drives in a strictly higher package category.
    HigherCategoryOnly,
}

impl PlacedStudentPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "block" | "block_placed" => Some(Self::Block),
            "allow" | "allow_placed" => Some(Self::Allow),
            "higher_category" | "higher_category_only" => Some(Self::HigherCategoryOnly),
            _ => None,
        }
    }
}

impl PlacementPolicy for PlacedStudentPolicy {
    fn assess(&self, student: &StudentSnapshot, drive: &JobDrive) -> Option<IneligibilityReason> {
        let PlacementStatus::Placed { category } = student.placement_status else {
            return None;
        };

        match self {
            PlacedStudentPolicy::Allow => None,
            PlacedStudentPolicy::Block => Some(IneligibilityReason::PlacementPolicy {
                detail: "Already placed (placed students may not apply to further drives)"
                    .to_string(),
            }),
            PlacedStudentPolicy::HigherCategoryOnly => match category {
                Some(current) if drive.package_category > current => None,
                Some(current) => Some(IneligibilityReason::PlacementPolicy {
                    detail: format!(
                        "Already placed (Drive category: {}, must exceed current offer: {})",
                        drive.package_category.label(),
                        current.label()
                    ),
                }),
                None => Some(IneligibilityReason::PlacementPolicy {
                    detail: "Already placed (current offer category unknown)".to_string(),
                }),
            },
        }
    }
}
