mod policy;
mod rules;

pub use policy::{PlacedStudentPolicy, PlacementPolicy};
pub use rules::IneligibilityReason;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{JobDrive, StudentSnapshot};

/// Stateless evaluator mapping (student snapshot, drive) to a verdict.
///
/// Verdicts are computed fresh for every call and never cached, since both the profile and the
/// drive criteria can change between queries.
#[derive(Clone)]
pub struct CriteriaEvaluator {
    policy: Arc<dyn PlacementPolicy>,
}

impl CriteriaEvaluator {
    pub fn new(policy: Arc<dyn PlacementPolicy>) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, student: &StudentSnapshot, drive: &JobDrive) -> EligibilityVerdict {
        let mut reasons = rules::academic_blockers(student, &drive.criteria);
        if let Some(blocker) = self.policy.assess(student, drive) {
            reasons.push(blocker);
        }

        EligibilityVerdict {
            eligible: reasons.is_empty(),
            reasons,
        }
    }
}

impl Default for CriteriaEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(PlacedStudentPolicy::Block))
    }
}

impl std::fmt::Debug for CriteriaEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriteriaEvaluator").finish_non_exhaustive()
    }
}

/// Transient eligibility result. `reasons` is empty iff `eligible`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    pub reasons: Vec<IneligibilityReason>,
}

impl EligibilityVerdict {
    pub fn messages(&self) -> Vec<String> {
        self.reasons.iter().map(IneligibilityReason::summary).collect()
    }
}
