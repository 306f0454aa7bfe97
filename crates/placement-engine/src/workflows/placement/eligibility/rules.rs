use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::super::domain::{EligibilityCriteria, StudentSnapshot};

const CGPA_SCALE_MAX: f64 = 10.0;

/// Single blocker reported to a student. Each variant renders to the text shown in the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "criterion", rename_all = "snake_case")]
pub enum IneligibilityReason {
    BranchNotEligible { required: Vec<String> },
    BranchMissing { required: Vec<String> },
    CourseNotEligible { required: Vec<String> },
    CourseMissing { required: Vec<String> },
    PassingYearNotEligible { required: Vec<u16> },
    PassingYearMissing { required: Vec<u16> },
    CgpaTooLow { required: f64, actual: f64 },
    CgpaMissing { required: f64 },
    CgpaOutOfRange { actual: f64 },
    TooManyBacklogs { allowed: u32, actual: u32 },
    BacklogsMissing { allowed: u32 },
    TenthPercentageTooLow { required: f64, actual: Option<f64> },
    TwelfthPercentageTooLow { required: f64, actual: Option<f64> },
    GenderNotPreferred { required: String },
    PlacementPolicy { detail: String },
}

impl IneligibilityReason {
    pub fn summary(&self) -> String {
        match self {
            IneligibilityReason::BranchNotEligible { required } => {
                format!("Branch not eligible (Required: {})", required.join(", "))
            }
            IneligibilityReason::BranchMissing { required } => {
                format!("Branch not on record (Required: {})", required.join(", "))
            }
            IneligibilityReason::CourseNotEligible { required } => {
                format!("Course not eligible (Required: {})", required.join(", "))
            }
            IneligibilityReason::CourseMissing { required } => {
                format!("Course not on record (Required: {})", required.join(", "))
            }
            IneligibilityReason::PassingYearNotEligible { required } => format!(
                "Batch year not eligible (Required: {})",
                join_years(required)
            ),
            IneligibilityReason::PassingYearMissing { required } => format!(
                "Batch year not on record (Required: {})",
                join_years(required)
            ),
            IneligibilityReason::CgpaTooLow { required, actual } => format!(
                "CGPA too low (Required: {}, Yours: {})",
                format_decimal(*required),
                format_decimal(*actual)
            ),
            IneligibilityReason::CgpaMissing { required } => format!(
                "CGPA not on record (Required: {})",
                format_decimal(*required)
            ),
            IneligibilityReason::CgpaOutOfRange { actual } => format!(
                "CGPA on record is outside the 0-10 scale (Yours: {})",
                format_decimal(*actual)
            ),
            IneligibilityReason::TooManyBacklogs { allowed, actual } => format!(
                "Too many active backlogs (Max allowed: {allowed}, Yours: {actual})"
            ),
            IneligibilityReason::BacklogsMissing { allowed } => {
                format!("Active backlog count not on record (Max allowed: {allowed})")
            }
            IneligibilityReason::TenthPercentageTooLow { required, actual } => format!(
                "10th percentage too low (Required: {}, Yours: {})",
                format_decimal(*required),
                format_optional(*actual)
            ),
            IneligibilityReason::TwelfthPercentageTooLow { required, actual } => format!(
                "12th percentage too low (Required: {}, Yours: {})",
                format_decimal(*required),
                format_optional(*actual)
            ),
            IneligibilityReason::GenderNotPreferred { required } => {
                format!("Gender preference not matched (Required: {required})")
            }
            IneligibilityReason::PlacementPolicy { detail } => detail.clone(),
        }
    }
}

/// Run every academic check and collect all failures. Nothing short-circuits.
pub(crate) fn academic_blockers(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Vec<IneligibilityReason> {
    [
        check_branch(student, criteria),
        check_course(student, criteria),
        check_passing_year(student, criteria),
        check_cgpa(student, criteria),
        check_backlogs(student, criteria),
        check_tenth(student, criteria),
        check_twelfth(student, criteria),
        check_gender(student, criteria),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn check_branch(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    if criteria.eligible_branches.is_empty() {
        return None;
    }
    let required = criteria.eligible_branches.iter().cloned().collect();
    match student.branch.as_deref() {
        None => Some(IneligibilityReason::BranchMissing { required }),
        Some(branch) if contains_label(&criteria.eligible_branches, branch) => None,
        Some(_) => Some(IneligibilityReason::BranchNotEligible { required }),
    }
}

fn check_course(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    if criteria.eligible_courses.is_empty() {
        return None;
    }
    let required = criteria.eligible_courses.iter().cloned().collect();
    match student.course.as_deref() {
        None => Some(IneligibilityReason::CourseMissing { required }),
        Some(course) if contains_label(&criteria.eligible_courses, course) => None,
        Some(_) => Some(IneligibilityReason::CourseNotEligible { required }),
    }
}

fn check_passing_year(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    if criteria.eligible_passing_years.is_empty() {
        return None;
    }
    let required = criteria.eligible_passing_years.iter().copied().collect();
    match student.passing_year {
        None => Some(IneligibilityReason::PassingYearMissing { required }),
        Some(year) if criteria.eligible_passing_years.contains(&year) => None,
        Some(_) => Some(IneligibilityReason::PassingYearNotEligible { required }),
    }
}

fn check_cgpa(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    let required = criteria.min_cgpa?;
    match student.cgpa {
        None => Some(IneligibilityReason::CgpaMissing { required }),
        Some(actual) if !actual.is_finite() || !(0.0..=CGPA_SCALE_MAX).contains(&actual) => {
            Some(IneligibilityReason::CgpaOutOfRange { actual })
        }
        Some(actual) if actual >= required => None,
        Some(actual) => Some(IneligibilityReason::CgpaTooLow { required, actual }),
    }
}

fn check_backlogs(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    let allowed = criteria.max_active_backlogs?;
    match student.active_backlogs {
        None => Some(IneligibilityReason::BacklogsMissing { allowed }),
        Some(actual) if actual <= allowed => None,
        Some(actual) => Some(IneligibilityReason::TooManyBacklogs { allowed, actual }),
    }
}

fn check_tenth(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    let required = criteria.min_tenth_percentage?;
    match student.tenth_percentage {
        Some(actual) if actual >= required => None,
        actual => Some(IneligibilityReason::TenthPercentageTooLow { required, actual }),
    }
}

fn check_twelfth(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    let required = criteria.min_twelfth_percentage?;
    match student.twelfth_percentage {
        Some(actual) if actual >= required => None,
        actual => Some(IneligibilityReason::TwelfthPercentageTooLow { required, actual }),
    }
}

fn check_gender(
    student: &StudentSnapshot,
    criteria: &EligibilityCriteria,
) -> Option<IneligibilityReason> {
    let required = criteria
        .gender_preference
        .as_deref()
        .map(str::trim)
        .filter(|preference| !preference.is_empty() && !preference.eq_ignore_ascii_case("any"))?;
    match student.gender.as_deref() {
        Some(gender) if gender.trim().eq_ignore_ascii_case(required) => None,
        _ => Some(IneligibilityReason::GenderNotPreferred {
            required: required.to_string(),
        }),
    }
}

fn contains_label(allowed: &BTreeSet<String>, value: &str) -> bool {
    let value = value.trim();
    allowed
        .iter()
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(value))
}

fn join_years(years: &[u16]) -> String {
    years
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render grades with at least one decimal place: 8 -> "8.0", 7.25 -> "7.25".
fn format_decimal(value: f64) -> String {
    let mut text = format!("{value:.2}");
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    text
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(format_decimal)
        .unwrap_or_else(|| "not on record".to_string())
}
