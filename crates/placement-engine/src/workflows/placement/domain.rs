use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for job drives.
    DriveId
);
identifier!(
    /// Identifier wrapper for submitted applications.
    ApplicationId
);
identifier!(StudentId);
identifier!(CompanyId);

/// Role an actor plays when invoking the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Student,
    Company,
    Admin,
    System,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Student => "student",
            ActorRole::Company => "company",
            ActorRole::Admin => "admin",
            ActorRole::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "company" => Some(Self::Company),
            "admin" => Some(Self::Admin),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Identity of whoever is driving an operation, passed explicitly into every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn student(id: &StudentId) -> Self {
        Self {
            id: id.0.clone(),
            role: ActorRole::Student,
        }
    }

    pub fn company(id: &CompanyId) -> Self {
        Self {
            id: id.0.clone(),
            role: ActorRole::Company,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Admin,
        }
    }

    pub fn system() -> Self {
        Self {
            id: "placement-engine".to_string(),
            role: ActorRole::System,
        }
    }

    pub fn is_student(&self, student_id: &StudentId) -> bool {
        self.role == ActorRole::Student && self.id == student_id.0
    }

    pub fn is_company(&self, company_id: &CompanyId) -> bool {
        self.role == ActorRole::Company && self.id == company_id.0
    }
}

/// Offer tier used by placement policies. Ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageCategory {
    Standard,
    Dream,
    SuperDream,
}

impl PackageCategory {
    pub const fn label(self) -> &'static str {
        match self {
            PackageCategory::Standard => "standard",
            PackageCategory::Dream => "dream",
            PackageCategory::SuperDream => "super_dream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlacementStatus {
    NotPlaced,
    Placed { category: Option<PackageCategory> },
}

impl PlacementStatus {
    pub const fn is_placed(self) -> bool {
        matches!(self, PlacementStatus::Placed { .. })
    }
}

/// Read-only projection of a student profile captured at evaluation time.
///
/// Missing academic data is modelled as `None` and reported as an ineligibility reason by the
/// evaluator rather than treated as a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSnapshot {
    pub student_id: StudentId,
    pub full_name: String,
    pub branch: Option<String>,
    pub course: Option<String>,
    pub admission_year: Option<u16>,
    pub passing_year: Option<u16>,
    pub cgpa: Option<f64>,
    pub active_backlogs: Option<u32>,
    #[serde(default)]
    pub tenth_percentage: Option<f64>,
    #[serde(default)]
    pub twelfth_percentage: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    pub placement_status: PlacementStatus,
}

/// Company record as exposed by the company profile store (display only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_id: CompanyId,
    pub name: String,
}

/// Eligibility rules attached to a drive. Empty sets and absent minimums impose no restriction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    #[serde(default)]
    pub eligible_branches: BTreeSet<String>,
    #[serde(default)]
    pub eligible_courses: BTreeSet<String>,
    #[serde(default)]
    pub eligible_passing_years: BTreeSet<u16>,
    #[serde(default)]
    pub min_cgpa: Option<f64>,
    #[serde(default)]
    pub max_active_backlogs: Option<u32>,
    #[serde(default)]
    pub min_tenth_percentage: Option<f64>,
    #[serde(default)]
    pub min_twelfth_percentage: Option<f64>,
    /// `None` or "Any" admits every student.
    #[serde(default)]
    pub gender_preference: Option<String>,
}

/// Publication lifecycle of a drive. Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveStatus {
    Draft,
    Published,
    Locked,
    Closed,
}

impl DriveStatus {
    pub const fn ordered() -> [Self; 4] {
        [Self::Draft, Self::Published, Self::Locked, Self::Closed]
    }

    pub const fn label(self) -> &'static str {
        match self {
            DriveStatus::Draft => "draft",
            DriveStatus::Published => "published",
            DriveStatus::Locked => "locked",
            DriveStatus::Closed => "closed",
        }
    }

    /// Locked and closed drives reject new applications and company submissions.
    pub const fn is_frozen(self) -> bool {
        matches!(self, DriveStatus::Locked | DriveStatus::Closed)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw.trim()))
    }
}

/// Half-open interval `[opens_at, closes_at)` during which students may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationWindow {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

impl ApplicationWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.opens_at <= instant && instant < self.closes_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveStatusChange {
    pub status: DriveStatus,
    pub at: DateTime<Utc>,
    pub actor: Actor,
}

/// Job drive owned by the drive registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDrive {
    pub drive_id: DriveId,
    pub company_id: CompanyId,
    pub title: String,
    pub status: DriveStatus,
    pub criteria: EligibilityCriteria,
    pub vacancies: u32,
    pub package_category: PackageCategory,
    pub ctc_lpa: Option<f64>,
    pub window: Option<ApplicationWindow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub history: Vec<DriveStatusChange>,
}

impl JobDrive {
    /// True when the drive is published and `now` falls inside its application window.
    pub fn accepting_applications(&self, now: DateTime<Utc>) -> bool {
        self.status == DriveStatus::Published
            && self.window.map(|window| window.contains(now)).unwrap_or(false)
    }
}

/// Status of an application. The permitted moves between variants live in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    UnderReview,
    Shortlisted,
    InterviewScheduled,
    Selected,
    Rejected,
    OfferAccepted,
    OfferDeclined,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn ordered() -> [Self; 9] {
        [
            Self::Applied,
            Self::UnderReview,
            Self::Shortlisted,
            Self::InterviewScheduled,
            Self::Selected,
            Self::Rejected,
            Self::OfferAccepted,
            Self::OfferDeclined,
            Self::Withdrawn,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Selected => "selected",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::OfferAccepted => "offer_accepted",
            ApplicationStatus::OfferDeclined => "offer_declined",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected
                | ApplicationStatus::OfferAccepted
                | ApplicationStatus::OfferDeclined
                | ApplicationStatus::Withdrawn
        )
    }

    /// Student-facing outcomes that stay available after the owning drive is locked.
    pub const fn permitted_after_lock(self) -> bool {
        matches!(
            self,
            ApplicationStatus::OfferAccepted
                | ApplicationStatus::OfferDeclined
                | ApplicationStatus::Withdrawn
        )
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of an application's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub at: DateTime<Utc>,
    pub actor: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Application record owned by the ledger. `status` always mirrors the last history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub drive_id: DriveId,
    pub status: ApplicationStatus,
    pub resume_ref: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub version: u64,
    pub history: Vec<StatusChange>,
}

impl Application {
    pub(crate) fn submitted(
        application_id: ApplicationId,
        student_id: StudentId,
        drive_id: DriveId,
        resume_ref: Option<String>,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            application_id,
            student_id,
            drive_id,
            status: ApplicationStatus::Applied,
            resume_ref,
            applied_at: at,
            version: 1,
            history: vec![StatusChange {
                status: ApplicationStatus::Applied,
                at,
                actor,
                note: None,
            }],
        }
    }

    pub(crate) fn record(&mut self, change: StatusChange) {
        self.status = change.status;
        self.history.push(change);
    }

    /// Rebuild the current status from the audit trail.
    pub fn replay_status(&self) -> Option<ApplicationStatus> {
        self.history.last().map(|change| change.status)
    }

    pub fn is_active(&self) -> bool {
        self.status != ApplicationStatus::Withdrawn
    }
}
