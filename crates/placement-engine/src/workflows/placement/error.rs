use chrono::{DateTime, Utc};

use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, DriveId, DriveStatus, StudentId,
};
use super::ports::ProfileStoreError;
use super::repository::RepositoryError;

/// Coarse classification callers use to decide how to surface or retry a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input. Not retried.
    Validation,
    /// Request conflicts with current state. Surfaced verbatim, not retried automatically.
    Conflict,
    NotFound,
    /// Refused by eligibility or authorization policy.
    Policy,
    /// Underlying store failure. Reads may be retried; mutations must be checked first.
    Store,
}

/// Entity kinds reported by `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Drive,
    Application,
    Student,
    Company,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::Drive => "drive",
            EntityKind::Application => "application",
            EntityKind::Student => "student",
            EntityKind::Company => "company",
        }
    }
}

/// Error raised by every engine operation.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("application window must satisfy now < opens_at < closes_at (opens {opens_at}, closes {closes_at})")]
    InvalidWindow {
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    },
    #[error("drive {drive_id} cannot move from {} to {}", from.label(), to.label())]
    InvalidTransition {
        drive_id: DriveId,
        from: DriveStatus,
        to: DriveStatus,
    },
    #[error("student {student_id} has already applied to drive {drive_id}")]
    AlreadyApplied {
        student_id: StudentId,
        drive_id: DriveId,
    },
    #[error("drive {drive_id} is not accepting applications ({reason})")]
    DriveNotOpen { drive_id: DriveId, reason: String },
    #[error("drive {drive_id} is {}", status.label())]
    DriveLocked {
        drive_id: DriveId,
        status: DriveStatus,
    },
    #[error("application {application_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        application_id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("{entity} was modified concurrently; retry after re-reading")]
    ConcurrentModification { entity: String },
    #[error("student is not eligible: {}", reasons.join("; "))]
    Ineligible { reasons: Vec<String> },
    #[error("{} actor {actor_id} may not {action}", role.label())]
    Forbidden {
        actor_id: String,
        role: ActorRole,
        action: String,
    },
    #[error("{} {id} not found", kind.label())]
    NotFound { kind: EntityKind, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Profile(#[from] ProfileStoreError),
    #[error("student {student_id} already holds an offer on drive {held_drive_id} ({held_status})")]
    OfferConflict {
        student_id: StudentId,
        held_drive_id: DriveId,
        held_status: ApplicationStatus,
    },
}

impl PlacementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlacementError::Validation(_) | PlacementError::InvalidWindow { .. } => {
                ErrorKind::Validation
            }
            PlacementError::InvalidTransition { .. }
            | PlacementError::AlreadyApplied { .. }
            | PlacementError::DriveNotOpen { .. }
            | PlacementError::DriveLocked { .. }
            | PlacementError::InvalidStatusTransition { .. }
            | PlacementError::ConcurrentModification { .. }
            | PlacementError::OfferConflict { .. } => ErrorKind::Conflict,
            PlacementError::NotFound { .. } => ErrorKind::NotFound,
            PlacementError::Ineligible { .. } | PlacementError::Forbidden { .. } => {
                ErrorKind::Policy
            }
            PlacementError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            PlacementError::Repository(_) | PlacementError::Profile(_) => ErrorKind::Store,
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        PlacementError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn forbidden(actor: &Actor, action: impl Into<String>) -> Self {
        PlacementError::Forbidden {
            actor_id: actor.id.clone(),
            role: actor.role,
            action: action.into(),
        }
    }
}
