//! Eligibility evaluation and application lifecycle for campus placement drives.
//!
//! The drive registry owns drive publication, the ledger owns application records, and the
//! coordinator applies company batch decisions through the ledger's commit path. Queries are
//! read-only projections over both.

pub mod clock;
pub mod config;
pub(crate) mod coordinator;
pub mod domain;
pub mod eligibility;
pub mod error;
pub(crate) mod ledger;
pub mod memory;
pub mod ports;
pub(crate) mod queries;
pub(crate) mod registry;
pub mod repository;
pub mod router;
pub mod service;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, OfferExclusivity};
pub use coordinator::{
    AcceptedEntry, BatchOutcome, RejectedEntry, SelectionCoordinator, SelectionDecision,
    SelectionOutcome,
};
pub use domain::{
    Actor, ActorRole, Application, ApplicationId, ApplicationStatus, ApplicationWindow, CompanyId,
    CompanyProfile, DriveId, DriveStatus, DriveStatusChange, EligibilityCriteria, JobDrive,
    PackageCategory, PlacementStatus, StatusChange, StudentId, StudentSnapshot,
};
pub use eligibility::{
    CriteriaEvaluator, EligibilityVerdict, IneligibilityReason, PlacedStudentPolicy,
    PlacementPolicy,
};
pub use error::{EntityKind, ErrorKind, PlacementError};
pub use ledger::{ApplicationLedger, ApplyRequest};
pub use memory::{InMemoryApplicationRepository, InMemoryDriveRepository};
pub use ports::{
    AuditError, AuditEvent, AuditSink, AuditSubject, Collaborators, CompanyProfileStore,
    ProfileStoreError, StudentProfileStore,
};
pub use queries::{
    ApplicantView, DriveListing, EligibleDriveView, PlacementQueries, PlacementStatistics,
    StudentApplicationView,
};
pub use registry::{DriveDraft, DriveRegistry};
pub use repository::{
    ApplicationRepository, ApplicationUpdate, DriveRepository, RepositoryError,
};
pub use router::{placement_router, ActorHeaders};
pub use service::PlacementService;
