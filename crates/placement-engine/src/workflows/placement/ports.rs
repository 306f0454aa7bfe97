use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, ApplicationId, CompanyId, CompanyProfile, DriveId, PackageCategory, StudentId,
    StudentSnapshot,
};

/// Source of student profiles. Owned outside the engine; only read and notified.
pub trait StudentProfileStore: Send + Sync {
    fn student_snapshot(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<StudentSnapshot>, ProfileStoreError>;

    /// Record that the student accepted an offer on `drive_id`.
    fn mark_placed(
        &self,
        student_id: &StudentId,
        drive_id: &DriveId,
        category: PackageCategory,
    ) -> Result<(), ProfileStoreError>;
}

pub trait CompanyProfileStore: Send + Sync {
    fn company(&self, company_id: &CompanyId) -> Result<Option<CompanyProfile>, ProfileStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
    #[error("profile {0} not found")]
    Missing(String),
}

/// Receives a copy of every status-history append. Delivery is fire-and-forget.
pub trait AuditSink: Send + Sync {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuditSubject {
    Drive(DriveId),
    Application(ApplicationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub subject: AuditSubject,
    pub status: String,
    pub actor: Actor,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}

/// Bundle of external collaborators handed to the engine at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub students: Arc<dyn StudentProfileStore>,
    pub companies: Arc<dyn CompanyProfileStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl Collaborators {
    pub(crate) fn publish(&self, event: AuditEvent) {
        if let Err(error) = self.audit.publish(event) {
            tracing::warn!(%error, "audit sink rejected status event");
        }
    }
}
