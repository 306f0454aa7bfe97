use super::domain::{Application, ApplicationId, DriveId, JobDrive, StudentId};

/// Storage abstraction for drive records so the registry can be exercised in isolation.
pub trait DriveRepository: Send + Sync {
    fn insert(&self, drive: JobDrive) -> Result<JobDrive, RepositoryError>;
    fn fetch(&self, id: &DriveId) -> Result<Option<JobDrive>, RepositoryError>;
    fn list(&self) -> Result<Vec<JobDrive>, RepositoryError>;
    /// Replace the stored drive only if its version still equals `expected_version`.
    fn update(&self, drive: JobDrive, expected_version: u64) -> Result<(), RepositoryError>;
}

/// Storage abstraction for applications.
///
/// Implementations must enforce two constraints under their own lock: at most one non-withdrawn
/// application per (student, drive) on `insert`, and all-or-nothing version checks on `commit`.
pub trait ApplicationRepository: Send + Sync {
    /// Fails with `RepositoryError::Conflict` when the pair already holds an active application.
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Latest non-withdrawn application for the pair, if any.
    fn find_active(
        &self,
        student_id: &StudentId,
        drive_id: &DriveId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn for_student(&self, student_id: &StudentId) -> Result<Vec<Application>, RepositoryError>;
    fn for_drive(&self, drive_id: &DriveId) -> Result<Vec<Application>, RepositoryError>;
    fn all(&self) -> Result<Vec<Application>, RepositoryError>;
    /// Apply every update or none of them. Fails with `VersionConflict` if any stored version
    /// moved past the update's `expected_version`.
    fn commit(&self, updates: Vec<ApplicationUpdate>) -> Result<(), RepositoryError>;
}

/// Staged replacement of one application, guarded by the version it was read at.
#[derive(Debug, Clone)]
pub struct ApplicationUpdate {
    pub expected_version: u64,
    pub application: Application,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record {0} was changed by another writer")]
    VersionConflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
