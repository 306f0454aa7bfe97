use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::clock::Clock;
use super::config::EngineConfig;
use super::domain::{
    Actor, ActorRole, ApplicationWindow, CompanyId, DriveId, DriveStatus, DriveStatusChange,
    EligibilityCriteria, JobDrive, PackageCategory,
};
use super::error::{EntityKind, PlacementError};
use super::ports::{AuditEvent, AuditSubject, Collaborators};
use super::repository::{DriveRepository, RepositoryError};

/// Admin input for a new draft drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveDraft {
    pub company_id: CompanyId,
    pub title: String,
    #[serde(default)]
    pub criteria: EligibilityCriteria,
    pub vacancies: u32,
    pub package_category: PackageCategory,
    #[serde(default)]
    pub ctc_lpa: Option<f64>,
}

/// Owns job drives and their publication state machine: draft -> published -> locked -> closed.
///
/// Each drive also has an admission gate. Operations that must not straddle a lock (applying,
/// batch submissions) hold the read side while they validate and commit; `lock` and `close`
/// take the write side, so once either returns no later admission can observe the old status.
pub struct DriveRegistry<D> {
    repository: Arc<D>,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    max_commit_attempts: u32,
    gates: Mutex<HashMap<DriveId, Arc<RwLock<()>>>>,
    sequence: AtomicU64,
}

impl<D> DriveRegistry<D>
where
    D: DriveRepository + 'static,
{
    pub fn new(
        repository: Arc<D>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repository,
            collaborators,
            clock,
            max_commit_attempts: config.max_commit_attempts.max(1),
            gates: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn create_draft(&self, actor: &Actor, draft: DriveDraft) -> Result<JobDrive, PlacementError> {
        require_admin(actor, "create drives")?;
        validate_draft(&draft)?;

        if self.collaborators.companies.company(&draft.company_id)?.is_none() {
            return Err(PlacementError::not_found(
                EntityKind::Company,
                &draft.company_id,
            ));
        }

        let now = self.clock.now();
        let drive_id = DriveId(format!(
            "drive-{:04}",
            self.sequence.fetch_add(1, Ordering::Relaxed)
        ));
        let change = DriveStatusChange {
            status: DriveStatus::Draft,
            at: now,
            actor: actor.clone(),
        };
        let drive = JobDrive {
            drive_id,
            company_id: draft.company_id,
            title: draft.title.trim().to_string(),
            status: DriveStatus::Draft,
            criteria: draft.criteria,
            vacancies: draft.vacancies,
            package_category: draft.package_category,
            ctc_lpa: draft.ctc_lpa,
            window: None,
            created_at: now,
            updated_at: now,
            version: 1,
            history: vec![change.clone()],
        };

        let stored = self.repository.insert(drive)?;
        self.announce(&stored.drive_id, &change);
        info!(drive_id = %stored.drive_id, company_id = %stored.company_id, "draft drive created");
        Ok(stored)
    }

    /// `draft -> published`. The window must satisfy `now < opens_at < closes_at`.
    pub fn publish(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    ) -> Result<JobDrive, PlacementError> {
        require_admin(actor, "publish drives")?;
        let window = ApplicationWindow { opens_at, closes_at };
        self.advance(actor, drive_id, DriveStatus::Published, Some(window))
    }

    /// `published -> locked`. Irreversible; repeating it on a locked drive is a no-op.
    pub fn lock(&self, actor: &Actor, drive_id: &DriveId) -> Result<JobDrive, PlacementError> {
        require_admin(actor, "lock drives")?;
        self.advance(actor, drive_id, DriveStatus::Locked, None)
    }

    /// `locked -> closed`. Terminal; repeating it on a closed drive is a no-op.
    pub fn close(&self, actor: &Actor, drive_id: &DriveId) -> Result<JobDrive, PlacementError> {
        require_admin(actor, "close drives")?;
        self.advance(actor, drive_id, DriveStatus::Closed, None)
    }

    pub fn get(&self, drive_id: &DriveId) -> Result<JobDrive, PlacementError> {
        self.repository
            .fetch(drive_id)?
            .ok_or_else(|| PlacementError::not_found(EntityKind::Drive, drive_id))
    }

    pub fn list(&self, status: Option<DriveStatus>) -> Result<Vec<JobDrive>, PlacementError> {
        let drives = self.repository.list()?;
        Ok(drives
            .into_iter()
            .filter(|drive| status.map_or(true, |wanted| drive.status == wanted))
            .collect())
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn admission_gate(&self, drive_id: &DriveId) -> Arc<RwLock<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(drive_id.clone()).or_default().clone()
    }

    fn advance(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        target: DriveStatus,
        window: Option<ApplicationWindow>,
    ) -> Result<JobDrive, PlacementError> {
        let gate = self.admission_gate(drive_id);
        let _exclusive = gate.write().unwrap_or_else(PoisonError::into_inner);

        for attempt in 1..=self.max_commit_attempts {
            let mut drive = self.get(drive_id)?;

            if drive.status == target && target.is_frozen() {
                return Ok(drive);
            }
            if predecessor(target) != Some(drive.status) {
                return Err(PlacementError::InvalidTransition {
                    drive_id: drive_id.clone(),
                    from: drive.status,
                    to: target,
                });
            }

            let now = self.clock.now();
            if let Some(window) = window {
                if !(now < window.opens_at && window.opens_at < window.closes_at) {
                    return Err(PlacementError::InvalidWindow {
                        opens_at: window.opens_at,
                        closes_at: window.closes_at,
                    });
                }
                drive.window = Some(window);
            }

            let expected_version = drive.version;
            let change = DriveStatusChange {
                status: target,
                at: now,
                actor: actor.clone(),
            };
            drive.status = target;
            drive.updated_at = now;
            drive.version += 1;
            drive.history.push(change.clone());

            match self.repository.update(drive.clone(), expected_version) {
                Ok(()) => {
                    self.announce(drive_id, &change);
                    info!(
                        drive_id = %drive_id,
                        status = target.label(),
                        actor = actor.role.label(),
                        "drive transitioned"
                    );
                    return Ok(drive);
                }
                Err(RepositoryError::VersionConflict(_)) => {
                    debug!(drive_id = %drive_id, attempt, "drive version moved, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(PlacementError::ConcurrentModification {
            entity: format!("drive {drive_id}"),
        })
    }

    fn announce(&self, drive_id: &DriveId, change: &DriveStatusChange) {
        self.collaborators.publish(AuditEvent {
            subject: AuditSubject::Drive(drive_id.clone()),
            status: change.status.label().to_string(),
            actor: change.actor.clone(),
            at: change.at,
            note: None,
        });
    }
}

fn predecessor(status: DriveStatus) -> Option<DriveStatus> {
    match status {
        DriveStatus::Draft => None,
        DriveStatus::Published => Some(DriveStatus::Draft),
        DriveStatus::Locked => Some(DriveStatus::Published),
        DriveStatus::Closed => Some(DriveStatus::Locked),
    }
}

fn require_admin(actor: &Actor, action: &str) -> Result<(), PlacementError> {
    if actor.role == ActorRole::Admin {
        Ok(())
    } else {
        Err(PlacementError::forbidden(actor, action))
    }
}

fn validate_draft(draft: &DriveDraft) -> Result<(), PlacementError> {
    if draft.title.trim().is_empty() {
        return Err(PlacementError::Validation("drive title is required".to_string()));
    }
    if draft.vacancies == 0 {
        return Err(PlacementError::Validation(
            "vacancy count must be at least 1".to_string(),
        ));
    }
    if let Some(min_cgpa) = draft.criteria.min_cgpa {
        if !(0.0..=10.0).contains(&min_cgpa) {
            return Err(PlacementError::Validation(format!(
                "minimum CGPA {min_cgpa} is outside the 0-10 scale"
            )));
        }
    }
    for (label, value) in [
        ("10th", draft.criteria.min_tenth_percentage),
        ("12th", draft.criteria.min_twelfth_percentage),
    ] {
        if let Some(value) = value {
            if !(0.0..=100.0).contains(&value) {
                return Err(PlacementError::Validation(format!(
                    "minimum {label} percentage {value} is outside 0-100"
                )));
            }
        }
    }
    if draft.ctc_lpa.is_some_and(|ctc| !ctc.is_finite() || ctc < 0.0) {
        return Err(PlacementError::Validation(
            "CTC must be a non-negative amount".to_string(),
        ));
    }
    Ok(())
}
