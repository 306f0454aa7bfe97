use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::{EngineConfig, OfferExclusivity};
use super::domain::{
    Actor, ActorRole, Application, ApplicationId, ApplicationStatus, DriveId, DriveStatus,
    JobDrive, PlacementStatus, StatusChange, StudentId, StudentSnapshot,
};
use super::eligibility::CriteriaEvaluator;
use super::error::{EntityKind, PlacementError};
use super::ports::{AuditEvent, AuditSubject, Collaborators};
use super::registry::DriveRegistry;
use super::repository::{
    ApplicationRepository, ApplicationUpdate, DriveRepository, RepositoryError,
};
use super::transitions;

pub(crate) const AUTO_WITHDRAW_NOTE: &str = "auto-withdrawn: student placed elsewhere";

/// Student request to apply to a drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub student_id: StudentId,
    pub drive_id: DriveId,
    #[serde(default)]
    pub resume_ref: Option<String>,
}

/// Owns application records and their status state machine.
pub struct ApplicationLedger<D, R> {
    drives: Arc<DriveRegistry<D>>,
    repository: Arc<R>,
    evaluator: CriteriaEvaluator,
    collaborators: Collaborators,
    exclusivity: OfferExclusivity,
    max_commit_attempts: u32,
    student_gates: StudentGates,
    sequence: AtomicU64,
}

impl<D, R> ApplicationLedger<D, R>
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    pub fn new(
        drives: Arc<DriveRegistry<D>>,
        repository: Arc<R>,
        evaluator: CriteriaEvaluator,
        collaborators: Collaborators,
        config: &EngineConfig,
    ) -> Self {
        Self {
            drives,
            repository,
            evaluator,
            collaborators,
            exclusivity: config.offer_exclusivity,
            max_commit_attempts: config.max_commit_attempts.max(1),
            student_gates: StudentGates::default(),
            sequence: AtomicU64::new(1),
        }
    }

    /// Submit a new application after re-checking drive status, duplicates, and eligibility.
    pub fn apply(&self, actor: &Actor, request: ApplyRequest) -> Result<Application, PlacementError> {
        let ApplyRequest {
            student_id,
            drive_id,
            resume_ref,
        } = request;

        if !actor.is_student(&student_id) {
            return Err(PlacementError::forbidden(
                actor,
                format!("apply on behalf of student {student_id}"),
            ));
        }

        self.drives.get(&drive_id)?;
        let gate = self.drives.admission_gate(&drive_id);
        let _admission = gate.read().unwrap_or_else(PoisonError::into_inner);

        let drive = self.drives.get(&drive_id)?;
        let now = self.drives.now();
        ensure_accepting(&drive, now)?;

        let snapshot = self
            .collaborators
            .students
            .student_snapshot(&student_id)?
            .ok_or_else(|| PlacementError::not_found(EntityKind::Student, &student_id))?;

        let gates = self.student_gates.gates([&student_id]);
        let _student = hold(&gates);

        if self.repository.find_active(&student_id, &drive_id)?.is_some() {
            return Err(PlacementError::AlreadyApplied {
                student_id,
                drive_id,
            });
        }

        let student = self.with_committed_placement(snapshot)?;
        let verdict = self.evaluator.evaluate(&student, &drive);
        if !verdict.eligible {
            return Err(PlacementError::Ineligible {
                reasons: verdict.messages(),
            });
        }

        let application = Application::submitted(
            self.next_application_id(),
            student_id.clone(),
            drive_id.clone(),
            resume_ref,
            actor.clone(),
            now,
        );

        let stored = match self.repository.insert(application) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Err(PlacementError::AlreadyApplied {
                    student_id,
                    drive_id,
                })
            }
            Err(other) => return Err(other.into()),
        };

        for change in &stored.history {
            self.announce(&stored.application_id, change);
        }
        info!(
            application_id = %stored.application_id,
            student_id = %stored.student_id,
            drive_id = %stored.drive_id,
            "application submitted"
        );
        Ok(stored)
    }

    /// Move one application along the edge table.
    ///
    /// Reaching `offer_accepted` withdraws every other non-terminal application of the student
    /// in the same commit and then notifies the profile store.
    pub fn transition(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        target: ApplicationStatus,
        note: Option<String>,
    ) -> Result<Application, PlacementError> {
        let Application {
            drive_id,
            student_id,
            ..
        } = self.get(application_id)?;
        let gate = self.drives.admission_gate(&drive_id);
        let _admission = gate.read().unwrap_or_else(PoisonError::into_inner);
        let gates = self.student_gates.gates([&student_id]);
        let _student = hold(&gates);

        for attempt in 1..=self.max_commit_attempts {
            let current = self.get(application_id)?;
            let drive = self.drives.get(&drive_id)?;

            authorize(actor, &current, &drive, target)?;
            if drive.status.is_frozen() && !target.permitted_after_lock() {
                return Err(PlacementError::DriveLocked {
                    drive_id: drive.drive_id,
                    status: drive.status,
                });
            }
            if !transitions::is_allowed(current.status, target) {
                return Err(PlacementError::InvalidStatusTransition {
                    application_id: application_id.clone(),
                    from: current.status,
                    to: target,
                });
            }
            if target == ApplicationStatus::Selected {
                if let Some(held) = self.offer_held_elsewhere(&current)? {
                    return Err(PlacementError::OfferConflict {
                        student_id,
                        held_drive_id: held.drive_id,
                        held_status: held.status,
                    });
                }
            }

            let now = self.drives.now();
            let mut primary = StagedApplication::begin(current);
            primary.push(target, actor, note.clone(), now);
            let mut staged = vec![primary];

            if target == ApplicationStatus::OfferAccepted {
                for other in self.repository.for_student(&student_id)? {
                    if other.application_id == *application_id || other.status.is_terminal() {
                        continue;
                    }
                    let mut withdrawal = StagedApplication::begin(other);
                    withdrawal.push(
                        ApplicationStatus::Withdrawn,
                        &Actor::system(),
                        Some(AUTO_WITHDRAW_NOTE.to_string()),
                        now,
                    );
                    staged.push(withdrawal);
                }
            }

            match self.commit_staged(staged) {
                Ok(committed) => {
                    let application = committed.into_iter().next().ok_or_else(|| {
                        PlacementError::not_found(EntityKind::Application, application_id)
                    })?;
                    if target == ApplicationStatus::OfferAccepted {
                        self.notify_placed(&application, &drive);
                    }
                    return Ok(application);
                }
                Err(RepositoryError::VersionConflict(id)) => {
                    debug!(
                        application_id = %application_id,
                        conflicting = %id,
                        attempt,
                        "application version moved, re-validating"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(PlacementError::ConcurrentModification {
            entity: format!("application {application_id}"),
        })
    }

    pub fn accept_offer(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, PlacementError> {
        self.transition(actor, application_id, ApplicationStatus::OfferAccepted, None)
    }

    pub fn decline_offer(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, PlacementError> {
        self.transition(actor, application_id, ApplicationStatus::OfferDeclined, None)
    }

    pub fn withdraw(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        note: Option<String>,
    ) -> Result<Application, PlacementError> {
        self.transition(actor, application_id, ApplicationStatus::Withdrawn, note)
    }

    pub fn get(&self, application_id: &ApplicationId) -> Result<Application, PlacementError> {
        self.repository
            .fetch(application_id)?
            .ok_or_else(|| PlacementError::not_found(EntityKind::Application, application_id))
    }

    /// Read one application on behalf of its student, the company running the drive, or an admin.
    pub fn view(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, PlacementError> {
        let application = self.get(application_id)?;
        let permitted = match actor.role {
            ActorRole::Student => actor.is_student(&application.student_id),
            ActorRole::Company => {
                actor.is_company(&self.drives.get(&application.drive_id)?.company_id)
            }
            ActorRole::Admin | ActorRole::System => true,
        };
        if permitted {
            Ok(application)
        } else {
            Err(PlacementError::forbidden(
                actor,
                format!("read application {application_id}"),
            ))
        }
    }

    /// Another application of the same student that blocks a new selection under `AtSelection`.
    ///
    /// Callers must hold the student's gate so the answer stays valid until their commit.
    pub(crate) fn offer_held_elsewhere(
        &self,
        application: &Application,
    ) -> Result<Option<Application>, PlacementError> {
        if self.exclusivity != OfferExclusivity::AtSelection {
            return Ok(None);
        }

        Ok(self
            .repository
            .for_student(&application.student_id)?
            .into_iter()
            .find(|other| {
                other.application_id != application.application_id
                    && matches!(
                        other.status,
                        ApplicationStatus::Selected | ApplicationStatus::OfferAccepted
                    )
            }))
    }

    pub(crate) fn student_gates(&self) -> &StudentGates {
        &self.student_gates
    }

    pub(crate) fn drives(&self) -> &DriveRegistry<D> {
        &self.drives
    }

    pub(crate) fn repository(&self) -> &R {
        &self.repository
    }

    pub(crate) fn evaluator(&self) -> &CriteriaEvaluator {
        &self.evaluator
    }

    pub(crate) fn max_commit_attempts(&self) -> u32 {
        self.max_commit_attempts
    }

    /// Commit staged applications together, then forward every new history entry to the audit sink.
    pub(crate) fn commit_staged(
        &self,
        staged: Vec<StagedApplication>,
    ) -> Result<Vec<Application>, RepositoryError> {
        if staged.is_empty() {
            return Ok(Vec::new());
        }

        let updates = staged
            .iter()
            .map(|entry| ApplicationUpdate {
                expected_version: entry.expected_version,
                application: entry.application.clone(),
            })
            .collect();
        self.repository.commit(updates)?;

        let mut committed = Vec::with_capacity(staged.len());
        for entry in staged {
            for change in &entry.application.history[entry.first_new_entry..] {
                self.announce(&entry.application.application_id, change);
                info!(
                    application_id = %entry.application.application_id,
                    student_id = %entry.application.student_id,
                    drive_id = %entry.application.drive_id,
                    status = change.status.label(),
                    actor = change.actor.role.label(),
                    "application status recorded"
                );
            }
            committed.push(entry.application);
        }
        Ok(committed)
    }

    /// The acceptance is already committed, so a profile store failure is logged, not returned.
    fn notify_placed(&self, application: &Application, drive: &JobDrive) {
        if let Err(error) = self.collaborators.students.mark_placed(
            &application.student_id,
            &drive.drive_id,
            drive.package_category,
        ) {
            warn!(
                application_id = %application.application_id,
                student_id = %application.student_id,
                %error,
                "offer accepted but placement status not synced"
            );
        }
    }

    /// Treat an accepted offer in the ledger as authoritative even if the profile store lags.
    fn with_committed_placement(
        &self,
        mut student: StudentSnapshot,
    ) -> Result<StudentSnapshot, PlacementError> {
        let accepted = self
            .repository
            .for_student(&student.student_id)?
            .into_iter()
            .find(|application| application.status == ApplicationStatus::OfferAccepted);
        if let Some(accepted) = accepted {
            let drive = self.drives.get(&accepted.drive_id)?;
            student.placement_status = PlacementStatus::Placed {
                category: Some(drive.package_category),
            };
        }
        Ok(student)
    }

    fn announce(&self, application_id: &ApplicationId, change: &StatusChange) {
        self.collaborators.publish(AuditEvent {
            subject: AuditSubject::Application(application_id.clone()),
            status: change.status.label().to_string(),
            actor: change.actor.clone(),
            at: change.at,
            note: change.note.clone(),
        });
    }

    fn next_application_id(&self) -> ApplicationId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        ApplicationId(format!("app-{id:06}"))
    }
}

/// Application copy with pending history entries, guarded by the version it was read at.
pub(crate) struct StagedApplication {
    expected_version: u64,
    first_new_entry: usize,
    application: Application,
}

impl StagedApplication {
    pub(crate) fn begin(application: Application) -> Self {
        Self {
            expected_version: application.version,
            first_new_entry: application.history.len(),
            application,
        }
    }

    pub(crate) fn push(
        &mut self,
        status: ApplicationStatus,
        actor: &Actor,
        note: Option<String>,
        at: DateTime<Utc>,
    ) {
        if self.application.history.len() == self.first_new_entry {
            self.application.version += 1;
        }
        self.application.record(StatusChange {
            status,
            at,
            actor: actor.clone(),
            note,
        });
    }
}

/// Per-student mutexes serializing operations that read a student's other applications and then
/// commit: applying, accepting an offer and selecting under `AtSelection`.
///
/// Always acquired after the drive admission gate, never before it.
#[derive(Default)]
pub(crate) struct StudentGates {
    gates: Mutex<HashMap<StudentId, Arc<Mutex<()>>>>,
}

impl StudentGates {
    /// Gates for `students`, deduplicated and in id order so overlapping callers cannot deadlock.
    pub(crate) fn gates<'a>(
        &self,
        students: impl IntoIterator<Item = &'a StudentId>,
    ) -> Vec<Arc<Mutex<()>>> {
        let ordered: BTreeSet<&StudentId> = students.into_iter().collect();
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        ordered
            .into_iter()
            .map(|student_id| Arc::clone(gates.entry(student_id.clone()).or_default()))
            .collect()
    }
}

pub(crate) fn hold(gates: &[Arc<Mutex<()>>]) -> Vec<MutexGuard<'_, ()>> {
    gates
        .iter()
        .map(|gate| gate.lock().unwrap_or_else(PoisonError::into_inner))
        .collect()
}

pub(crate) fn ensure_accepting(drive: &JobDrive, now: DateTime<Utc>) -> Result<(), PlacementError> {
    match drive.status {
        DriveStatus::Locked | DriveStatus::Closed => Err(PlacementError::DriveLocked {
            drive_id: drive.drive_id.clone(),
            status: drive.status,
        }),
        DriveStatus::Draft => Err(PlacementError::DriveNotOpen {
            drive_id: drive.drive_id.clone(),
            reason: "drive has not been published".to_string(),
        }),
        DriveStatus::Published => match drive.window {
            Some(window) if window.contains(now) => Ok(()),
            Some(window) if now < window.opens_at => Err(PlacementError::DriveNotOpen {
                drive_id: drive.drive_id.clone(),
                reason: format!("applications open at {}", window.opens_at),
            }),
            Some(window) => Err(PlacementError::DriveNotOpen {
                drive_id: drive.drive_id.clone(),
                reason: format!("applications closed at {}", window.closes_at),
            }),
            None => Err(PlacementError::DriveNotOpen {
                drive_id: drive.drive_id.clone(),
                reason: "no application window".to_string(),
            }),
        },
    }
}

fn authorize(
    actor: &Actor,
    application: &Application,
    drive: &JobDrive,
    target: ApplicationStatus,
) -> Result<(), PlacementError> {
    let action = || format!("move application {} to {}", application.application_id, target);

    if !transitions::permitted_roles(target).contains(&actor.role) {
        return Err(PlacementError::forbidden(actor, action()));
    }

    let owns = match actor.role {
        ActorRole::Student => actor.is_student(&application.student_id),
        ActorRole::Company => actor.is_company(&drive.company_id),
        ActorRole::Admin | ActorRole::System => true,
    };
    if owns {
        Ok(())
    } else {
        Err(PlacementError::forbidden(actor, action()))
    }
}
