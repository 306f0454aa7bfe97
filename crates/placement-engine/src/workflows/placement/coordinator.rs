use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, DriveId, DriveStatus, JobDrive, StudentId,
};
use super::error::PlacementError;
use super::ledger::{self, ApplicationLedger, StagedApplication};
use super::repository::{ApplicationRepository, DriveRepository, RepositoryError};
use super::transitions;

/// Final decision for one student on a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    Selected,
    Rejected,
}

impl SelectionOutcome {
    const fn status(self) -> ApplicationStatus {
        match self {
            SelectionOutcome::Selected => ApplicationStatus::Selected,
            SelectionOutcome::Rejected => ApplicationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDecision {
    pub student_id: StudentId,
    pub outcome: SelectionOutcome,
}

/// Application that ended the batch in the requested status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedEntry {
    pub student_id: StudentId,
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    /// False when the application already held the requested status.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub student_id: StudentId,
    pub reason: String,
}

/// Per-student result of a batch submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub accepted: Vec<AcceptedEntry>,
    pub rejected: Vec<RejectedEntry>,
}

impl BatchOutcome {
    pub fn changed(&self) -> usize {
        self.accepted.iter().filter(|entry| entry.changed).count()
    }
}

enum Plan {
    Unchanged,
    Advance(Vec<ApplicationStatus>),
    Refuse(String),
}

/// Applies company shortlist and selection batches to every application on a drive.
///
/// A batch is validated as a whole (drive state, ownership) and then per student. Students that
/// fail their own checks are reported in `rejected`; everyone else is committed together.
pub struct SelectionCoordinator<D, R> {
    ledger: Arc<ApplicationLedger<D, R>>,
}

impl<D, R> SelectionCoordinator<D, R>
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    pub fn new(ledger: Arc<ApplicationLedger<D, R>>) -> Self {
        Self { ledger }
    }

    /// Move each listed student's application to `shortlisted`, passing through `under_review`.
    pub fn submit_shortlist(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        student_ids: Vec<StudentId>,
    ) -> Result<BatchOutcome, PlacementError> {
        let requests = student_ids
            .into_iter()
            .map(|student_id| (student_id, ApplicationStatus::Shortlisted))
            .collect();
        self.submit(actor, drive_id, requests, "shortlist")
    }

    /// Record `selected` or `rejected` for each shortlisted student.
    pub fn submit_final_selection(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        decisions: Vec<SelectionDecision>,
    ) -> Result<BatchOutcome, PlacementError> {
        let requests = decisions
            .into_iter()
            .map(|decision| (decision.student_id, decision.outcome.status()))
            .collect();
        self.submit(actor, drive_id, requests, "final selection")
    }

    fn submit(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        requests: Vec<(StudentId, ApplicationStatus)>,
        batch: &str,
    ) -> Result<BatchOutcome, PlacementError> {
        if requests.is_empty() {
            return Err(PlacementError::Validation(format!(
                "{batch} must name at least one student"
            )));
        }

        let drives = self.ledger.drives();
        let drive = drives.get(drive_id)?;
        authorize(actor, &drive, batch)?;

        let gate = drives.admission_gate(drive_id);
        let _admission = gate.read().unwrap_or_else(PoisonError::into_inner);
        let gates = self
            .ledger
            .student_gates()
            .gates(requests.iter().map(|(student_id, _)| student_id));
        let _students = ledger::hold(&gates);

        for attempt in 1..=self.ledger.max_commit_attempts() {
            let drive = drives.get(drive_id)?;
            ensure_submissions_open(&drive)?;

            let applications = self.ledger.repository().for_drive(drive_id)?;
            let now = drives.now();
            let mut outcome = BatchOutcome::default();
            let mut staged = Vec::new();
            let mut seen = HashSet::new();

            for (student_id, target) in &requests {
                if !seen.insert(student_id.clone()) {
                    outcome.rejected.push(RejectedEntry {
                        student_id: student_id.clone(),
                        reason: "listed more than once".to_string(),
                    });
                    continue;
                }

                let Some(application) = applications.iter().rev().find(|application| {
                    application.is_active() && &application.student_id == student_id
                }) else {
                    outcome.rejected.push(RejectedEntry {
                        student_id: student_id.clone(),
                        reason: "no active application on this drive".to_string(),
                    });
                    continue;
                };

                let plan = match plan(application.status, *target) {
                    Plan::Advance(path) if *target == ApplicationStatus::Selected => {
                        match self.ledger.offer_held_elsewhere(application)? {
                            Some(held) => Plan::Refuse(format!(
                                "student already holds an offer on drive {} ({})",
                                held.drive_id, held.status
                            )),
                            None => Plan::Advance(path),
                        }
                    }
                    other => other,
                };

                match plan {
                    Plan::Unchanged => outcome.accepted.push(AcceptedEntry {
                        student_id: student_id.clone(),
                        application_id: application.application_id.clone(),
                        status: application.status,
                        changed: false,
                    }),
                    Plan::Advance(path) => {
                        let mut entry = StagedApplication::begin(application.clone());
                        for status in path {
                            entry.push(status, actor, None, now);
                        }
                        staged.push(entry);
                        outcome.accepted.push(AcceptedEntry {
                            student_id: student_id.clone(),
                            application_id: application.application_id.clone(),
                            status: *target,
                            changed: true,
                        });
                    }
                    Plan::Refuse(reason) => outcome.rejected.push(RejectedEntry {
                        student_id: student_id.clone(),
                        reason,
                    }),
                }
            }

            match self.ledger.commit_staged(staged) {
                Ok(_) => {
                    info!(
                        drive_id = %drive_id,
                        batch,
                        changed = outcome.changed(),
                        rejected = outcome.rejected.len(),
                        "batch submission committed"
                    );
                    return Ok(outcome);
                }
                Err(RepositoryError::VersionConflict(id)) => {
                    debug!(
                        drive_id = %drive_id,
                        conflicting = %id,
                        attempt,
                        "batch raced a concurrent change, re-validating"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(PlacementError::ConcurrentModification {
            entity: format!("{batch} for drive {drive_id}"),
        })
    }

}

fn plan(current: ApplicationStatus, target: ApplicationStatus) -> Plan {
    use ApplicationStatus::*;

    if current == target {
        return Plan::Unchanged;
    }
    if current.is_terminal() {
        return Plan::Refuse(format!("application is already {current}"));
    }

    let eligible_sources: &[ApplicationStatus] = match target {
        Shortlisted => &[Applied, UnderReview],
        Selected => &[Shortlisted, InterviewScheduled],
        Rejected => return Plan::Advance(vec![Rejected]),
        _ => &[],
    };
    if !eligible_sources.contains(&current) {
        return Plan::Refuse(format!("application is {current}, cannot move to {target}"));
    }

    match transitions::forward_path(current, target) {
        Some(path) => Plan::Advance(path),
        None => Plan::Refuse(format!("application is {current}, cannot move to {target}")),
    }
}

fn authorize(actor: &Actor, drive: &JobDrive, batch: &str) -> Result<(), PlacementError> {
    let permitted = match actor.role {
        ActorRole::Company => actor.is_company(&drive.company_id),
        ActorRole::Admin => true,
        ActorRole::Student | ActorRole::System => false,
    };
    if permitted {
        Ok(())
    } else {
        Err(PlacementError::forbidden(
            actor,
            format!("submit {batch} for drive {}", drive.drive_id),
        ))
    }
}

fn ensure_submissions_open(drive: &JobDrive) -> Result<(), PlacementError> {
    match drive.status {
        DriveStatus::Published => Ok(()),
        DriveStatus::Locked | DriveStatus::Closed => Err(PlacementError::DriveLocked {
            drive_id: drive.drive_id.clone(),
            status: drive.status,
        }),
        DriveStatus::Draft => Err(PlacementError::DriveNotOpen {
            drive_id: drive.drive_id.clone(),
            reason: "drive has not been published".to_string(),
        }),
    }
}
