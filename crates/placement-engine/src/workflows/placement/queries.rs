//! Read-only projections over drives and applications.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, ActorRole, Application, ApplicationId, ApplicationStatus, ApplicationWindow, CompanyId,
    DriveId, DriveStatus, JobDrive, PackageCategory, StudentId, StudentSnapshot,
};
use super::error::{EntityKind, PlacementError};
use super::ledger::ApplicationLedger;
use super::ports::Collaborators;
use super::repository::{ApplicationRepository, DriveRepository};

/// Drive listing row with its application count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveListing {
    pub drive_id: DriveId,
    pub company_id: CompanyId,
    pub company_name: Option<String>,
    pub title: String,
    pub status: DriveStatus,
    pub package_category: PackageCategory,
    pub ctc_lpa: Option<f64>,
    pub vacancies: u32,
    pub window: Option<ApplicationWindow>,
    pub application_count: usize,
}

/// Published drive as seen by one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleDriveView {
    pub drive_id: DriveId,
    pub company_id: CompanyId,
    pub company_name: Option<String>,
    pub title: String,
    pub package_category: PackageCategory,
    pub ctc_lpa: Option<f64>,
    pub window: Option<ApplicationWindow>,
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub already_applied: bool,
    pub application_status: Option<ApplicationStatus>,
    pub can_apply: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantView {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub resume_ref: Option<String>,
    /// `None` when the profile store no longer knows the student.
    pub student: Option<StudentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentApplicationView {
    pub application_id: ApplicationId,
    pub drive_id: DriveId,
    pub drive_title: String,
    pub company_name: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementStatistics {
    pub total_drives: usize,
    pub drives_by_status: BTreeMap<String, usize>,
    pub total_applications: usize,
    pub applications_by_status: BTreeMap<String, usize>,
    /// Distinct students holding an accepted offer.
    pub placed_students: usize,
}

pub struct PlacementQueries<D, R> {
    ledger: Arc<ApplicationLedger<D, R>>,
    collaborators: Collaborators,
}

impl<D, R> PlacementQueries<D, R>
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    pub fn new(ledger: Arc<ApplicationLedger<D, R>>, collaborators: Collaborators) -> Self {
        Self {
            ledger,
            collaborators,
        }
    }

    /// Every published drive with a fresh eligibility verdict for `student_id`.
    pub fn eligible_drives(
        &self,
        actor: &Actor,
        student_id: &StudentId,
    ) -> Result<Vec<EligibleDriveView>, PlacementError> {
        require_student_or_admin(actor, student_id)?;

        let student = self
            .collaborators
            .students
            .student_snapshot(student_id)?
            .ok_or_else(|| PlacementError::not_found(EntityKind::Student, student_id))?;
        let applications = self.ledger.repository().for_student(student_id)?;
        let now = self.ledger.drives().now();
        let mut names = CompanyNames::new(&self.collaborators);

        let mut views = Vec::new();
        for drive in self.ledger.drives().list(Some(DriveStatus::Published))? {
            let verdict = self.ledger.evaluator().evaluate(&student, &drive);
            let current = applications
                .iter()
                .filter(|application| {
                    application.is_active() && application.drive_id == drive.drive_id
                })
                .last();
            let already_applied = current.is_some();

            views.push(EligibleDriveView {
                company_name: names.lookup(&drive.company_id)?,
                reasons: verdict.messages(),
                eligible: verdict.eligible,
                already_applied,
                application_status: current.map(|application| application.status),
                can_apply: verdict.eligible && !already_applied && drive.accepting_applications(now),
                drive_id: drive.drive_id,
                company_id: drive.company_id,
                title: drive.title,
                package_category: drive.package_category,
                ctc_lpa: drive.ctc_lpa,
                window: drive.window,
            });
        }
        Ok(views)
    }

    /// Applicants of a drive, joined with their current profile snapshot.
    pub fn applicants(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicantView>, PlacementError> {
        let drive = self.ledger.drives().get(drive_id)?;
        require_company_or_admin(actor, &drive.company_id, "view applicants")?;

        let mut views = Vec::new();
        for application in self.ledger.repository().for_drive(drive_id)? {
            if status.is_some_and(|wanted| application.status != wanted) {
                continue;
            }
            let student = self
                .collaborators
                .students
                .student_snapshot(&application.student_id)?;
            views.push(ApplicantView {
                application_id: application.application_id,
                student_id: application.student_id,
                status: application.status,
                applied_at: application.applied_at,
                resume_ref: application.resume_ref,
                student,
            });
        }
        Ok(views)
    }

    pub fn student_applications(
        &self,
        actor: &Actor,
        student_id: &StudentId,
    ) -> Result<Vec<StudentApplicationView>, PlacementError> {
        require_student_or_admin(actor, student_id)?;

        let mut names = CompanyNames::new(&self.collaborators);
        let mut drives: HashMap<DriveId, JobDrive> = HashMap::new();
        let mut views = Vec::new();
        for application in self.ledger.repository().for_student(student_id)? {
            if !drives.contains_key(&application.drive_id) {
                let drive = self.ledger.drives().get(&application.drive_id)?;
                drives.insert(drive.drive_id.clone(), drive);
            }
            let Some(drive) = drives.get(&application.drive_id) else {
                continue;
            };
            views.push(StudentApplicationView {
                updated_at: last_change(&application),
                company_name: names.lookup(&drive.company_id)?,
                drive_title: drive.title.clone(),
                application_id: application.application_id,
                drive_id: application.drive_id,
                status: application.status,
                applied_at: application.applied_at,
            });
        }
        Ok(views)
    }

    pub fn drives(&self, status: Option<DriveStatus>) -> Result<Vec<DriveListing>, PlacementError> {
        let drives = self.ledger.drives().list(status)?;
        self.listings(drives)
    }

    pub fn company_drives(
        &self,
        actor: &Actor,
        company_id: &CompanyId,
    ) -> Result<Vec<DriveListing>, PlacementError> {
        require_company_or_admin(actor, company_id, "view company drives")?;
        let drives = self
            .ledger
            .drives()
            .list(None)?
            .into_iter()
            .filter(|drive| &drive.company_id == company_id)
            .collect();
        self.listings(drives)
    }

    pub fn statistics(&self, actor: &Actor) -> Result<PlacementStatistics, PlacementError> {
        if actor.role != ActorRole::Admin {
            return Err(PlacementError::forbidden(actor, "view placement statistics"));
        }

        let drives = self.ledger.drives().list(None)?;
        let applications = self.ledger.repository().all()?;

        let mut drives_by_status: BTreeMap<String, usize> = DriveStatus::ordered()
            .into_iter()
            .map(|status| (status.label().to_string(), 0))
            .collect();
        for drive in &drives {
            *drives_by_status
                .entry(drive.status.label().to_string())
                .or_default() += 1;
        }

        let mut applications_by_status: BTreeMap<String, usize> = ApplicationStatus::ordered()
            .into_iter()
            .map(|status| (status.label().to_string(), 0))
            .collect();
        for application in &applications {
            *applications_by_status
                .entry(application.status.label().to_string())
                .or_default() += 1;
        }

        let placed_students = applications
            .iter()
            .filter(|application| application.status == ApplicationStatus::OfferAccepted)
            .map(|application| &application.student_id)
            .collect::<BTreeSet<_>>()
            .len();

        Ok(PlacementStatistics {
            total_drives: drives.len(),
            drives_by_status,
            total_applications: applications.len(),
            applications_by_status,
            placed_students,
        })
    }

    fn listings(&self, drives: Vec<JobDrive>) -> Result<Vec<DriveListing>, PlacementError> {
        let applications = self.ledger.repository().all()?;
        let mut counts: HashMap<&DriveId, usize> = HashMap::new();
        for application in &applications {
            *counts.entry(&application.drive_id).or_default() += 1;
        }

        let mut names = CompanyNames::new(&self.collaborators);
        let mut listings = Vec::with_capacity(drives.len());
        for drive in drives {
            listings.push(DriveListing {
                application_count: counts.get(&drive.drive_id).copied().unwrap_or(0),
                company_name: names.lookup(&drive.company_id)?,
                drive_id: drive.drive_id,
                company_id: drive.company_id,
                title: drive.title,
                status: drive.status,
                package_category: drive.package_category,
                ctc_lpa: drive.ctc_lpa,
                vacancies: drive.vacancies,
                window: drive.window,
            });
        }
        Ok(listings)
    }
}

/// Per-call cache of company display names.
struct CompanyNames<'a> {
    collaborators: &'a Collaborators,
    cache: HashMap<CompanyId, Option<String>>,
}

impl<'a> CompanyNames<'a> {
    fn new(collaborators: &'a Collaborators) -> Self {
        Self {
            collaborators,
            cache: HashMap::new(),
        }
    }

    fn lookup(&mut self, company_id: &CompanyId) -> Result<Option<String>, PlacementError> {
        if let Some(name) = self.cache.get(company_id) {
            return Ok(name.clone());
        }
        let name = self
            .collaborators
            .companies
            .company(company_id)?
            .map(|profile| profile.name);
        self.cache.insert(company_id.clone(), name.clone());
        Ok(name)
    }
}

fn last_change(application: &Application) -> DateTime<Utc> {
    application
        .history
        .last()
        .map(|change| change.at)
        .unwrap_or(application.applied_at)
}

fn require_student_or_admin(actor: &Actor, student_id: &StudentId) -> Result<(), PlacementError> {
    if actor.is_student(student_id) || actor.role == ActorRole::Admin {
        Ok(())
    } else {
        Err(PlacementError::forbidden(
            actor,
            format!("view records of student {student_id}"),
        ))
    }
}

fn require_company_or_admin(
    actor: &Actor,
    company_id: &CompanyId,
    action: &str,
) -> Result<(), PlacementError> {
    if actor.is_company(company_id) || actor.role == ActorRole::Admin {
        Ok(())
    } else {
        Err(PlacementError::forbidden(actor, action))
    }
}
