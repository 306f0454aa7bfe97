use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::clock::Clock;
use super::config::EngineConfig;
use super::coordinator::{BatchOutcome, SelectionCoordinator, SelectionDecision};
use super::domain::{
    Actor, Application, ApplicationId, ApplicationStatus, CompanyId, DriveId, DriveStatus,
    JobDrive, StudentId,
};
use super::eligibility::{CriteriaEvaluator, EligibilityVerdict};
use super::error::{EntityKind, PlacementError};
use super::ledger::{ApplicationLedger, ApplyRequest};
use super::ports::Collaborators;
use super::queries::{
    ApplicantView, DriveListing, EligibleDriveView, PlacementQueries, PlacementStatistics,
    StudentApplicationView,
};
use super::registry::{DriveDraft, DriveRegistry};
use super::repository::{ApplicationRepository, DriveRepository};

/// Service composing the drive registry, application ledger, selection coordinator, and queries
/// over one pair of repositories.
pub struct PlacementService<D, R> {
    registry: Arc<DriveRegistry<D>>,
    ledger: Arc<ApplicationLedger<D, R>>,
    coordinator: SelectionCoordinator<D, R>,
    queries: PlacementQueries<D, R>,
    collaborators: Collaborators,
}

impl<D, R> PlacementService<D, R>
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    pub fn new(
        drives: Arc<D>,
        applications: Arc<R>,
        collaborators: Collaborators,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let evaluator = CriteriaEvaluator::new(Arc::new(config.placed_student_policy));
        Self::with_evaluator(drives, applications, collaborators, config, clock, evaluator)
    }

    /// Build the service around a custom evaluator, e.g. one with a bespoke placement policy.
    pub fn with_evaluator(
        drives: Arc<D>,
        applications: Arc<R>,
        collaborators: Collaborators,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        evaluator: CriteriaEvaluator,
    ) -> Self {
        let registry = Arc::new(DriveRegistry::new(
            drives,
            collaborators.clone(),
            clock,
            &config,
        ));
        let ledger = Arc::new(ApplicationLedger::new(
            Arc::clone(&registry),
            applications,
            evaluator,
            collaborators.clone(),
            &config,
        ));
        let coordinator = SelectionCoordinator::new(Arc::clone(&ledger));
        let queries = PlacementQueries::new(Arc::clone(&ledger), collaborators.clone());

        Self {
            registry,
            ledger,
            coordinator,
            queries,
            collaborators,
        }
    }

    pub fn create_drive(&self, actor: &Actor, draft: DriveDraft) -> Result<JobDrive, PlacementError> {
        self.registry.create_draft(actor, draft)
    }

    pub fn publish_drive(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    ) -> Result<JobDrive, PlacementError> {
        self.registry.publish(actor, drive_id, opens_at, closes_at)
    }

    pub fn lock_drive(&self, actor: &Actor, drive_id: &DriveId) -> Result<JobDrive, PlacementError> {
        self.registry.lock(actor, drive_id)
    }

    pub fn close_drive(&self, actor: &Actor, drive_id: &DriveId) -> Result<JobDrive, PlacementError> {
        self.registry.close(actor, drive_id)
    }

    pub fn drive(&self, drive_id: &DriveId) -> Result<JobDrive, PlacementError> {
        self.registry.get(drive_id)
    }

    pub fn drives(&self, status: Option<DriveStatus>) -> Result<Vec<DriveListing>, PlacementError> {
        self.queries.drives(status)
    }

    pub fn company_drives(
        &self,
        actor: &Actor,
        company_id: &CompanyId,
    ) -> Result<Vec<DriveListing>, PlacementError> {
        self.queries.company_drives(actor, company_id)
    }

    /// Evaluate one student against one drive without applying.
    pub fn check_eligibility(
        &self,
        student_id: &StudentId,
        drive_id: &DriveId,
    ) -> Result<EligibilityVerdict, PlacementError> {
        let drive = self.registry.get(drive_id)?;
        let student = self
            .collaborators
            .students
            .student_snapshot(student_id)?
            .ok_or_else(|| PlacementError::not_found(EntityKind::Student, student_id))?;
        Ok(self.ledger.evaluator().evaluate(&student, &drive))
    }

    pub fn eligible_drives(
        &self,
        actor: &Actor,
        student_id: &StudentId,
    ) -> Result<Vec<EligibleDriveView>, PlacementError> {
        self.queries.eligible_drives(actor, student_id)
    }

    pub fn apply(&self, actor: &Actor, request: ApplyRequest) -> Result<Application, PlacementError> {
        self.ledger.apply(actor, request)
    }

    pub fn application(&self, application_id: &ApplicationId) -> Result<Application, PlacementError> {
        self.ledger.get(application_id)
    }

    /// Read an application as `actor`; only its student, the drive's company, or an admin may.
    pub fn application_for(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, PlacementError> {
        self.ledger.view(actor, application_id)
    }

    pub fn transition(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        status: ApplicationStatus,
        note: Option<String>,
    ) -> Result<Application, PlacementError> {
        self.ledger.transition(actor, application_id, status, note)
    }

    pub fn accept_offer(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, PlacementError> {
        self.ledger.accept_offer(actor, application_id)
    }

    pub fn decline_offer(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, PlacementError> {
        self.ledger.decline_offer(actor, application_id)
    }

    pub fn withdraw(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        note: Option<String>,
    ) -> Result<Application, PlacementError> {
        self.ledger.withdraw(actor, application_id, note)
    }

    pub fn student_applications(
        &self,
        actor: &Actor,
        student_id: &StudentId,
    ) -> Result<Vec<StudentApplicationView>, PlacementError> {
        self.queries.student_applications(actor, student_id)
    }

    pub fn applicants(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicantView>, PlacementError> {
        self.queries.applicants(actor, drive_id, status)
    }

    pub fn submit_shortlist(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        student_ids: Vec<StudentId>,
    ) -> Result<BatchOutcome, PlacementError> {
        self.coordinator.submit_shortlist(actor, drive_id, student_ids)
    }

    pub fn submit_final_selection(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        decisions: Vec<SelectionDecision>,
    ) -> Result<BatchOutcome, PlacementError> {
        self.coordinator
            .submit_final_selection(actor, drive_id, decisions)
    }

    pub fn statistics(&self, actor: &Actor) -> Result<PlacementStatistics, PlacementError> {
        self.queries.statistics(actor)
    }
}
