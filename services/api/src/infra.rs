use metrics_exporter_prometheus::PrometheusHandle;
use placement_engine::workflows::placement::{
    AuditError, AuditEvent, AuditSink, AuditSubject, Clock, Collaborators, CompanyId,
    CompanyProfile, CompanyProfileStore, DriveId, EngineConfig, InMemoryApplicationRepository,
    InMemoryDriveRepository, PackageCategory, PlacementService, PlacementStatus,
    ProfileStoreError, StudentId, StudentProfileStore, StudentSnapshot,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

pub(crate) type EngineService =
    PlacementService<InMemoryDriveRepository, InMemoryApplicationRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryStudentDirectory {
    profiles: Arc<Mutex<HashMap<StudentId, StudentSnapshot>>>,
}

impl InMemoryStudentDirectory {
    pub(crate) fn seeded() -> Self {
        let directory = Self::default();
        {
            let mut guard = directory.profiles.lock().expect("student mutex poisoned");
            for profile in seed_students() {
                guard.insert(profile.student_id.clone(), profile);
            }
        }
        directory
    }

    pub(crate) fn placement_status(&self, student_id: &StudentId) -> Option<PlacementStatus> {
        let guard = self.profiles.lock().expect("student mutex poisoned");
        guard.get(student_id).map(|profile| profile.placement_status)
    }
}

impl StudentProfileStore for InMemoryStudentDirectory {
    fn student_snapshot(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<StudentSnapshot>, ProfileStoreError> {
        let guard = self.profiles.lock().expect("student mutex poisoned");
        Ok(guard.get(student_id).cloned())
    }

    fn mark_placed(
        &self,
        student_id: &StudentId,
        drive_id: &DriveId,
        category: PackageCategory,
    ) -> Result<(), ProfileStoreError> {
        let mut guard = self.profiles.lock().expect("student mutex poisoned");
        let profile = guard
            .get_mut(student_id)
            .ok_or_else(|| ProfileStoreError::Missing(student_id.to_string()))?;
        profile.placement_status = PlacementStatus::Placed {
            category: Some(category),
        };
        info!(%student_id, %drive_id, ?category, "student marked placed");
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) struct InMemoryCompanyDirectory {
    profiles: Arc<HashMap<CompanyId, CompanyProfile>>,
}

impl InMemoryCompanyDirectory {
    pub(crate) fn seeded() -> Self {
        let profiles = [
            ("northwind", "Northwind Analytics"),
            ("contoso", "Contoso Systems"),
            ("fabrikam", "Fabrikam Labs"),
        ]
        .into_iter()
        .map(|(id, name)| {
            let company_id = CompanyId::new(id);
            (
                company_id.clone(),
                CompanyProfile {
                    company_id,
                    name: name.to_string(),
                },
            )
        })
        .collect();
        Self {
            profiles: Arc::new(profiles),
        }
    }
}

impl CompanyProfileStore for InMemoryCompanyDirectory {
    fn company(&self, company_id: &CompanyId) -> Result<Option<CompanyProfile>, ProfileStoreError> {
        Ok(self.profiles.get(company_id).cloned())
    }
}

/// Audit sink that forwards every status append to the tracing pipeline.
#[derive(Default, Clone)]
pub(crate) struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        let subject = match &event.subject {
            AuditSubject::Drive(id) => format!("drive:{id}"),
            AuditSubject::Application(id) => format!("application:{id}"),
        };
        info!(
            target: "placement_audit",
            %subject,
            status = %event.status,
            actor = %event.actor.id,
            role = event.actor.role.label(),
            at = %event.at,
            note = event.note.as_deref().unwrap_or(""),
            "status appended"
        );
        Ok(())
    }
}

/// In-memory stores and seeded collaborators wired into one service.
pub(crate) struct SeededEngine {
    pub(crate) service: Arc<EngineService>,
    pub(crate) students: InMemoryStudentDirectory,
}

pub(crate) fn seeded_engine(config: EngineConfig, clock: Arc<dyn Clock>) -> SeededEngine {
    let students = InMemoryStudentDirectory::seeded();
    let collaborators = Collaborators {
        students: Arc::new(students.clone()),
        companies: Arc::new(InMemoryCompanyDirectory::seeded()),
        audit: Arc::new(TracingAuditSink),
    };
    let service = Arc::new(PlacementService::new(
        Arc::new(InMemoryDriveRepository::default()),
        Arc::new(InMemoryApplicationRepository::default()),
        collaborators,
        config,
        clock,
    ));
    SeededEngine { service, students }
}

fn seed_students() -> Vec<StudentSnapshot> {
    [
        ("21CS001", "Aarav Sharma", "Male", "CSE", 8.7, 0),
        ("21CS014", "Diya Menon", "Female", "CSE", 7.5, 0),
        ("21EC007", "Kabir Rao", "Male", "ECE", 9.1, 0),
        ("21ME022", "Ishita Verma", "Female", "MECH", 8.3, 2),
    ]
    .into_iter()
    .map(|(id, name, gender, branch, cgpa, backlogs)| StudentSnapshot {
        student_id: StudentId::new(id),
        full_name: name.to_string(),
        branch: Some(branch.to_string()),
        course: Some("B.Tech".to_string()),
        admission_year: Some(2022),
        passing_year: Some(2026),
        cgpa: Some(cgpa),
        active_backlogs: Some(backlogs),
        tenth_percentage: Some(91.0),
        twelfth_percentage: Some(86.4),
        gender: Some(gender.to_string()),
        placement_status: PlacementStatus::NotPlaced,
    })
    .collect()
}
