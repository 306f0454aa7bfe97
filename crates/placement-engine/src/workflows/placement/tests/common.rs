use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::placement::{
    Actor, Application, ApplyRequest, AuditError, AuditEvent, AuditSink, Clock, Collaborators,
    CompanyId, CompanyProfile, CompanyProfileStore, DriveDraft, DriveId, EligibilityCriteria,
    EngineConfig, InMemoryApplicationRepository, InMemoryDriveRepository, JobDrive, ManualClock,
    PackageCategory, PlacementService, PlacementStatus, ProfileStoreError, StudentId,
    StudentProfileStore, StudentSnapshot,
};

pub(super) type TestService =
    PlacementService<InMemoryDriveRepository, InMemoryApplicationRepository>;

pub(super) fn start_of_season() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn admin() -> Actor {
    Actor::admin("placement-officer")
}

pub(super) fn student_actor(id: &str) -> Actor {
    Actor::student(&StudentId::new(id))
}

pub(super) fn company_actor(id: &str) -> Actor {
    Actor::company(&CompanyId::new(id))
}

pub(super) fn student(id: &str, branch: &str, cgpa: f64) -> StudentSnapshot {
    StudentSnapshot {
        student_id: StudentId::new(id),
        full_name: format!("Student {id}"),
        branch: Some(branch.to_string()),
        course: Some("B.Tech".to_string()),
        admission_year: Some(2022),
        passing_year: Some(2026),
        cgpa: Some(cgpa),
        active_backlogs: Some(0),
        tenth_percentage: Some(88.0),
        twelfth_percentage: Some(82.5),
        gender: Some("Female".to_string()),
        placement_status: PlacementStatus::NotPlaced,
    }
}

pub(super) fn criteria() -> EligibilityCriteria {
    EligibilityCriteria {
        eligible_branches: BTreeSet::from(["CSE".to_string(), "ECE".to_string()]),
        eligible_courses: BTreeSet::from(["B.Tech".to_string()]),
        eligible_passing_years: BTreeSet::from([2026]),
        min_cgpa: Some(8.0),
        max_active_backlogs: Some(0),
        min_tenth_percentage: None,
        min_twelfth_percentage: None,
        gender_preference: None,
    }
}

pub(super) fn draft(company: &str, title: &str) -> DriveDraft {
    DriveDraft {
        company_id: CompanyId::new(company),
        title: title.to_string(),
        criteria: criteria(),
        vacancies: 3,
        package_category: PackageCategory::Dream,
        ctc_lpa: Some(12.5),
    }
}

type SnapshotHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(super) struct MemoryStudents {
    profiles: Mutex<HashMap<StudentId, StudentSnapshot>>,
    placements: Mutex<Vec<(StudentId, DriveId, PackageCategory)>>,
    fail_placement_sync: AtomicBool,
    after_next_snapshot: Mutex<Option<SnapshotHook>>,
}

impl MemoryStudents {
    pub(super) fn seeded() -> Self {
        let store = Self::default();
        store.upsert(student("s-asha", "CSE", 8.6));
        store.upsert(student("s-ravi", "CSE", 7.5));
        store.upsert(student("s-meera", "ece", 9.1));
        let mut kiran = student("s-kiran", "MECH", 8.2);
        kiran.active_backlogs = Some(2);
        store.upsert(kiran);
        store
    }

    pub(super) fn upsert(&self, snapshot: StudentSnapshot) {
        self.profiles
            .lock()
            .expect("profiles mutex poisoned")
            .insert(snapshot.student_id.clone(), snapshot);
    }

    pub(super) fn placements(&self) -> Vec<(StudentId, DriveId, PackageCategory)> {
        self.placements
            .lock()
            .expect("placements mutex poisoned")
            .clone()
    }

    pub(super) fn fail_placement_sync(&self) {
        self.fail_placement_sync.store(true, Ordering::SeqCst);
    }

    /// Run `hook` once, right after the next snapshot is read and before it is returned.
    pub(super) fn after_next_snapshot(&self, hook: impl FnOnce() + Send + 'static) {
        *self
            .after_next_snapshot
            .lock()
            .expect("hook mutex poisoned") = Some(Box::new(hook));
    }
}

impl StudentProfileStore for MemoryStudents {
    fn student_snapshot(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<StudentSnapshot>, ProfileStoreError> {
        let snapshot = self
            .profiles
            .lock()
            .expect("profiles mutex poisoned")
            .get(student_id)
            .cloned();
        let hook = self
            .after_next_snapshot
            .lock()
            .expect("hook mutex poisoned")
            .take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(snapshot)
    }

    fn mark_placed(
        &self,
        student_id: &StudentId,
        drive_id: &DriveId,
        category: PackageCategory,
    ) -> Result<(), ProfileStoreError> {
        if self.fail_placement_sync.load(Ordering::SeqCst) {
            return Err(ProfileStoreError::Unavailable(
                "profile service offline".to_string(),
            ));
        }
        if let Some(profile) = self
            .profiles
            .lock()
            .expect("profiles mutex poisoned")
            .get_mut(student_id)
        {
            profile.placement_status = PlacementStatus::Placed {
                category: Some(category),
            };
        }
        self.placements
            .lock()
            .expect("placements mutex poisoned")
            .push((student_id.clone(), drive_id.clone(), category));
        Ok(())
    }
}

pub(super) struct MemoryCompanies {
    profiles: HashMap<CompanyId, CompanyProfile>,
}

impl MemoryCompanies {
    pub(super) fn seeded() -> Self {
        let profiles = [
            ("acme", "Acme Systems"),
            ("globex", "Globex Corporation"),
            ("initech", "Initech"),
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
        Self { profiles }
    }
}

impl CompanyProfileStore for MemoryCompanies {
    fn company(&self, company_id: &CompanyId) -> Result<Option<CompanyProfile>, ProfileStoreError> {
        Ok(self.profiles.get(company_id).cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAudit {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().expect("audit mutex poisoned").push(event);
        Ok(())
    }
}

pub(super) struct OfflineAudit;

impl AuditSink for OfflineAudit {
    fn publish(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Err(AuditError::Transport("broker unreachable".to_string()))
    }
}

/// Service wired to in-memory stores, with handles for inspecting side effects.
pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) applications: Arc<InMemoryApplicationRepository>,
    pub(super) students: Arc<MemoryStudents>,
    pub(super) audit: Arc<MemoryAudit>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub(super) fn harness_with(config: EngineConfig) -> Harness {
    let applications = Arc::new(InMemoryApplicationRepository::default());
    let students = Arc::new(MemoryStudents::seeded());
    let audit = Arc::new(MemoryAudit::default());
    let clock = Arc::new(ManualClock::new(start_of_season()));
    let collaborators = Collaborators {
        students: students.clone(),
        companies: Arc::new(MemoryCompanies::seeded()),
        audit: audit.clone(),
    };
    let service = Arc::new(PlacementService::new(
        Arc::new(InMemoryDriveRepository::default()),
        applications.clone(),
        collaborators,
        config,
        clock.clone(),
    ));

    Harness {
        service,
        applications,
        students,
        audit,
        clock,
    }
}

impl Harness {
    /// Create and publish a drive, then move the clock inside its window.
    pub(super) fn open_drive(&self, company: &str, title: &str) -> JobDrive {
        let drive = self
            .service
            .create_drive(&admin(), draft(company, title))
            .expect("draft created");
        let now = self.clock.now();
        self.service
            .publish_drive(
                &admin(),
                &drive.drive_id,
                now + Duration::hours(1),
                now + Duration::days(7),
            )
            .expect("drive published");
        self.clock.advance(Duration::hours(2));
        self.service.drive(&drive.drive_id).expect("drive exists")
    }

    pub(super) fn apply(&self, student_id: &str, drive_id: &DriveId) -> Application {
        self.service
            .apply(
                &student_actor(student_id),
                ApplyRequest {
                    student_id: StudentId::new(student_id),
                    drive_id: drive_id.clone(),
                    resume_ref: Some(format!("resumes/{student_id}.pdf")),
                },
            )
            .expect("application accepted")
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
