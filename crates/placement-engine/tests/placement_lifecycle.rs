//! End-to-end placement scenarios exercised through the public service facade and HTTP router.

mod common {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, TimeZone, Utc};

    use placement_engine::workflows::placement::{
        Actor, AuditError, AuditEvent, AuditSink, Clock, Collaborators, CompanyId, CompanyProfile,
        CompanyProfileStore, DriveDraft, DriveId, EligibilityCriteria, EngineConfig,
        InMemoryApplicationRepository, InMemoryDriveRepository, JobDrive, ManualClock,
        PackageCategory, PlacementService, PlacementStatus, ProfileStoreError, StudentId,
        StudentProfileStore, StudentSnapshot,
    };

    pub type Service = PlacementService<InMemoryDriveRepository, InMemoryApplicationRepository>;

    #[derive(Default)]
    pub struct Students {
        profiles: Mutex<HashMap<StudentId, StudentSnapshot>>,
    }

    impl Students {
        pub fn with(snapshots: Vec<StudentSnapshot>) -> Self {
            let store = Self::default();
            {
                let mut profiles = store.profiles.lock().expect("profiles mutex poisoned");
                for snapshot in snapshots {
                    profiles.insert(snapshot.student_id.clone(), snapshot);
                }
            }
            store
        }

        pub fn status(&self, student_id: &str) -> PlacementStatus {
            self.profiles
                .lock()
                .expect("profiles mutex poisoned")
                .get(&StudentId::new(student_id))
                .map(|profile| profile.placement_status)
                .expect("student seeded")
        }
    }

    impl StudentProfileStore for Students {
        fn student_snapshot(
            &self,
            student_id: &StudentId,
        ) -> Result<Option<StudentSnapshot>, ProfileStoreError> {
            Ok(self
                .profiles
                .lock()
                .expect("profiles mutex poisoned")
                .get(student_id)
                .cloned())
        }

        fn mark_placed(
            &self,
            student_id: &StudentId,
            _drive_id: &DriveId,
            category: PackageCategory,
        ) -> Result<(), ProfileStoreError> {
            let mut profiles = self.profiles.lock().expect("profiles mutex poisoned");
            let profile = profiles
                .get_mut(student_id)
                .ok_or_else(|| ProfileStoreError::Missing(student_id.to_string()))?;
            profile.placement_status = PlacementStatus::Placed {
                category: Some(category),
            };
            Ok(())
        }
    }

    pub struct Companies;

    impl CompanyProfileStore for Companies {
        fn company(
            &self,
            company_id: &CompanyId,
        ) -> Result<Option<CompanyProfile>, ProfileStoreError> {
            Ok(Some(CompanyProfile {
                company_id: company_id.clone(),
                name: company_id.as_str().to_uppercase(),
            }))
        }
    }

    #[derive(Default)]
    pub struct Audit {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl Audit {
        pub fn len(&self) -> usize {
            self.events.lock().expect("audit mutex poisoned").len()
        }
    }

    impl AuditSink for Audit {
        fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
            self.events.lock().expect("audit mutex poisoned").push(event);
            Ok(())
        }
    }

    pub fn snapshot(id: &str, branch: &str, cgpa: f64) -> StudentSnapshot {
        StudentSnapshot {
            student_id: StudentId::new(id),
            full_name: id.to_string(),
            branch: Some(branch.to_string()),
            course: Some("B.Tech".to_string()),
            admission_year: Some(2022),
            passing_year: Some(2026),
            cgpa: Some(cgpa),
            active_backlogs: Some(0),
            tenth_percentage: None,
            twelfth_percentage: None,
            gender: None,
            placement_status: PlacementStatus::NotPlaced,
        }
    }

    pub fn cse_criteria() -> EligibilityCriteria {
        EligibilityCriteria {
            eligible_branches: BTreeSet::from(["CSE".to_string()]),
            min_cgpa: Some(8.0),
            max_active_backlogs: Some(0),
            ..EligibilityCriteria::default()
        }
    }

    pub struct World {
        pub service: Arc<Service>,
        pub students: Arc<Students>,
        pub audit: Arc<Audit>,
        pub clock: Arc<ManualClock>,
    }

    pub fn world() -> World {
        let students = Arc::new(Students::with(vec![
            snapshot("21CS001", "CSE", 8.7),
            snapshot("21CS002", "CSE", 7.5),
            snapshot("21CS003", "CSE", 9.2),
        ]));
        let audit = Arc::new(Audit::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 8, 1, 10, 0, 0)
                .single()
                .expect("valid timestamp"),
        ));
        let service = Arc::new(PlacementService::new(
            Arc::new(InMemoryDriveRepository::default()),
            Arc::new(InMemoryApplicationRepository::default()),
            Collaborators {
                students: students.clone(),
                companies: Arc::new(Companies),
                audit: audit.clone(),
            },
            EngineConfig::default(),
            clock.clone(),
        ));
        World {
            service,
            students,
            audit,
            clock,
        }
    }

    pub fn admin() -> Actor {
        Actor::admin("tpo")
    }

    impl World {
        pub fn open_drive(&self, company: &str, title: &str) -> JobDrive {
            let drive = self
                .service
                .create_drive(
                    &admin(),
                    DriveDraft {
                        company_id: CompanyId::new(company),
                        title: title.to_string(),
                        criteria: cse_criteria(),
                        vacancies: 5,
                        package_category: PackageCategory::Standard,
                        ctc_lpa: Some(8.0),
                    },
                )
                .expect("draft created");
            let now = self.clock.now();
            self.service
                .publish_drive(
                    &admin(),
                    &drive.drive_id,
                    now + Duration::minutes(30),
                    now + Duration::days(5),
                )
                .expect("published");
            self.clock.advance(Duration::hours(1));
            drive
        }
    }
}

use std::sync::Barrier;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use placement_engine::workflows::placement::{
    placement_router, Actor, Application, ApplicationStatus, ApplyRequest, CompanyId, DriveId,
    PlacementError, PlacementStatus, SelectionDecision, SelectionOutcome, StudentId,
};
use tower::ServiceExt;

use common::*;

fn apply(world: &World, student: &str, drive: &DriveId) -> Result<Application, PlacementError> {
    world.service.apply(
        &Actor::student(&StudentId::new(student)),
        ApplyRequest {
            student_id: StudentId::new(student),
            drive_id: drive.clone(),
            resume_ref: None,
        },
    )
}

#[test]
fn cgpa_shortfall_is_the_only_reason_reported() {
    let world = world();
    let drive = world.open_drive("acme", "Graduate Engineer");

    match apply(&world, "21CS002", &drive.drive_id) {
        Err(PlacementError::Ineligible { reasons }) => assert_eq!(
            reasons,
            vec!["CGPA too low (Required: 8.0, Yours: 7.5)".to_string()]
        ),
        other => panic!("expected ineligible verdict, got {other:?}"),
    }
}

#[test]
fn full_offer_flow_withdraws_the_other_shortlist() {
    let world = world();
    let d1 = world.open_drive("acme", "Graduate Engineer");
    let d2 = world.open_drive("globex", "Platform Engineer");
    let company_one = Actor::company(&CompanyId::new("acme"));
    let company_two = Actor::company(&CompanyId::new("globex"));
    let student = StudentId::new("21CS001");

    let a1 = apply(&world, "21CS001", &d1.drive_id).expect("applied to d1");
    let a2 = apply(&world, "21CS001", &d2.drive_id).expect("applied to d2");
    assert_eq!(a1.status, ApplicationStatus::Applied);

    world
        .service
        .submit_shortlist(&company_one, &d1.drive_id, vec![student.clone()])
        .expect("d1 shortlist");
    world
        .service
        .submit_shortlist(&company_two, &d2.drive_id, vec![student.clone()])
        .expect("d2 shortlist");
    assert_eq!(
        world
            .service
            .application(&a1.application_id)
            .expect("a1")
            .status,
        ApplicationStatus::Shortlisted
    );

    world
        .service
        .submit_final_selection(
            &company_one,
            &d1.drive_id,
            vec![SelectionDecision {
                student_id: student.clone(),
                outcome: SelectionOutcome::Selected,
            }],
        )
        .expect("d1 selection");
    assert_eq!(
        world
            .service
            .application(&a1.application_id)
            .expect("a1")
            .status,
        ApplicationStatus::Selected
    );

    let accepted = world
        .service
        .accept_offer(&Actor::student(&student), &a1.application_id)
        .expect("offer accepted");
    assert_eq!(accepted.status, ApplicationStatus::OfferAccepted);

    let other = world.service.application(&a2.application_id).expect("a2");
    assert_eq!(other.status, ApplicationStatus::Withdrawn);
    assert!(matches!(
        world.students.status("21CS001"),
        PlacementStatus::Placed { .. }
    ));
    assert!(world.audit.len() >= 7);
}

#[test]
fn lock_before_shortlist_refuses_the_whole_batch() {
    let world = world();
    let drive = world.open_drive("acme", "Graduate Engineer");
    let application = apply(&world, "21CS003", &drive.drive_id).expect("applied");
    world
        .service
        .lock_drive(&admin(), &drive.drive_id)
        .expect("locked");

    match world.service.submit_shortlist(
        &Actor::company(&CompanyId::new("acme")),
        &drive.drive_id,
        vec![StudentId::new("21CS003")],
    ) {
        Err(PlacementError::DriveLocked { .. }) => {}
        other => panic!("expected drive locked, got {other:?}"),
    }
    assert_eq!(
        world
            .service
            .application(&application.application_id)
            .expect("stored"),
        application
    );

    assert!(matches!(
        apply(&world, "21CS001", &drive.drive_id),
        Err(PlacementError::DriveLocked { .. })
    ));
}

#[test]
fn locked_drives_still_take_offer_answers() {
    let world = world();
    let drive = world.open_drive("acme", "Graduate Engineer");
    let company = Actor::company(&CompanyId::new("acme"));
    let first = apply(&world, "21CS001", &drive.drive_id).expect("applied");
    let second = apply(&world, "21CS003", &drive.drive_id).expect("applied");
    let students = vec![StudentId::new("21CS001"), StudentId::new("21CS003")];
    world
        .service
        .submit_shortlist(&company, &drive.drive_id, students.clone())
        .expect("shortlisted");
    world
        .service
        .submit_final_selection(
            &company,
            &drive.drive_id,
            students
                .into_iter()
                .map(|student_id| SelectionDecision {
                    student_id,
                    outcome: SelectionOutcome::Selected,
                })
                .collect(),
        )
        .expect("selected");
    world
        .service
        .lock_drive(&admin(), &drive.drive_id)
        .expect("locked");

    world
        .service
        .accept_offer(
            &Actor::student(&StudentId::new("21CS001")),
            &first.application_id,
        )
        .expect("accept after lock");
    world
        .service
        .decline_offer(
            &Actor::student(&StudentId::new("21CS003")),
            &second.application_id,
        )
        .expect("decline after lock");
}

#[test]
fn simultaneous_applies_leave_one_record() {
    let world = world();
    let drive = world.open_drive("acme", "Graduate Engineer");
    let barrier = Barrier::new(8);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    apply(&world, "21CS001", &drive.drive_id)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("apply thread panicked"))
            .collect()
    });

    let accepted = results.iter().filter(|result| result.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|result| matches!(result, Err(PlacementError::AlreadyApplied { .. })))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 7);
}

#[test]
fn history_walks_every_step_to_the_current_status() {
    let world = world();
    let drive = world.open_drive("acme", "Graduate Engineer");
    let company = Actor::company(&CompanyId::new("acme"));
    let student = StudentId::new("21CS003");
    let application = apply(&world, "21CS003", &drive.drive_id).expect("applied");

    world
        .service
        .transition(
            &company,
            &application.application_id,
            ApplicationStatus::UnderReview,
            Some("resume screened".to_string()),
        )
        .expect("under review");
    world
        .service
        .submit_shortlist(&company, &drive.drive_id, vec![student.clone()])
        .expect("shortlisted");
    world
        .service
        .transition(
            &company,
            &application.application_id,
            ApplicationStatus::InterviewScheduled,
            None,
        )
        .expect("interview scheduled");
    world
        .service
        .submit_final_selection(
            &company,
            &drive.drive_id,
            vec![SelectionDecision {
                student_id: student,
                outcome: SelectionOutcome::Rejected,
            }],
        )
        .expect("rejected");

    let stored = world
        .service
        .application(&application.application_id)
        .expect("stored");
    let trail: Vec<_> = stored.history.iter().map(|change| change.status).collect();
    assert_eq!(
        trail,
        vec![
            ApplicationStatus::Applied,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Shortlisted,
            ApplicationStatus::InterviewScheduled,
            ApplicationStatus::Rejected,
        ]
    );
    assert_eq!(stored.status, ApplicationStatus::Rejected);
    assert_eq!(stored.history[1].note.as_deref(), Some("resume screened"));
    assert!(stored
        .history
        .windows(2)
        .all(|pair| pair[0].at <= pair[1].at));
}

#[tokio::test]
async fn router_serves_eligible_drive_views() {
    let world = world();
    let drive = world.open_drive("acme", "Graduate Engineer");
    let router = placement_router(world.service.clone());

    let response = router
        .oneshot(
            Request::get("/api/v1/students/21CS002/eligible-drives")
                .header("x-actor-id", "21CS002")
                .header("x-actor-role", "student")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload[0]["drive_id"], drive.drive_id.as_str());
    assert_eq!(payload[0]["eligible"], false);
    assert_eq!(payload[0]["company_name"], "ACME");
}
