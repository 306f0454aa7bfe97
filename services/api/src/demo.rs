use crate::infra::{seeded_engine, EngineService};
use chrono::{Duration, Utc};
use clap::Args;
use placement_engine::error::AppError;
use placement_engine::workflows::placement::{
    Actor, Application, ApplyRequest, BatchOutcome, Clock, CompanyId, DriveDraft, DriveId,
    EligibilityCriteria, EngineConfig, JobDrive, ManualClock, OfferExclusivity, PackageCategory,
    PlacedStudentPolicy, PlacementError, SelectionDecision, SelectionOutcome, StudentId,
};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Offer exclusivity rule: at_acceptance (default) or at_selection
    #[arg(long, value_parser = parse_exclusivity)]
    pub(crate) exclusivity: Option<OfferExclusivity>,
    /// Placed-student policy: block (default), allow or higher_category
    #[arg(long, value_parser = parse_policy)]
    pub(crate) placed_policy: Option<PlacedStudentPolicy>,
    /// Print the final application records as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

fn parse_exclusivity(raw: &str) -> Result<OfferExclusivity, String> {
    OfferExclusivity::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not one of at_acceptance, at_selection"))
}

fn parse_policy(raw: &str) -> Result<PlacedStudentPolicy, String> {
    PlacedStudentPolicy::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not one of block, allow, higher_category"))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        exclusivity,
        placed_policy,
        json,
    } = args;

    let defaults = EngineConfig::default();
    let config = EngineConfig {
        offer_exclusivity: exclusivity.unwrap_or(defaults.offer_exclusivity),
        placed_student_policy: placed_policy.unwrap_or(defaults.placed_student_policy),
        ..defaults
    };
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = seeded_engine(config.clone(), clock.clone());
    let service = engine.service.as_ref();
    let admin = Actor::admin("placement-officer");

    println!("Placement season demo");
    println!(
        "- offer exclusivity {:?} | placed-student policy {:?}",
        config.offer_exclusivity, config.placed_student_policy
    );

    let d1 = open_drive(
        service,
        &clock,
        &admin,
        "northwind",
        "Graduate Data Engineer",
        PackageCategory::Dream,
    )?;
    let d2 = open_drive(
        service,
        &clock,
        &admin,
        "contoso",
        "Associate Software Engineer",
        PackageCategory::Standard,
    )?;
    clock.advance(Duration::hours(2));
    println!("\nDrives published");
    for drive in [&d1, &d2] {
        println!(
            "- {} | {} | {:?} | window closes {}",
            drive.drive_id,
            drive.title,
            drive.package_category,
            drive
                .window
                .map(|window| window.closes_at.to_rfc3339())
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    println!("\nEligibility check");
    let diya = StudentId::new("21CS014");
    let verdict = service.check_eligibility(&diya, &d1.drive_id)?;
    println!(
        "- {} on {}: eligible={} {:?}",
        diya,
        d1.drive_id,
        verdict.eligible,
        verdict.messages()
    );
    report("apply anyway", apply(service, &diya, &d1.drive_id));

    println!("\nApplications");
    let aarav = StudentId::new("21CS001");
    let kabir = StudentId::new("21EC007");
    let aarav_d1 = apply(service, &aarav, &d1.drive_id)?;
    let aarav_d2 = apply(service, &aarav, &d2.drive_id)?;
    apply(service, &kabir, &d1.drive_id)?;
    println!("- {} applied to {} and {}", aarav, d1.drive_id, d2.drive_id);
    println!("- {} applied to {}", kabir, d1.drive_id);
    report(
        "duplicate application",
        apply(service, &aarav, &d1.drive_id),
    );

    println!("\nCompany decisions");
    let northwind = Actor::company(&CompanyId::new("northwind"));
    let contoso = Actor::company(&CompanyId::new("contoso"));
    print_batch(
        "northwind shortlist",
        &service.submit_shortlist(
            &northwind,
            &d1.drive_id,
            vec![aarav.clone(), kabir.clone()],
        )?,
    );
    print_batch(
        "contoso shortlist",
        &service.submit_shortlist(&contoso, &d2.drive_id, vec![aarav.clone()])?,
    );
    print_batch(
        "northwind final selection",
        &service.submit_final_selection(
            &northwind,
            &d1.drive_id,
            vec![
                SelectionDecision {
                    student_id: aarav.clone(),
                    outcome: SelectionOutcome::Selected,
                },
                SelectionDecision {
                    student_id: kabir.clone(),
                    outcome: SelectionOutcome::Rejected,
                },
            ],
        )?,
    );

    println!("\nOffer acceptance");
    let accepted = service.accept_offer(&Actor::student(&aarav), &aarav_d1.application_id)?;
    let cascaded = service.application(&aarav_d2.application_id)?;
    println!("- {} -> {}", accepted.application_id, accepted.status);
    println!(
        "- {} on {} -> {}",
        cascaded.application_id, cascaded.drive_id, cascaded.status
    );
    if let Some(status) = engine.students.placement_status(&aarav) {
        println!("- {} placement status {:?}", aarav, status);
    }

    println!("\nLocked drive");
    let d3 = open_drive(
        service,
        &clock,
        &admin,
        "fabrikam",
        "Embedded Systems Engineer",
        PackageCategory::SuperDream,
    )?;
    clock.advance(Duration::hours(2));
    apply(service, &kabir, &d3.drive_id)?;
    let locked = service.lock_drive(&admin, &d3.drive_id)?;
    println!("- {} is now {:?}", locked.drive_id, locked.status);
    report(
        "fabrikam shortlist after lock",
        service.submit_shortlist(
            &Actor::company(&CompanyId::new("fabrikam")),
            &d3.drive_id,
            vec![kabir.clone()],
        ),
    );
    report(
        "late application after lock",
        apply(service, &StudentId::new("21CS014"), &d3.drive_id),
    );

    println!("\nSeason statistics");
    let stats = service.statistics(&admin)?;
    println!(
        "- {} drives | {} applications | {} students placed",
        stats.total_drives, stats.total_applications, stats.placed_students
    );
    for (status, count) in &stats.applications_by_status {
        println!("  - {status}: {count}");
    }

    if json {
        let records = [&aarav_d1.application_id, &aarav_d2.application_id]
            .into_iter()
            .map(|id| service.application(id))
            .collect::<Result<Vec<_>, _>>()?;
        match serde_json::to_string_pretty(&records) {
            Ok(body) => println!("\nApplication records:\n{body}"),
            Err(err) => println!("\nApplication records unavailable: {err}"),
        }
    }

    Ok(())
}

fn open_drive(
    service: &EngineService,
    clock: &ManualClock,
    admin: &Actor,
    company: &str,
    title: &str,
    package_category: PackageCategory,
) -> Result<JobDrive, PlacementError> {
    let draft = service.create_drive(
        admin,
        DriveDraft {
            company_id: CompanyId::new(company),
            title: title.to_string(),
            criteria: demo_criteria(),
            vacancies: 4,
            package_category,
            ctc_lpa: Some(match package_category {
                PackageCategory::Standard => 6.5,
                PackageCategory::Dream => 12.0,
                PackageCategory::SuperDream => 24.0,
            }),
        },
    )?;
    let now = clock.now();
    service.publish_drive(
        admin,
        &draft.drive_id,
        now + Duration::hours(1),
        now + Duration::days(10),
    )
}

fn demo_criteria() -> EligibilityCriteria {
    EligibilityCriteria {
        eligible_branches: BTreeSet::from(["CSE".to_string(), "ECE".to_string()]),
        eligible_courses: BTreeSet::from(["B.Tech".to_string()]),
        eligible_passing_years: BTreeSet::from([2026]),
        min_cgpa: Some(8.0),
        max_active_backlogs: Some(0),
        min_tenth_percentage: Some(75.0),
        min_twelfth_percentage: None,
        gender_preference: None,
    }
}

fn apply(
    service: &EngineService,
    student_id: &StudentId,
    drive_id: &DriveId,
) -> Result<Application, PlacementError> {
    service.apply(
        &Actor::student(student_id),
        ApplyRequest {
            student_id: student_id.clone(),
            drive_id: drive_id.clone(),
            resume_ref: Some(format!("resumes/{student_id}.pdf")),
        },
    )
}

fn report<T>(label: &str, outcome: Result<T, PlacementError>) {
    match outcome {
        Ok(_) => println!("- {label}: accepted"),
        Err(err) => println!("- {label}: refused ({err})"),
    }
}

fn print_batch(label: &str, outcome: &BatchOutcome) {
    println!(
        "- {label}: {} accepted, {} rejected",
        outcome.accepted.len(),
        outcome.rejected.len()
    );
    for entry in &outcome.accepted {
        println!(
            "  - {} -> {}{}",
            entry.student_id,
            entry.status,
            if entry.changed { "" } else { " (unchanged)" }
        );
    }
    for entry in &outcome.rejected {
        println!("  - {} refused: {}", entry.student_id, entry.reason);
    }
}
