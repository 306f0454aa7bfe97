//! Statically enumerated application status edges and who may take them.

use super::domain::{ActorRole, ApplicationStatus};

use ApplicationStatus::*;

/// Allowed edges, keyed by source status. Terminal statuses have no outgoing edges.
const EDGES: [(ApplicationStatus, &[ApplicationStatus]); 9] = [
    (Applied, &[UnderReview, Rejected, Withdrawn]),
    (UnderReview, &[Shortlisted, Rejected, Withdrawn]),
    (Shortlisted, &[InterviewScheduled, Rejected, Withdrawn]),
    (InterviewScheduled, &[Selected, Rejected, Withdrawn]),
    (Selected, &[OfferAccepted, OfferDeclined, Rejected, Withdrawn]),
    (Rejected, &[]),
    (OfferAccepted, &[]),
    (OfferDeclined, &[]),
    (Withdrawn, &[]),
];

pub fn successors(from: ApplicationStatus) -> &'static [ApplicationStatus] {
    EDGES
        .iter()
        .find(|(source, _)| *source == from)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

pub fn is_allowed(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    successors(from).contains(&to)
}

/// Roles that may move an application into `to`.
pub fn permitted_roles(to: ApplicationStatus) -> &'static [ActorRole] {
    match to {
        Applied => &[],
        UnderReview | Shortlisted | InterviewScheduled | Selected | Rejected => {
            &[ActorRole::Company, ActorRole::Admin]
        }
        OfferAccepted | OfferDeclined => &[ActorRole::Student],
        Withdrawn => &[ActorRole::Student, ActorRole::Admin, ActorRole::System],
    }
}

/// Forward route along the company-driven progression, excluding `from` and including `to`.
///
/// Used by batch submissions that advance an application several steps at once, so the
/// history still records every intermediate edge.
pub fn forward_path(from: ApplicationStatus, to: ApplicationStatus) -> Option<Vec<ApplicationStatus>> {
    const PROGRESSION: [ApplicationStatus; 5] =
        [Applied, UnderReview, Shortlisted, InterviewScheduled, Selected];

    let start = PROGRESSION.iter().position(|status| *status == from)?;
    let end = PROGRESSION.iter().position(|status| *status == to)?;
    if end <= start {
        return None;
    }
    Some(PROGRESSION[start + 1..=end].to_vec())
}

/// Whether `path` replays cleanly from `Applied` through the edge table.
pub fn is_reachable_history(path: &[ApplicationStatus]) -> bool {
    match path.split_first() {
        Some((Applied, rest)) => {
            let mut current = Applied;
            for next in rest {
                if !is_allowed(current, *next) {
                    return false;
                }
                current = *next;
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_successors() {
        for status in ApplicationStatus::ordered() {
            assert_eq!(status.is_terminal(), successors(status).is_empty(), "{status}");
        }
    }

    #[test]
    fn every_non_terminal_status_can_be_rejected_or_withdrawn() {
        for status in ApplicationStatus::ordered()
            .into_iter()
            .filter(|status| !status.is_terminal())
        {
            assert!(is_allowed(status, Rejected), "{status} -> rejected");
            assert!(is_allowed(status, Withdrawn), "{status} -> withdrawn");
        }
    }

    #[test]
    fn no_status_skips_the_progression() {
        assert!(!is_allowed(Applied, Shortlisted));
        assert!(!is_allowed(Shortlisted, Selected));
        assert!(!is_allowed(Applied, OfferAccepted));
    }

    #[test]
    fn forward_path_lists_each_intermediate_step() {
        assert_eq!(
            forward_path(Applied, Shortlisted),
            Some(vec![UnderReview, Shortlisted])
        );
        assert_eq!(
            forward_path(Shortlisted, Selected),
            Some(vec![InterviewScheduled, Selected])
        );
        assert_eq!(forward_path(Selected, Shortlisted), None);
        assert_eq!(forward_path(Rejected, Selected), None);
    }

    #[test]
    fn offers_are_answered_by_students_only() {
        assert_eq!(permitted_roles(OfferAccepted), &[ActorRole::Student]);
        assert!(!permitted_roles(Shortlisted).contains(&ActorRole::Student));
        assert!(permitted_roles(Applied).is_empty());
    }

    #[test]
    fn reachable_history_requires_applied_start() {
        assert!(is_reachable_history(&[Applied, UnderReview, Shortlisted]));
        assert!(!is_reachable_history(&[UnderReview, Shortlisted]));
        assert!(!is_reachable_history(&[Applied, Selected]));
    }
}
