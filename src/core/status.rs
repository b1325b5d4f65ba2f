//! Application status, committee vote status and derived stage progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single authoritative status of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Submitted, waiting for the course instructor
    PendingInstructor,
    /// Instructor approved, waiting for a supervisor to be assigned
    PendingSupervisor,
    /// Supervisor assigned, committee voting
    PendingCommittee,
    /// Committee approved, staff preparing documents
    PendingDocuments,
    /// Acceptance request sent, waiting for the company
    SentToCompany,
    /// Company accepted, internship running
    InProgress,
    Completed,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn all() -> &'static [ApplicationStatus] {
        &[
            ApplicationStatus::PendingInstructor,
            ApplicationStatus::PendingSupervisor,
            ApplicationStatus::PendingCommittee,
            ApplicationStatus::PendingDocuments,
            ApplicationStatus::SentToCompany,
            ApplicationStatus::InProgress,
            ApplicationStatus::Completed,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::PendingInstructor => "pending_instructor",
            ApplicationStatus::PendingSupervisor => "pending_supervisor",
            ApplicationStatus::PendingCommittee => "pending_committee",
            ApplicationStatus::PendingDocuments => "pending_documents",
            ApplicationStatus::SentToCompany => "sent_to_company",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Completed | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Position along the happy path, used to derive stage progress
    fn rank(&self) -> u8 {
        match self {
            ApplicationStatus::PendingInstructor => 0,
            ApplicationStatus::PendingSupervisor => 1,
            ApplicationStatus::PendingCommittee => 2,
            ApplicationStatus::PendingDocuments => 3,
            ApplicationStatus::SentToCompany => 4,
            ApplicationStatus::InProgress => 5,
            ApplicationStatus::Completed => 6,
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => 0,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ApplicationStatus::all()
            .iter()
            .copied()
            .find(|st| st.as_str() == normalized)
            .ok_or_else(|| format!("Unknown application status: {}", s))
    }
}

/// A single committee member's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for VoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteStatus::Pending => write!(f, "pending"),
            VoteStatus::Approved => write!(f, "approved"),
            VoteStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for VoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(VoteStatus::Pending),
            "approved" | "approve" => Ok(VoteStatus::Approved),
            "rejected" | "reject" => Ok(VoteStatus::Rejected),
            _ => Err(format!("Unknown vote status: {}", s)),
        }
    }
}

/// A reviewer's decision on a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn from_flags(approve: bool, reject: bool) -> Option<Self> {
        match (approve, reject) {
            (true, false) => Some(Decision::Approve),
            (false, true) => Some(Decision::Reject),
            _ => None,
        }
    }

    pub fn as_vote(&self) -> VoteStatus {
        match self {
            Decision::Approve => VoteStatus::Approved,
            Decision::Reject => VoteStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "approve"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

/// Per-stage progress flags, derived from the application status and the
/// stage at which it was rejected or withdrawn. Nothing here is stored.
///
/// The `*_at` timestamps stay `None` until [`StageProgress::with_timeline`]
/// fills them from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageProgress {
    pub instructor_received: bool,
    pub instructor_reviewed: bool,
    pub course_instructor_status: VoteStatus,
    pub supervisor_assigned: bool,
    pub supervisor_status: VoteStatus,
    pub committee_status: VoteStatus,
    pub staff_reviewed: bool,
    pub document_received: bool,
    pub document_approved: bool,
    pub document_sent_to_company: bool,
    pub company_status: VoteStatus,
    pub completed: bool,

    pub submitted_at: Option<DateTime<Utc>>,
    pub instructor_reviewed_at: Option<DateTime<Utc>>,
    pub supervisor_assigned_at: Option<DateTime<Utc>>,
    pub committee_decided_at: Option<DateTime<Utc>>,
    pub sent_to_company_at: Option<DateTime<Utc>>,
    pub company_responded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageProgress {
    /// Derive the flags. `stopped_at` is the status the application held when it
    /// was rejected or withdrawn; it is ignored for non-terminal statuses.
    pub fn derive(status: ApplicationStatus, stopped_at: Option<ApplicationStatus>) -> Self {
        let (reached, rejected_at) = match status {
            ApplicationStatus::Rejected => {
                let at = stopped_at.unwrap_or(ApplicationStatus::PendingInstructor);
                (at.rank(), Some(at))
            }
            ApplicationStatus::Withdrawn => (
                stopped_at
                    .unwrap_or(ApplicationStatus::PendingInstructor)
                    .rank(),
                None,
            ),
            other => (other.rank(), None),
        };

        let stage = |rank: u8, at: ApplicationStatus| {
            if reached > rank {
                VoteStatus::Approved
            } else if rejected_at == Some(at) {
                VoteStatus::Rejected
            } else {
                VoteStatus::Pending
            }
        };

        let course_instructor_status = stage(0, ApplicationStatus::PendingInstructor);
        let supervisor_status = stage(1, ApplicationStatus::PendingSupervisor);
        let committee_status = stage(2, ApplicationStatus::PendingCommittee);
        let company_status = stage(4, ApplicationStatus::SentToCompany);

        Self {
            instructor_received: true,
            instructor_reviewed: course_instructor_status != VoteStatus::Pending,
            course_instructor_status,
            supervisor_assigned: reached > 1,
            supervisor_status,
            committee_status,
            staff_reviewed: reached > 3,
            document_received: reached > 3,
            document_approved: reached > 3,
            document_sent_to_company: reached > 3,
            company_status,
            completed: status == ApplicationStatus::Completed,
            submitted_at: None,
            instructor_reviewed_at: None,
            supervisor_assigned_at: None,
            committee_decided_at: None,
            sent_to_company_at: None,
            company_responded_at: None,
            completed_at: None,
        }
    }

    /// Stamp each stage with the time it was left, from `(from, to, at)`
    /// transitions in log order. A stage is stamped by the transition out of
    /// its pending status; withdrawals decide nothing and are skipped.
    pub fn with_timeline<I>(mut self, transitions: I) -> Self
    where
        I: IntoIterator<Item = (Option<ApplicationStatus>, ApplicationStatus, DateTime<Utc>)>,
    {
        use ApplicationStatus::*;
        for (from, to, at) in transitions {
            if to == Withdrawn {
                continue;
            }
            let slot = match from {
                None => &mut self.submitted_at,
                Some(PendingInstructor) => &mut self.instructor_reviewed_at,
                Some(PendingSupervisor) => &mut self.supervisor_assigned_at,
                Some(PendingCommittee) => &mut self.committee_decided_at,
                Some(PendingDocuments) => &mut self.sent_to_company_at,
                Some(SentToCompany) => &mut self.company_responded_at,
                Some(InProgress) => &mut self.completed_at,
                Some(Completed | Rejected | Withdrawn) => continue,
            };
            *slot = Some(at);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        for status in ApplicationStatus::all() {
            assert_eq!(status.as_str().parse::<ApplicationStatus>().unwrap(), *status);
        }
        assert_eq!(
            "sent-to-company".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::SentToCompany
        );
        assert!("approved".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(ApplicationStatus::Completed.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(ApplicationStatus::Withdrawn.is_terminal());
        assert!(!ApplicationStatus::SentToCompany.is_terminal());
    }

    #[test]
    fn test_progress_fresh_application() {
        let p = StageProgress::derive(ApplicationStatus::PendingInstructor, None);
        assert!(p.instructor_received);
        assert!(!p.instructor_reviewed);
        assert_eq!(p.course_instructor_status, VoteStatus::Pending);
        assert!(!p.supervisor_assigned);
        assert_eq!(p.committee_status, VoteStatus::Pending);
    }

    #[test]
    fn test_progress_flags_never_contradict() {
        // instructor_reviewed implies the course instructor status is decided
        for status in ApplicationStatus::all() {
            for stopped in ApplicationStatus::all() {
                let p = StageProgress::derive(*status, Some(*stopped));
                if p.instructor_reviewed {
                    assert_ne!(p.course_instructor_status, VoteStatus::Pending);
                }
                if p.document_sent_to_company {
                    assert_eq!(p.committee_status, VoteStatus::Approved);
                }
                if p.supervisor_assigned {
                    assert_eq!(p.course_instructor_status, VoteStatus::Approved);
                }
            }
        }
    }

    #[test]
    fn test_progress_committee_rejection() {
        let p = StageProgress::derive(
            ApplicationStatus::Rejected,
            Some(ApplicationStatus::PendingCommittee),
        );
        assert_eq!(p.course_instructor_status, VoteStatus::Approved);
        assert!(p.supervisor_assigned);
        assert_eq!(p.committee_status, VoteStatus::Rejected);
        assert!(!p.document_sent_to_company);
    }

    #[test]
    fn test_progress_in_progress() {
        let p = StageProgress::derive(ApplicationStatus::InProgress, None);
        assert_eq!(p.committee_status, VoteStatus::Approved);
        assert!(p.document_sent_to_company);
        assert_eq!(p.company_status, VoteStatus::Approved);
        assert!(!p.completed);
    }

    #[test]
    fn test_timeline_stamps_stages() {
        use chrono::TimeZone;
        use ApplicationStatus::*;
        let day = |d: u32| Utc.with_ymd_and_hms(2026, 3, d, 9, 0, 0).unwrap();

        let p = StageProgress::derive(Rejected, Some(PendingCommittee)).with_timeline([
            (None, PendingInstructor, day(1)),
            (Some(PendingInstructor), PendingSupervisor, day(2)),
            (Some(PendingSupervisor), PendingCommittee, day(3)),
            (Some(PendingCommittee), Rejected, day(5)),
        ]);
        assert_eq!(p.submitted_at, Some(day(1)));
        assert_eq!(p.instructor_reviewed_at, Some(day(2)));
        assert_eq!(p.supervisor_assigned_at, Some(day(3)));
        assert_eq!(p.committee_decided_at, Some(day(5)));
        assert_eq!(p.sent_to_company_at, None);
        assert_eq!(p.completed_at, None);
    }

    #[test]
    fn test_timeline_ignores_withdrawal() {
        use chrono::TimeZone;
        use ApplicationStatus::*;
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

        let p = StageProgress::derive(Withdrawn, Some(PendingInstructor))
            .with_timeline([(None, PendingInstructor, at), (Some(PendingInstructor), Withdrawn, at)]);
        assert_eq!(p.submitted_at, Some(at));
        assert_eq!(p.instructor_reviewed_at, None);
    }

    #[test]
    fn test_decision_from_flags() {
        assert_eq!(Decision::from_flags(true, false), Some(Decision::Approve));
        assert_eq!(Decision::from_flags(false, true), Some(Decision::Reject));
        assert_eq!(Decision::from_flags(true, true), None);
        assert_eq!(Decision::from_flags(false, false), None);
    }
}
