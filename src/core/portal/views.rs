//! Read models returned by portal operations

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::db::{
    Application, ApplicationEvent, CommitteeAssignment, DocumentRecord, Visit,
};
use crate::core::identity::EntityId;
use crate::core::quorum::{QuorumOutcome, QuorumSummary};
use crate::core::role::RoleSet;
use crate::core::status::{ApplicationStatus, StageProgress};

/// Committee members of an application with the current tally
#[derive(Debug, Clone, Serialize)]
pub struct CommitteeView {
    pub application: Application,
    pub summary: QuorumSummary,
    pub outcome: QuorumOutcome,
    /// Active members first, then removed ones
    pub members: Vec<CommitteeAssignment>,
}

/// Everything known about one application
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetail {
    pub application: Application,
    pub progress: StageProgress,
    pub allowed_transitions: Vec<ApplicationStatus>,
    pub committee: QuorumSummary,
    pub members: Vec<CommitteeAssignment>,
    pub documents: Vec<DocumentRecord>,
    pub visits: Vec<Visit>,
    pub events: Vec<ApplicationEvent>,
}

/// Per-role work queues for the acting user
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub username: String,
    pub roles: RoleSet,
    /// Applications per status; staff and admins only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<BTreeMap<ApplicationStatus, usize>>,
    /// Student: own applications
    pub my_applications: Vec<Application>,
    /// Instructor: applications waiting for review
    pub awaiting_review: Vec<Application>,
    /// Committee: applications waiting for this member's vote
    pub awaiting_vote: Vec<Application>,
    /// Supervisor: open applications being supervised
    pub supervising: Vec<Application>,
    pub upcoming_visits: Vec<Visit>,
    /// Staff: applications waiting on the internship office
    pub staff_queue: Vec<Application>,
}

impl Dashboard {
    /// Total number of queued items across all queues
    pub fn queued(&self) -> usize {
        self.awaiting_review.len()
            + self.awaiting_vote.len()
            + self.staff_queue.len()
            + self.upcoming_visits.len()
    }
}

/// Placement figures for one internship
#[derive(Debug, Clone, Serialize)]
pub struct InternshipLoad {
    pub id: EntityId,
    pub title: String,
    pub company_name: String,
    pub positions: u32,
    pub filled: u32,
    pub applications: usize,
    pub open: bool,
}

/// Office-wide summary report
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub counts: BTreeMap<ApplicationStatus, usize>,
    pub internships: Vec<InternshipLoad>,
}
