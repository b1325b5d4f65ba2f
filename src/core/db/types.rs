//! Record types read from and written to the portal database

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::core::identity::EntityId;
use crate::core::role::{Role, RoleSet};
use crate::core::status::{ApplicationStatus, StageProgress, VoteStatus};

// =========================================================================
// People and catalog
// =========================================================================

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: EntityId,
    pub row: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub roles: RoleSet,
    pub active: bool,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Company {
    pub id: EntityId,
    pub row: i64,
    pub name: String,
    pub address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Internship {
    pub id: EntityId,
    pub row: i64,
    pub company_id: EntityId,
    pub company_name: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub positions: u32,
    pub open: bool,
    pub created: DateTime<Utc>,
}

// =========================================================================
// Applications
// =========================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: EntityId,
    pub row: i64,
    pub student_id: EntityId,
    pub student_username: String,
    pub student_name: String,
    pub internship_id: EntityId,
    pub internship_title: String,
    pub company_name: String,
    pub instructor_id: EntityId,
    pub instructor_username: String,
    pub supervisor_id: Option<EntityId>,
    pub supervisor_username: Option<String>,
    pub status: ApplicationStatus,
    /// Status held when the application was rejected or withdrawn
    pub stopped_at: Option<ApplicationStatus>,
    pub version: i64,
    pub statement: String,
    pub instructor_feedback: Option<String>,
    pub staff_feedback: Option<String>,
    pub company_note: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Application {
    /// Per-stage flags derived from the status, without timestamps
    pub fn progress(&self) -> StageProgress {
        StageProgress::derive(self.status, self.stopped_at)
    }
}

/// One entry in an application's status history
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationEvent {
    pub seq: i64,
    pub application_id: EntityId,
    pub from_status: Option<ApplicationStatus>,
    pub to_status: ApplicationStatus,
    pub actor_username: String,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Filter for application listings
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub student_id: Option<EntityId>,
    pub instructor_id: Option<EntityId>,
    pub supervisor_id: Option<EntityId>,
    /// Applications with an active committee assignment for this member
    pub committee_member_id: Option<EntityId>,
    pub internship_id: Option<EntityId>,
}

// =========================================================================
// Committee
// =========================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeAssignment {
    pub application_id: EntityId,
    pub member_id: EntityId,
    pub member_username: String,
    pub member_name: String,
    pub status: VoteStatus,
    pub comment: Option<String>,
    pub active: bool,
    pub assigned_at: DateTime<Utc>,
    pub voted_at: Option<DateTime<Utc>>,
}

// =========================================================================
// Documents and visits
// =========================================================================

/// Kinds of generated documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Letter asking the company to accept the student
    AcceptanceRequest,
    /// Letter telling the student the application was approved
    ApprovalLetter,
    /// Notice to the supervisor about the assignment
    SupervisorAssignment,
    /// Certificate issued after completion
    CompletionCertificate,
}

impl DocumentKind {
    pub fn all() -> &'static [DocumentKind] {
        &[
            DocumentKind::AcceptanceRequest,
            DocumentKind::ApprovalLetter,
            DocumentKind::SupervisorAssignment,
            DocumentKind::CompletionCertificate,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::AcceptanceRequest => "acceptance_request",
            DocumentKind::ApprovalLetter => "approval_letter",
            DocumentKind::SupervisorAssignment => "supervisor_assignment",
            DocumentKind::CompletionCertificate => "completion_certificate",
        }
    }

    /// Template file name, shared by embedded defaults and project overrides
    pub fn template_name(&self) -> String {
        format!("{}.html", self.as_str())
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DocumentKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("Unknown document kind: {}", s))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: EntityId,
    pub row: i64,
    pub application_id: EntityId,
    pub kind: DocumentKind,
    pub file_path: PathBuf,
    pub sha256: String,
    pub generated_by: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Ok(VisitStatus::Scheduled),
            "completed" => Ok(VisitStatus::Completed),
            "cancelled" | "canceled" => Ok(VisitStatus::Cancelled),
            _ => Err(format!("Unknown visit status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Visit {
    pub id: EntityId,
    pub row: i64,
    pub application_id: EntityId,
    pub supervisor_id: EntityId,
    pub supervisor_username: String,
    pub scheduled_for: DateTime<Utc>,
    pub location: String,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created: DateTime<Utc>,
}
