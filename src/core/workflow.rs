//! Workflow engine for application status transitions and authorization
//!
//! Every status change in the portal goes through [`WorkflowEngine`]: it owns
//! the transition table and decides which actor may trigger which action.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::role::{Role, RoleSet};
use crate::core::status::ApplicationStatus;

/// Workflow configuration from project config
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Committee members that must be assigned before voting can decide
    pub min_committee_size: usize,

    /// Require a completed supervisor visit before an internship can be completed
    pub require_visit_for_completion: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl WorkflowConfig {
    /// Create workflow config with sensible defaults
    pub fn with_defaults() -> Self {
        Self {
            min_committee_size: 1,
            require_visit_for_completion: true,
        }
    }
}

/// Something a user asks the portal to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ManageUsers,
    ManageCatalog,
    Submit,
    Withdraw,
    InstructorReview,
    AssignSupervisor,
    ManageCommittee,
    Vote,
    GenerateDocument,
    SendToCompany,
    RecordCompanyResponse,
    ScheduleVisit,
    Complete,
    ViewAll,
}

impl Action {
    fn describe(&self) -> &'static str {
        match self {
            Action::ManageUsers => "manage users",
            Action::ManageCatalog => "manage companies and internships",
            Action::Submit => "submit an application",
            Action::Withdraw => "withdraw this application",
            Action::InstructorReview => "review this application as course instructor",
            Action::AssignSupervisor => "assign a supervisor",
            Action::ManageCommittee => "manage the committee",
            Action::Vote => "vote on this application",
            Action::GenerateDocument => "generate documents",
            Action::SendToCompany => "send documents to the company",
            Action::RecordCompanyResponse => "record the company response",
            Action::ScheduleVisit => "manage supervisor visits",
            Action::Complete => "complete this internship",
            Action::ViewAll => "view all applications",
        }
    }
}

/// The acting user and their relationship to the application at hand
#[derive(Debug, Clone, Default)]
pub struct ActorContext {
    pub roles: RoleSet,
    /// Actor is the student who owns the application
    pub is_owner: bool,
    /// Actor is the application's course instructor
    pub is_instructor: bool,
    /// Actor is the application's assigned supervisor
    pub is_supervisor: bool,
    /// Actor holds an active committee assignment on the application
    pub is_committee_member: bool,
}

impl ActorContext {
    pub fn with_roles(roles: RoleSet) -> Self {
        Self {
            roles,
            ..Default::default()
        }
    }
}

/// Errors that can occur during workflow operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid status transition: {from} → {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Not allowed to {action}: requires {required}")]
    Unauthorized { action: String, required: String },

    #[error("Application is not in {expected} status (current: {current})")]
    WrongStatus {
        expected: ApplicationStatus,
        current: ApplicationStatus,
    },
}

/// Workflow engine for managing status transitions
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    config: WorkflowConfig,
}

impl WorkflowEngine {
    /// Create a new workflow engine
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Get the workflow configuration
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Check if a status transition is valid
    pub fn is_valid_transition(&self, from: ApplicationStatus, to: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (from, to),
            // Forward path
            (PendingInstructor, PendingSupervisor)
                | (PendingSupervisor, PendingCommittee)
                | (PendingCommittee, PendingDocuments)
                | (PendingDocuments, SentToCompany)
                | (SentToCompany, InProgress)
                | (InProgress, Completed)
                // Rejections
                | (PendingInstructor, Rejected)
                | (PendingCommittee, Rejected)
                | (SentToCompany, Rejected)
                // Withdrawal before the company is involved
                | (PendingInstructor, Withdrawn)
                | (PendingSupervisor, Withdrawn)
                | (PendingCommittee, Withdrawn)
                | (PendingDocuments, Withdrawn)
        )
    }

    /// Get allowed transitions from the current status
    pub fn allowed_transitions(&self, current: ApplicationStatus) -> Vec<ApplicationStatus> {
        ApplicationStatus::all()
            .iter()
            .copied()
            .filter(|to| self.is_valid_transition(current, *to))
            .collect()
    }

    /// Verify a transition is legal, returning the matching error if not
    pub fn check_transition(
        &self,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<(), WorkflowError> {
        if self.is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition { from, to })
        }
    }

    /// Verify the application is in the status an action expects
    pub fn expect_status(
        &self,
        current: ApplicationStatus,
        expected: ApplicationStatus,
    ) -> Result<(), WorkflowError> {
        if current == expected {
            Ok(())
        } else {
            Err(WorkflowError::WrongStatus { expected, current })
        }
    }

    /// Check whether the actor may perform the action. Admins may do anything.
    pub fn authorize(&self, action: Action, actor: &ActorContext) -> Result<(), WorkflowError> {
        if actor.roles.is_admin() {
            return Ok(());
        }

        let (allowed, required) = match action {
            Action::ManageUsers => (false, "admin role"),
            Action::ManageCatalog
            | Action::AssignSupervisor
            | Action::ManageCommittee
            | Action::GenerateDocument
            | Action::SendToCompany
            | Action::RecordCompanyResponse
            | Action::ViewAll => (actor.roles.contains(Role::Staff), "staff role"),
            Action::Submit => (actor.roles.contains(Role::Student), "student role"),
            Action::Withdraw => (
                actor.is_owner && actor.roles.contains(Role::Student),
                "the student who submitted it",
            ),
            Action::InstructorReview => (
                actor.is_instructor && actor.roles.contains(Role::Instructor),
                "the assigned course instructor",
            ),
            Action::Vote => (
                actor.is_committee_member && actor.roles.contains(Role::Committee),
                "an assigned committee member",
            ),
            Action::ScheduleVisit => (
                actor.is_supervisor && actor.roles.contains(Role::Supervisor),
                "the assigned supervisor",
            ),
            Action::Complete => (
                (actor.is_supervisor && actor.roles.contains(Role::Supervisor))
                    || actor.roles.contains(Role::Staff),
                "the assigned supervisor or staff role",
            ),
        };

        if allowed {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized {
                action: action.describe().to_string(),
                required: required.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(WorkflowConfig::with_defaults())
    }

    fn actor(roles: &[Role]) -> ActorContext {
        ActorContext::with_roles(RoleSet::new(roles.iter().copied()))
    }

    #[test]
    fn test_valid_transitions() {
        let engine = engine();

        assert!(engine.is_valid_transition(PendingInstructor, PendingSupervisor));
        assert!(engine.is_valid_transition(PendingSupervisor, PendingCommittee));
        assert!(engine.is_valid_transition(PendingCommittee, PendingDocuments));
        assert!(engine.is_valid_transition(PendingDocuments, SentToCompany));
        assert!(engine.is_valid_transition(SentToCompany, InProgress));
        assert!(engine.is_valid_transition(InProgress, Completed));

        assert!(engine.is_valid_transition(PendingCommittee, Rejected));
        assert!(engine.is_valid_transition(SentToCompany, Rejected));

        // Skipping stages is not allowed
        assert!(!engine.is_valid_transition(PendingInstructor, PendingCommittee));
        assert!(!engine.is_valid_transition(PendingSupervisor, PendingDocuments));
        // Supervisor assignment is not a rejection point
        assert!(!engine.is_valid_transition(PendingSupervisor, Rejected));
        // No withdrawal once the company is involved
        assert!(!engine.is_valid_transition(SentToCompany, Withdrawn));
        assert!(!engine.is_valid_transition(InProgress, Withdrawn));
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        let engine = engine();
        for status in ApplicationStatus::all() {
            if status.is_terminal() {
                assert!(engine.allowed_transitions(*status).is_empty(), "{}", status);
            } else {
                assert!(!engine.allowed_transitions(*status).is_empty(), "{}", status);
            }
        }
    }

    #[test]
    fn test_allowed_transitions() {
        let engine = engine();
        assert_eq!(
            engine.allowed_transitions(PendingCommittee),
            vec![PendingDocuments, Rejected, Withdrawn]
        );
        assert_eq!(
            engine.allowed_transitions(SentToCompany),
            vec![InProgress, Rejected]
        );
    }

    #[test]
    fn test_check_transition_error() {
        let err = engine().check_transition(Completed, InProgress).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::InvalidTransition {
                from: Completed,
                to: InProgress
            }
        );
    }

    #[test]
    fn test_staff_actions() {
        let engine = engine();
        let staff = actor(&[Role::Staff]);
        assert!(engine.authorize(Action::AssignSupervisor, &staff).is_ok());
        assert!(engine.authorize(Action::SendToCompany, &staff).is_ok());
        assert!(engine.authorize(Action::ManageUsers, &staff).is_err());

        let student = actor(&[Role::Student]);
        assert!(engine.authorize(Action::AssignSupervisor, &student).is_err());
    }

    #[test]
    fn test_relationship_required() {
        let engine = engine();

        let mut instructor = actor(&[Role::Instructor]);
        assert!(engine.authorize(Action::InstructorReview, &instructor).is_err());
        instructor.is_instructor = true;
        assert!(engine.authorize(Action::InstructorReview, &instructor).is_ok());

        // Committee role alone does not grant a vote
        let mut member = actor(&[Role::Committee]);
        assert!(engine.authorize(Action::Vote, &member).is_err());
        member.is_committee_member = true;
        assert!(engine.authorize(Action::Vote, &member).is_ok());

        // Assignment without the role does not either
        let mut stale = actor(&[Role::Student]);
        stale.is_committee_member = true;
        assert!(engine.authorize(Action::Vote, &stale).is_err());
    }

    #[test]
    fn test_admin_bypass() {
        let engine = engine();
        let admin = actor(&[Role::Admin]);
        assert!(engine.authorize(Action::Vote, &admin).is_ok());
        assert!(engine.authorize(Action::ManageUsers, &admin).is_ok());
        assert!(engine.authorize(Action::Withdraw, &admin).is_ok());
    }

    #[test]
    fn test_unauthorized_message() {
        let err = engine()
            .authorize(Action::Vote, &actor(&[Role::Student]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not allowed to vote on this application: requires an assigned committee member"
        );
    }
}
