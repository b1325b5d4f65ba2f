//! Error type shared by storage, workflow and service operations

use thiserror::Error;

use crate::core::identity::IdParseError;
use crate::core::project::ProjectError;
use crate::core::workflow::WorkflowError;

/// Errors returned by portal operations
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{kind} not found: {reference}")]
    NotFound { kind: &'static str, reference: String },

    #[error("'{reference}' matches more than one {kind}; use a longer ID")]
    Ambiguous { kind: &'static str, reference: String },

    #[error("No acting user. Pass --as <username>, set PORTAL_USER, or add 'user:' to .portal/config.yaml")]
    NoActingUser,

    #[error("User '{0}' is deactivated")]
    InactiveUser(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("{0} has already voted on this application")]
    AlreadyVoted(String),

    #[error("{0} is not on the committee for this application")]
    NotOnCommittee(String),

    #[error("Application was modified concurrently (expected version {expected}); reload and retry")]
    Conflict { expected: i64 },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Id(#[from] IdParseError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortalError {
    pub fn validation(message: impl Into<String>) -> Self {
        PortalError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, reference: impl Into<String>) -> Self {
        PortalError::NotFound {
            kind,
            reference: reference.into(),
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
