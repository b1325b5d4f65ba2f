//! Core module - domain types, storage and the portal service layer

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod portal;
pub mod project;
pub mod quorum;
pub mod role;
pub mod status;
pub mod workflow;

pub use config::Config;
pub use db::Database;
pub use error::{PortalError, PortalResult};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use portal::Portal;
pub use project::{Project, ProjectError};
pub use quorum::{tally, QuorumOutcome, QuorumSummary};
pub use role::{Role, RoleSet};
pub use status::{ApplicationStatus, Decision, StageProgress, VoteStatus};
pub use workflow::{Action, ActorContext, WorkflowConfig, WorkflowEngine, WorkflowError};
