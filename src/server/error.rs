//! HTTP error mapping
//!
//! Every failure leaves the server as `{ "success": false, "error": "..." }`
//! with a status code derived from the domain error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::core::error::PortalError;
use crate::core::workflow::WorkflowError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Portal(#[from] PortalError),

    #[error("Missing X-Portal-Csrf header")]
    CsrfMissing,

    #[error("Rate limit exceeded; try again shortly")]
    RateLimited,

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Portal(err) => portal_status(err),
            ApiError::CsrfMissing => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn portal_status(err: &PortalError) -> StatusCode {
    match err {
        PortalError::NotFound { .. } => StatusCode::NOT_FOUND,
        PortalError::NoActingUser
        | PortalError::InactiveUser(_)
        | PortalError::NotOnCommittee(_)
        | PortalError::Workflow(WorkflowError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
        PortalError::Workflow(_) | PortalError::AlreadyVoted(_) | PortalError::Conflict { .. } => {
            StatusCode::CONFLICT
        }
        PortalError::Validation(_) | PortalError::Ambiguous { .. } | PortalError::Id(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PortalError::Project(_)
        | PortalError::Database(_)
        | PortalError::Template(_)
        | PortalError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}
