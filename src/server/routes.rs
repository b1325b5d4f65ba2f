//! Route handlers
//!
//! Handlers translate JSON into portal calls. The database work runs on the
//! blocking pool with a connection opened for the request.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::error::ApiError;
use super::state::AppState;
use crate::core::db::{Application, ApplicationEvent, DocumentKind, DocumentRecord, User, Visit};
use crate::core::error::PortalResult;
use crate::core::portal::{ApplicationDetail, CommitteeView, Dashboard, Portal};
use crate::core::status::{ApplicationStatus, Decision};

pub const USER_HEADER: &str = "x-portal-user";
pub const CSRF_HEADER: &str = "x-portal-csrf";

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn acting_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the acting user and run `op` on the blocking pool
async fn run<T, F>(state: AppState, headers: &HeaderMap, op: F) -> ApiResult<T>
where
    T: Serialize + Send + 'static,
    F: FnOnce(&mut Portal, &User) -> PortalResult<T> + Send + 'static,
{
    let username = acting_user(headers);
    let data = tokio::task::spawn_blocking(move || {
        let mut portal = state.open_portal()?;
        let actor = portal.acting_user(username.as_deref())?;
        op(&mut portal, &actor)
    })
    .await??;
    Ok(Json(ApiResponse::ok(data)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Mutating requests need the CSRF header, a known acting user, and room in
/// that user's rate budget
pub async fn guard_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = request.method();
    if method != Method::GET && method != Method::HEAD && method != Method::OPTIONS {
        let csrf = request.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok());
        if csrf != Some("1") {
            return Err(ApiError::CsrfMissing);
        }

        let username = acting_user(request.headers());
        let lookup = state.clone();
        let actor = tokio::task::spawn_blocking(move || {
            lookup.open_portal()?.acting_user(username.as_deref())
        })
        .await??;
        if !state.check_rate(&actor.id) {
            warn!(user = %actor.username, "rate limit exceeded");
            return Err(ApiError::RateLimited);
        }
    }
    Ok(next.run(request).await)
}

// =========================================================================
// Reads
// =========================================================================

pub async fn health() -> Json<Value> {
    Json(json!({ "success": true, "data": { "status": "ok" } }))
}

pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Dashboard> {
    run(state, &headers, |portal, actor| portal.dashboard(actor)).await
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ApplicationStatus>,
}

pub async fn list_applications(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<Application>> {
    let Query(query) = query.map_err(|r| ApiError::BadRequest(r.body_text()))?;
    run(state, &headers, move |portal, actor| {
        portal.list_applications(actor, query.status)
    })
    .await
}

pub async fn show_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<ApplicationDetail> {
    run(state, &headers, move |portal, actor| {
        portal.show_application(actor, &id)
    })
    .await
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Vec<ApplicationEvent>> {
    run(state, &headers, move |portal, actor| portal.history(actor, &id)).await
}

pub async fn committee_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<CommitteeView> {
    run(state, &headers, move |portal, actor| {
        portal.committee_status(actor, &id)
    })
    .await
}

pub async fn list_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Vec<DocumentRecord>> {
    run(state, &headers, move |portal, actor| {
        portal.list_documents(actor, &id)
    })
    .await
}

pub async fn list_visits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Vec<Visit>> {
    run(state, &headers, move |portal, actor| portal.list_visits(actor, &id)).await
}

// =========================================================================
// Application workflow
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub internship: String,
    pub instructor: String,
    pub statement: String,
}

pub async fn submit_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmitBody>, JsonRejection>,
) -> ApiResult<Application> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.submit_application(actor, &input.internship, &input.instructor, &input.statement)
    })
    .await
}

/// Body for operations that only carry an optional note
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NoteBody {
    pub note: Option<String>,
}

pub async fn withdraw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<NoteBody>, JsonRejection>,
) -> ApiResult<Application> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.withdraw_application(actor, &id, input.note.as_deref())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub decision: Decision,
    #[serde(default, alias = "feedback")]
    pub comment: Option<String>,
}

pub async fn instructor_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<DecisionBody>, JsonRejection>,
) -> ApiResult<Application> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.instructor_review(actor, &id, input.decision, input.comment.as_deref())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct SupervisorBody {
    pub supervisor: String,
}

pub async fn assign_supervisor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<SupervisorBody>, JsonRejection>,
) -> ApiResult<Application> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.assign_supervisor(actor, &id, &input.supervisor)
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct CommitteeBody {
    pub members: Vec<String>,
}

pub async fn assign_committee(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<CommitteeBody>, JsonRejection>,
) -> ApiResult<CommitteeView> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.assign_committee(actor, &id, &input.members)
    })
    .await
}

pub async fn remove_committee_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, member)): Path<(String, String)>,
) -> ApiResult<CommitteeView> {
    run(state, &headers, move |portal, actor| {
        portal.remove_committee_member(actor, &id, &member)
    })
    .await
}

pub async fn cast_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<DecisionBody>, JsonRejection>,
) -> ApiResult<CommitteeView> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.cast_vote(actor, &id, input.decision, input.comment.as_deref())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct DocumentBody {
    pub kind: DocumentKind,
}

pub async fn generate_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<DocumentBody>, JsonRejection>,
) -> ApiResult<DocumentRecord> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.generate_document(actor, &id, input.kind)
    })
    .await
}

pub async fn send_to_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<NoteBody>, JsonRejection>,
) -> ApiResult<Application> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.send_to_company(actor, &id, input.note.as_deref())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct CompanyResponseBody {
    pub accepted: bool,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn company_response(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<CompanyResponseBody>, JsonRejection>,
) -> ApiResult<Application> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.record_company_response(actor, &id, input.accepted, input.note.as_deref())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct VisitBody {
    pub at: DateTime<Utc>,
    pub location: String,
}

pub async fn schedule_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<VisitBody>, JsonRejection>,
) -> ApiResult<Visit> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.schedule_visit(actor, &id, input.at, &input.location)
    })
    .await
}

pub async fn complete_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<NoteBody>, JsonRejection>,
) -> ApiResult<Visit> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.complete_visit(actor, &id, input.note.as_deref())
    })
    .await
}

pub async fn cancel_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<NoteBody>, JsonRejection>,
) -> ApiResult<Visit> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.cancel_visit(actor, &id, input.note.as_deref())
    })
    .await
}

pub async fn complete_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<NoteBody>, JsonRejection>,
) -> ApiResult<Application> {
    let input = body(payload)?;
    run(state, &headers, move |portal, actor| {
        portal.complete_application(actor, &id, input.note.as_deref())
    })
    .await
}
