// gov-http/src/handlers/actions.rs
// ============================================================================
// Module: Mutating Action Handlers
// Description: The `POST /ops/actions/*` and `POST /ops/ext/call` handlers.
// Purpose: Bridge axum's async request/response cycle to the synchronous
//          governance engine, broker, and store calls via
//          `tokio::task::spawn_blocking` (§4.6, SPEC_FULL §4.6).
// Dependencies: axum, gov-broker, gov-core, tokio
// ============================================================================

//! ## Overview
//! Every handler here follows the same shape: deserialize the body,
//! `spawn_blocking` a closure that calls one synchronous engine/broker/store
//! method, and map its `Result` through `?` into an [`ApiError`] response.
//! [`run_blocking`] centralizes the `JoinError` → `ApiError::Internal`
//! mapping so individual handlers never see it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use gov_core::Task;
use gov_core::ids;
use gov_core::model::Message;
use gov_core::model::Topic;
use gov_core::model::TopicStatus;
use gov_core::sanitize;
use gov_core::time;

use crate::error::ApiError;
use crate::handlers::dto::ApproveBody;
use crate::handlers::dto::AssignBody;
use crate::handlers::dto::ChatBody;
use crate::handlers::dto::CommentBody;
use crate::handlers::dto::CreateTaskBody;
use crate::handlers::dto::CreateTopicBody;
use crate::handlers::dto::DocsUpdatedBody;
use crate::handlers::dto::DodBody;
use crate::handlers::dto::EvidenceBody;
use crate::handlers::dto::EvidenceBulkBody;
use crate::handlers::dto::ExtCallBody;
use crate::handlers::dto::MarkReadBody;
use crate::handlers::dto::MarkReadResponse;
use crate::handlers::dto::OverrideBody;
use crate::handlers::dto::TransitionBody;
use crate::state::AppState;

// ============================================================================
// SECTION: Blocking Bridge
// ============================================================================

/// Runs `f` on the blocking thread pool and flattens a `JoinError` into
/// [`ApiError::Internal`].
async fn run_blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .map_err(Into::into)
}

// ============================================================================
// SECTION: Governed Task Commands
// ============================================================================

/// `POST /ops/actions/create`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn create(State(state): State<AppState>, Json(body): Json<CreateTaskBody>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let result = run_blocking(move || engine.create_task(body.into_cmd())).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `POST /ops/actions/transition`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn transition(State(state): State<AppState>, Json(body): Json<TransitionBody>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task_id = body.task_id.clone();
    run_blocking(move || engine.transition(body.into_cmd())).await?;
    let engine = state.engine.clone();
    let task = run_blocking(move || engine.get_task(&task_id)).await?;
    Ok(Json(task))
}

/// `POST /ops/actions/assign`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn assign(State(state): State<AppState>, Json(body): Json<AssignBody>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task_id = body.task_id.clone();
    run_blocking(move || engine.assign(body.into_cmd())).await?;
    let engine = state.engine.clone();
    let task = run_blocking(move || engine.get_task(&task_id)).await?;
    Ok(Json(task))
}

/// `POST /ops/actions/approve`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn approve(State(state): State<AppState>, Json(body): Json<ApproveBody>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task_id = body.task_id.clone();
    run_blocking(move || engine.approve(body.into_cmd())).await?;
    let engine = state.engine.clone();
    let task = run_blocking(move || engine.get_task(&task_id)).await?;
    Ok(Json(task))
}

/// `POST /ops/actions/override`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn override_task(State(state): State<AppState>, Json(body): Json<OverrideBody>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task_id = body.task_id.clone();
    run_blocking(move || engine.override_task(body.into_cmd())).await?;
    let engine = state.engine.clone();
    let task = run_blocking(move || engine.get_task(&task_id)).await?;
    Ok(Json(task))
}

/// `POST /ops/actions/comment`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn comment(State(state): State<AppState>, Json(body): Json<CommentBody>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let result = run_blocking(move || engine.comment(body.into_cmd())).await?;
    Ok(Json(result))
}

/// `POST /ops/actions/dod`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn dod(State(state): State<AppState>, Json(body): Json<DodBody>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let result = run_blocking(move || engine.dod_update(body.into_cmd())).await?;
    Ok(Json(result))
}

/// `POST /ops/actions/evidence`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn evidence(State(state): State<AppState>, Json(body): Json<EvidenceBody>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task_id = body.task_id.clone();
    run_blocking(move || engine.evidence(body.into_cmd())).await?;
    let engine = state.engine.clone();
    let task = run_blocking(move || engine.get_task(&task_id)).await?;
    Ok(Json(task))
}

/// `POST /ops/actions/evidence/bulk`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn evidence_bulk(State(state): State<AppState>, Json(body): Json<EvidenceBulkBody>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task_id = body.task_id.clone();
    run_blocking(move || engine.evidence_bulk(body.into_cmd())).await?;
    let engine = state.engine.clone();
    let task = run_blocking(move || engine.get_task(&task_id)).await?;
    Ok(Json(task))
}

/// `POST /ops/actions/docsUpdated`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] for any policy or validation failure.
pub async fn docs_updated(State(state): State<AppState>, Json(body): Json<DocsUpdatedBody>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task_id = body.task_id.clone();
    run_blocking(move || engine.docs_updated(body.into_cmd())).await?;
    let engine = state.engine.clone();
    let task = run_blocking(move || engine.get_task(&task_id)).await?;
    Ok(Json(task))
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

/// `POST /ops/actions/notifications/markRead`.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] on a store failure.
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    Json(body): Json<MarkReadBody>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let store = state.store.clone();
    let marked = run_blocking(move || store.mark_notifications_read(&body.ids)).await?;
    Ok(Json(MarkReadResponse { marked }))
}

// ============================================================================
// SECTION: Chat and Topics
// ============================================================================

/// `POST /ops/actions/chat`. Writes a message row directly against the
/// store; chat is not a governed command and carries no policy check
/// (§1 messaging bus is an external collaborator, out of scope).
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if the text is empty after
/// sanitization or exceeds the raw length limit, or [`ApiError::Internal`]
/// on a store failure.
pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Result<(StatusCode, Json<Message>), ApiError> {
    let text = sanitize::sanitize_comment(&body.text).map_err(|err| ApiError::validation(err.to_string()))?;
    let actor = sanitize::resolve_actor(body.actor.as_deref());
    let now = time::now_iso8601_ms();
    let message =
        Message { id: 0, group_folder: body.group_folder, actor, text, timestamp: now.clone(), task_id: body.task_id };
    let store = state.store.clone();
    let to_insert = message.clone();
    let id = run_blocking(move || store.insert_message(&to_insert, &now)).await?;
    Ok((StatusCode::CREATED, Json(Message { id, ..message })))
}

/// `POST /ops/actions/topic`.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] on a store failure.
pub async fn create_topic(State(state): State<AppState>, Json(body): Json<CreateTopicBody>) -> Result<(StatusCode, Json<Topic>), ApiError> {
    let now = time::now_iso8601_ms();
    let topic = Topic {
        id: ids::new_topic_id(),
        group_folder: body.group_folder,
        title: body.title,
        status: TopicStatus::Active,
        created_at: now.clone(),
        last_activity: now,
        group_jid: body.group_jid,
    };
    let store = state.store.clone();
    let to_insert = topic.clone();
    run_blocking(move || store.create_topic(&to_insert)).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

// ============================================================================
// SECTION: External Access
// ============================================================================

/// `POST /ops/ext/call`. Added beyond §4.6's endpoint list so the
/// broker is reachable over HTTP at all (§2's control-flow line names an
/// "External call: HTTP(G) -> broker(E)" path with no corresponding
/// endpoint in the §4.6 list).
///
/// # Errors
///
/// Returns [`ApiError::Broker`] for any authorization-order failure.
pub async fn ext_call(
    State(state): State<AppState>,
    Json(body): Json<ExtCallBody>,
) -> Result<Json<gov_core::model::ExtCall>, ApiError> {
    let broker = state.broker.clone();
    let call = run_blocking(move || broker.call(body.into_cmd())).await?;
    Ok(Json(call))
}
