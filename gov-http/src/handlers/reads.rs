// gov-http/src/handlers/reads.rs
// ============================================================================
// Module: Read Handlers
// Description: The `GET /ops/*` handlers.
// Purpose: Serve task/activity/topic/message/notification snapshots without
//          going through the write command pipeline (§4.6, §5 "read-only
//          operations may proceed concurrently").
// Dependencies: axum, gov-core, tokio
// ============================================================================

//! ## Overview
//! Reads never touch the policy kernel; they either call
//! [`gov_core::GovernanceEngine::get_task`]/`list_activities` or go straight
//! to the raw [`gov_store_sqlite::SqliteStore`] for the cockpit-only rows
//! (topics, messages, notifications) that have no `GovernanceStore` seam.
//! `GET /ops/messages`'s `group_jid` is resolved from the `group` query
//! parameter's most-recently-active topic — the wire contract (§6) names
//! the field but not its source, and no topic is the obvious candidate
//! otherwise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use gov_core::Activity;
use gov_core::Task;
use gov_core::model::Notification;
use gov_core::model::Topic;

use crate::error::ApiError;
use crate::handlers::dto::MessagesQuery;
use crate::handlers::dto::MessagesResponse;
use crate::handlers::dto::NotificationsQuery;
use crate::handlers::dto::TopicsQuery;
use crate::state::AppState;

/// Default page size for `GET /ops/messages` and `GET /ops/notifications`
/// when no `limit` is supplied.
const DEFAULT_LIMIT: i64 = 100;

/// `GET /ops/tasks/:id`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] with a `NOT_FOUND` kind if no task with
/// this id exists.
pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<Task>, ApiError> {
    let engine = state.engine.clone();
    let task = tokio::task::spawn_blocking(move || engine.get_task(&task_id))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;
    Ok(Json(task))
}

/// `GET /ops/tasks/:id/activities`.
///
/// # Errors
///
/// Returns [`ApiError::Governance`] with a `NOT_FOUND` kind if no task with
/// this id exists.
pub async fn list_activities(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<Vec<Activity>>, ApiError> {
    let engine = state.engine.clone();
    let activities = tokio::task::spawn_blocking(move || engine.list_activities(&task_id))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;
    Ok(Json(activities))
}

/// `GET /ops/topics?group=…`.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] on a store failure.
pub async fn list_topics(State(state): State<AppState>, Query(query): Query<TopicsQuery>) -> Result<Json<Vec<Topic>>, ApiError> {
    let store = state.store.clone();
    let topics = tokio::task::spawn_blocking(move || store.list_topics(&query.group))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;
    Ok(Json(topics))
}

/// `GET /ops/messages?limit=…&before=…`.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] on a store failure.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let before = query.before;
    let group = query.group;
    let store = state.store.clone();
    let messages = tokio::task::spawn_blocking(move || store.list_messages(limit, before))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    let group_jid = match group {
        Some(group) => {
            let store = state.store.clone();
            let topics = tokio::task::spawn_blocking(move || store.list_topics(&group))
                .await
                .map_err(|err| ApiError::Internal(err.to_string()))??;
            topics.into_iter().next().and_then(|topic| topic.group_jid)
        }
        None => None,
    };

    Ok(Json(MessagesResponse { messages, group_jid }))
}

/// `GET /ops/notifications?target_group=…&unread_only=1&limit=…`.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] on a store failure.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let target_group = query.target_group;
    let unread_only = query.unread_only.unwrap_or(false);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let store = state.store.clone();
    let notifications = tokio::task::spawn_blocking(move || store.list_notifications(&target_group, unread_only, limit))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;
    Ok(Json(notifications))
}
