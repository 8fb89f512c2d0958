// gov-http/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: Builds the axum router over every `/ops/*` endpoint and
//              serves it on the configured bind address.
// Purpose: Be the single place the route table, auth middleware layering,
//          and state bootstrap are assembled (§4.6 "single process, single
//          port").
// Dependencies: axum, tokio
// ============================================================================

//! ## Overview
//! [`build_router`] mounts the read endpoints behind only
//! [`crate::auth::require_read_secret`], and the mutating endpoints behind
//! both that and [`crate::auth::require_write_secret`] — middleware runs
//! outside-in, so the write-secret layer added last on the mutating
//! sub-router runs before the crate-wide read-secret layer finishes
//! validating, and both must pass before a handler runs.
//! [`serve`] is the binary's entry point: it bootstraps [`AppState`],
//! builds the router, and blocks on `axum::serve`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Router;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use tokio::net::TcpListener;

use crate::auth;
use crate::config::HttpConfig;
use crate::handlers::actions;
use crate::handlers::reads;
use crate::state::AppState;
use crate::state::BootstrapError;

// ============================================================================
// SECTION: Serve Error
// ============================================================================

/// Failure starting the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// [`AppState`] could not be bootstrapped.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The configured bind address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: std::net::SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The server's accept loop returned an error.
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full `/ops/*` route table over `state`.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let reads = Router::new()
        .route("/ops/tasks/{id}", get(reads::get_task))
        .route("/ops/tasks/{id}/activities", get(reads::list_activities))
        .route("/ops/topics", get(reads::list_topics))
        .route("/ops/messages", get(reads::list_messages))
        .route("/ops/notifications", get(reads::list_notifications));

    let writes = Router::new()
        .route("/ops/actions/create", post(actions::create))
        .route("/ops/actions/transition", post(actions::transition))
        .route("/ops/actions/assign", post(actions::assign))
        .route("/ops/actions/approve", post(actions::approve))
        .route("/ops/actions/override", post(actions::override_task))
        .route("/ops/actions/comment", post(actions::comment))
        .route("/ops/actions/dod", post(actions::dod))
        .route("/ops/actions/evidence", post(actions::evidence))
        .route("/ops/actions/evidence/bulk", post(actions::evidence_bulk))
        .route("/ops/actions/docsUpdated", post(actions::docs_updated))
        .route("/ops/actions/notifications/markRead", post(actions::mark_notifications_read))
        .route("/ops/actions/chat", post(actions::chat))
        .route("/ops/actions/topic", post(actions::create_topic))
        .route("/ops/ext/call", post(actions::ext_call))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_write_secret));

    reads
        .merge(writes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_read_secret))
        .with_state(state)
}

// ============================================================================
// SECTION: Serve
// ============================================================================

/// Bootstraps [`AppState`], builds the router, and serves it until the
/// process is terminated.
///
/// # Errors
///
/// Returns [`ServeError`] if the store cannot be opened, the bind address
/// cannot be bound, or the accept loop fails.
pub async fn serve(config: HttpConfig) -> Result<(), ServeError> {
    let addr = config.http_addr;
    let (state, _alert_engine) = AppState::bootstrap(config)?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|source| ServeError::Bind { addr, source })?;
    axum::serve(listener, router).await.map_err(ServeError::Serve)
}
