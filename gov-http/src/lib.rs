// gov-http/src/lib.rs
// ============================================================================
// Crate: gov-http
// Description: Axum REST surface over the governance engine, the
//              external-access broker, and the event bus.
// Purpose: Be the single HTTP entry point a cockpit UI and external agents
//          use to read governed state and issue mutations (§4.6).
// Dependencies: axum, gov-core, gov-broker, gov-events, gov-store-sqlite,
//               serde, serde_json, subtle, thiserror, tokio
// ============================================================================

//! # gov-http
//!
//! [`server::build_router`] wires every handler onto one [`state::AppState`].
//! Every request authenticates against the read secret; mutating endpoints
//! additionally require a write secret accepted in either its `CURRENT` or
//! `PREVIOUS` form (§4.6 dual-secret rotation). Governance/broker calls are
//! synchronous (`gov-core`/`gov-broker` hold no async runtime dependency), so
//! handlers dispatch them through [`tokio::task::spawn_blocking`], matching
//! the common axum+rusqlite integration idiom (§5 "[ADDED]").

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use config::HttpConfig;
pub use error::ApiError;
pub use server::build_router;
pub use server::serve;
pub use state::AppState;
