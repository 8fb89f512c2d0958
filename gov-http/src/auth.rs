// gov-http/src/auth.rs
// ============================================================================
// Module: Dual-Secret Authentication
// Description: Read-secret and write-secret header checks, applied as axum
//              middleware layers.
// Purpose: Enforce §4.6's "every request authenticates against a read
//          secret; mutating endpoints additionally require a write secret,
//          accepting either CURRENT or PREVIOUS" without duplicating the
//          comparison in every handler, mirroring
//          `decision-gate-mcp::auth`'s `RequestContext`/`AuthContext` seam.
// Dependencies: axum, subtle
// ============================================================================

//! ## Overview
//! Two middleware functions, both applied with
//! [`axum::middleware::from_fn_with_state`]: [`require_read_secret`] guards
//! every route in [`crate::server::build_router`], and
//! [`require_write_secret`] additionally guards the mutating sub-router.
//! Header comparisons use [`subtle::ConstantTimeEq`] so response timing
//! never leaks how much of a guessed secret matched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::body::Body;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::state::AppState;

// ============================================================================
// SECTION: Header Names
// ============================================================================

/// Header carrying the read-auth secret, required on every request.
pub const READ_SECRET_HEADER: &str = "x-os-secret";
/// Header carrying the write-auth secret, required on mutating requests.
pub const WRITE_SECRET_HEADER: &str = "x-write-secret";

// ============================================================================
// SECTION: Constant-Time Comparison
// ============================================================================

/// Compares `candidate` to `expected` in constant time with respect to
/// `candidate`'s content; length mismatches short-circuit (length is not
/// secret).
fn secrets_match(candidate: &str, expected: &str) -> bool {
    candidate.len() == expected.len() && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

/// Builds a `401` JSON error response.
fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": message}))).into_response()
}

/// Reads a header value as UTF-8, if present and valid.
fn header_str<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Rejects any request missing a valid `X-OS-SECRET` header.
pub async fn require_read_secret(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match header_str(&request, READ_SECRET_HEADER) {
        Some(candidate) if secrets_match(candidate, &state.config.os_http_secret) => next.run(request).await,
        Some(_) => unauthorized("invalid X-OS-SECRET"),
        None => unauthorized("missing X-OS-SECRET"),
    }
}

/// Rejects any mutating request missing a valid `X-WRITE-SECRET` header,
/// accepting either the current or previously-rotated secret.
pub async fn require_write_secret(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(candidate) = header_str(&request, WRITE_SECRET_HEADER) else {
        return unauthorized("missing X-WRITE-SECRET");
    };
    let matches_current = secrets_match(candidate, &state.config.write_secret_current);
    let matches_previous =
        state.config.write_secret_previous.as_deref().is_some_and(|previous| secrets_match(candidate, previous));
    if matches_current || matches_previous {
        next.run(request).await
    } else {
        unauthorized("invalid X-WRITE-SECRET")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_match_requires_equal_length_and_content() {
        assert!(secrets_match("abc123", "abc123"));
        assert!(!secrets_match("abc123", "abc124"));
        assert!(!secrets_match("abc12", "abc123"));
    }
}
