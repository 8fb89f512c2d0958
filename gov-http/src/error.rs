// gov-http/src/error.rs
// ============================================================================
// Module: HTTP Error Mapping
// Description: Converts `GovernanceError`/`BrokerError`/request-validation
//              failures into one JSON error body and status code.
// Purpose: Give every handler a single `?`-friendly error type instead of
//          hand-rolling a status/body pair per endpoint (§7).
// Dependencies: axum, gov-core, gov-broker, serde, serde_json
// ============================================================================

//! ## Overview
//! [`ApiError`] is the one error type every handler in [`crate::handlers`]
//! returns. Its [`axum::response::IntoResponse`] impl is the single place
//! that maps a semantic error onto an HTTP status and a `{"error", "code"}`
//! JSON body, mirroring how `decision-gate-mcp::server` maps `ToolError`
//! variants onto a `(StatusCode, rpc_code, message)` triple in one spot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use gov_broker::BrokerError;
use gov_core::GovernanceError;
use gov_store_sqlite::SqliteStoreError;
use serde::Serialize;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// Uniform error type returned by every `gov-http` handler.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Missing or mismatched auth header.
    Unauthorized(String),
    /// Malformed request body or path/query parameter.
    Validation(String),
    /// A governance engine command failed.
    Governance(GovernanceError),
    /// A broker authorization/dispatch call failed.
    Broker(BrokerError),
    /// An unexpected internal failure (store panic recovery, serialization).
    Internal(String),
}

impl ApiError {
    /// Builds an `ApiError::Validation` from a display-able message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Resolves the HTTP status and stable reason code for this error.
    fn status_and_code(&self) -> (StatusCode, Option<&str>) {
        match self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, None),
            Self::Governance(err) => {
                let status = StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, err.code)
            }
            Self::Broker(err) => (broker_status(err), Some(err.code())),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        }
    }

    /// Renders the human-readable message surfaced in the response body.
    fn message(&self) -> String {
        match self {
            Self::Unauthorized(message) | Self::Validation(message) | Self::Internal(message) => message.clone(),
            Self::Governance(err) => err.message.clone(),
            Self::Broker(err) => err.to_string(),
        }
    }
}

/// Maps a [`BrokerError`] to an HTTP status. `BrokerError` has no
/// `http_status` of its own (unlike [`GovernanceError`]) since §4.3's
/// authorization-order steps are a different taxonomy than §7's; this
/// mirrors §7's `CAPACITY` (429) / `FORBIDDEN` (403) / `VALIDATION` (400)
/// buckets by variant shape instead.
fn broker_status(err: &BrokerError) -> StatusCode {
    if err.is_capacity() {
        return StatusCode::TOO_MANY_REQUESTS;
    }
    match err {
        BrokerError::NoCapability { .. }
        | BrokerError::DeniedByPolicy { .. }
        | BrokerError::NotAllowed { .. }
        | BrokerError::AccessLevelInsufficient { .. } => StatusCode::FORBIDDEN,
        BrokerError::TaskBindingInvalid(_) => StatusCode::BAD_REQUEST,
        BrokerError::Backpressure(_) | BrokerError::RateLimited { .. } | BrokerError::QuotaExceeded { .. } => {
            StatusCode::TOO_MANY_REQUESTS
        }
        BrokerError::Store(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Wire shape of an error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Human-readable message.
    error: String,
    /// Stable machine-readable reason code, when the error carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody { error: self.message(), code: code.map(str::to_string) };
        (status, Json(body)).into_response()
    }
}

impl From<GovernanceError> for ApiError {
    fn from(err: GovernanceError) -> Self {
        Self::Governance(err)
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        Self::Broker(err)
    }
}

impl From<SqliteStoreError> for ApiError {
    fn from(err: SqliteStoreError) -> Self {
        Self::Internal(err.to_string())
    }
}
