// gov-core/src/errors.rs
// ============================================================================
// Module: Governance Error Taxonomy
// Description: Uniform error kinds shared by the engine, broker, and HTTP
//              surface, with a stable machine-readable code and HTTP status
//              mapping per kind.
// Purpose: Keep status-code and retriability mapping defined in exactly one
//          place (§7).
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`ErrorKind`] is the semantic error taxonomy from §7. [`GovernanceError`]
//! is the concrete error type returned by [`crate::engine::GovernanceEngine`]
//! methods; it carries an [`ErrorKind`] plus a human-readable message and
//! optional stable reason code (e.g. `MISSING_DOD_CHECKLIST`,
//! `STALE_VERSION`) used by tests and HTTP clients that assert on specific
//! policy-deny reasons.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Error Kind
// ============================================================================

/// Semantic error kind, independent of transport. See §7 for the full
/// taxonomy table (HTTP status, retriability).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid secret.
    Auth,
    /// Authenticated but not authorized for this action.
    Forbidden,
    /// Malformed or out-of-bounds input.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// Optimistic-concurrency or foreign-key conflict.
    Conflict,
    /// Policy kernel denied the requested transition/action.
    PolicyDeny,
    /// Broker backpressure, quota, or breaker-open.
    Capacity,
    /// External provider failure or timeout.
    Upstream,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP status code this kind maps to (§7).
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Auth => 401,
            Self::Forbidden => 403,
            Self::Validation | Self::PolicyDeny => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Capacity => 429,
            Self::Upstream => 502,
            Self::Internal => 500,
        }
    }

    /// Returns true when a retry after the appropriate recovery action may
    /// succeed (§7 "Retriable?" column).
    #[must_use]
    pub const fn retriable(self) -> bool {
        matches!(self, Self::Conflict | Self::PolicyDeny | Self::Capacity | Self::Upstream)
    }
}

// ============================================================================
// SECTION: Governance Error
// ============================================================================

/// Uniform error type returned by governance engine commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GovernanceError {
    /// Semantic kind.
    pub kind: ErrorKind,
    /// Human-readable message, safe to surface in an HTTP `error` field.
    pub message: String,
    /// Stable machine-readable reason code, when applicable
    /// (e.g. `MISSING_DOD_CHECKLIST`, `STALE_VERSION`, `FORBIDDEN_executor`).
    pub code: Option<&'static str>,
}

impl GovernanceError {
    /// Builds a new governance error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// Attaches a stable machine-readable reason code.
    #[must_use]
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    /// Builds a `NOT_FOUND` error for an unknown task id.
    #[must_use]
    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("task not found: {task_id}"))
    }

    /// Builds a `VALIDATION` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Builds a `POLICY_DENY` error with a stable reason code.
    #[must_use]
    pub fn policy_deny(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PolicyDeny, message).with_code(code)
    }

    /// Builds a `FORBIDDEN` error with a stable reason code.
    #[must_use]
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message).with_code(code)
    }

    /// Builds a `CONFLICT` error for a stale optimistic-concurrency version.
    #[must_use]
    pub fn stale_version(expected: i64, actual: i64) -> Self {
        Self::new(
            ErrorKind::Conflict,
            format!("stale version: expected {expected}, current version is {actual}"),
        )
        .with_code("STALE_VERSION")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_taxonomy_table() {
        assert_eq!(ErrorKind::Auth.http_status(), 401);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::PolicyDeny.http_status(), 400);
        assert_eq!(ErrorKind::Capacity.http_status(), 429);
        assert_eq!(ErrorKind::Upstream.http_status(), 502);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }

    #[test]
    fn auth_and_forbidden_and_not_found_and_validation_are_not_retriable() {
        assert!(!ErrorKind::Auth.retriable());
        assert!(!ErrorKind::Forbidden.retriable());
        assert!(!ErrorKind::NotFound.retriable());
        assert!(!ErrorKind::Validation.retriable());
    }

    #[test]
    fn stale_version_carries_code_and_both_numbers_in_message() {
        let err = GovernanceError::stale_version(3, 5);
        assert_eq!(err.code, Some("STALE_VERSION"));
        assert!(err.message.contains('3'));
        assert!(err.message.contains('5'));
    }
}
