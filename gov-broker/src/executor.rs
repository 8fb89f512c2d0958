// gov-broker/src/executor.rs
// ============================================================================
// Module: Provider Executor Seam
// Description: The `ProviderExecutor` trait an authorized `ExtCall` is
//              handed to, and the outcome it reports back.
// Purpose: Keep the broker itself free of any concrete provider integration
//          (§6 "External provider executor" is named as an external
//          collaborator, not specified here); generalizes the teacher's
//          `Source`/`Sink` pair into one seam since this broker dispatches
//          exactly one authorized call per request rather than
//          resolving-then-delivering a payload.
// Dependencies: gov-core, serde_json
// ============================================================================

//! ## Overview
//! [`ProviderExecutor::execute`] is called once per authorized call, after
//! the broker has written the `authorized` row and before it transitions the
//! row to `processing`. The executor performs the real outbound call under
//! its own provider-specific deadline and returns an [`ExecutorOutcome`];
//! the broker never inspects `response_data` itself beyond scrubbing it
//! (§4.3).

// ============================================================================
// SECTION: Imports
// ============================================================================

use gov_core::model::ExtCallStatus;
use serde_json::Value;

use crate::errors::ExecutorError;

// ============================================================================
// SECTION: Execution Request
// ============================================================================

/// The fields a [`ProviderExecutor`] needs to perform an authorized call.
#[derive(Debug, Clone)]
pub struct ExecutionRequest<'a> {
    /// Client-supplied unique request identifier.
    pub request_id: &'a str,
    /// External provider identifier.
    pub provider: &'a str,
    /// Action requested on the provider.
    pub action: &'a str,
    /// Raw call parameters, never persisted by the broker.
    pub params: &'a Value,
}

// ============================================================================
// SECTION: Execution Outcome
// ============================================================================

/// The result a [`ProviderExecutor`] reports back for one call.
#[derive(Debug, Clone)]
pub struct ExecutorOutcome {
    /// Terminal status: `Executed`, `Failed`, or `Timeout` (never
    /// `Authorized`/`Processing`/`Denied`, which the broker assigns itself).
    pub status: ExtCallStatus,
    /// Human-readable result summary.
    pub result_summary: Option<String>,
    /// Raw JSON response payload; the broker scrubs this before persisting
    /// it (§4.3 "`response_data` is scrubbed of keys matching forbidden
    /// patterns").
    pub response_data: Option<Value>,
    /// Wall-clock duration of the call, in milliseconds.
    pub duration_ms: i64,
}

impl ExecutorOutcome {
    /// Builds an `Executed` outcome.
    #[must_use]
    pub fn executed(result_summary: impl Into<String>, response_data: Option<Value>, duration_ms: i64) -> Self {
        Self {
            status: ExtCallStatus::Executed,
            result_summary: Some(result_summary.into()),
            response_data,
            duration_ms,
        }
    }

    /// Builds a `Failed` outcome.
    #[must_use]
    pub fn failed(result_summary: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            status: ExtCallStatus::Failed,
            result_summary: Some(result_summary.into()),
            response_data: None,
            duration_ms,
        }
    }

    /// Builds a `Timeout` outcome.
    #[must_use]
    pub const fn timeout(duration_ms: i64) -> Self {
        Self { status: ExtCallStatus::Timeout, result_summary: None, response_data: None, duration_ms }
    }
}

// ============================================================================
// SECTION: Provider Executor Trait
// ============================================================================

/// External collaborator that performs an authorized outbound call under
/// its own provider-specific deadline (§6). Not implemented in this core;
/// `gov-http`/`gov-cli` wire a concrete implementation at startup, and
/// tests use a stub.
pub trait ProviderExecutor: Send + Sync {
    /// Executes one authorized call and reports its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] only for failures the executor cannot
    /// represent as a terminal [`ExecutorOutcome`] itself (e.g. the executor
    /// process could not be reached at all); ordinary provider-side
    /// failures should be reported as `ExecutorOutcome::failed` instead.
    fn execute(&self, request: &ExecutionRequest<'_>) -> Result<ExecutorOutcome, ExecutorError>;
}

/// A stub executor that always reports immediate success, echoing no
/// response data. Used by tests and as a safe default when no real provider
/// integration is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl ProviderExecutor for NoopExecutor {
    fn execute(&self, _request: &ExecutionRequest<'_>) -> Result<ExecutorOutcome, ExecutorError> {
        Ok(ExecutorOutcome::executed("noop executor accepted call", None, 0))
    }
}
