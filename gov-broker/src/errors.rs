// gov-broker/src/errors.rs
// ============================================================================
// Module: Broker Error Taxonomy
// Description: Authorization-deny reason codes and backend/executor
//              failure types for the external-access broker.
// Purpose: Give every authorization-order step (§4.3) a distinct, stable
//          reason code the HTTP layer can map to a status and a retry
//          hint, mirroring `gov_core::errors::ErrorKind`.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`BrokerError`] covers every way [`crate::broker::ExtBroker::call`] can
//! fail before or during dispatch. Each authorization-order variant carries
//! the stable reason code named in §4.3 so a denied call's `code` field is
//! predictable across retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Broker Error
// ============================================================================

/// Reason a broker call was denied or failed, in authorization order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// No active, unexpired capability for `(group, provider)`.
    #[error("no capability grants {group} access to {provider}")]
    NoCapability {
        /// Group that attempted the call.
        group: String,
        /// Provider the call targeted.
        provider: String,
    },
    /// The action is in the capability's `denied_actions` list.
    #[error("action {action} is denied by policy for {provider}")]
    DeniedByPolicy {
        /// Provider the call targeted.
        provider: String,
        /// Action requested.
        action: String,
    },
    /// `allowed_actions` is non-empty and does not contain the action.
    #[error("action {action} is not in the allowed action list for {provider}")]
    NotAllowed {
        /// Provider the call targeted.
        provider: String,
        /// Action requested.
        action: String,
    },
    /// The capability's access level is below the action's required level.
    #[error("capability access level is insufficient for {action} on {provider}")]
    AccessLevelInsufficient {
        /// Provider the call targeted.
        provider: String,
        /// Action requested.
        action: String,
    },
    /// The bound task does not satisfy the task-binding requirement.
    #[error("task binding invalid: {0}")]
    TaskBindingInvalid(String),
    /// The group's pending call count is at or above the backpressure limit.
    #[error("backpressure limit reached for group {0}")]
    Backpressure(String),
    /// The group/provider pair exceeded its sliding-window rate limit.
    #[error("rate limit exceeded for {group} on {provider}")]
    RateLimited {
        /// Group that attempted the call.
        group: String,
        /// Provider the call targeted.
        provider: String,
    },
    /// The group/provider pair exceeded its daily quota.
    #[error("daily quota exceeded for {group} on {provider}")]
    QuotaExceeded {
        /// Group that attempted the call.
        group: String,
        /// Provider the call targeted.
        provider: String,
    },
    /// An unexpected store failure.
    #[error("broker store failure: {0}")]
    Store(String),
}

impl BrokerError {
    /// Returns the stable machine-readable reason code for this variant,
    /// matching §4.3's authorization-order names.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoCapability { .. } => "NO_CAPABILITY",
            Self::DeniedByPolicy { .. } => "DENIED_BY_POLICY",
            Self::NotAllowed { .. } => "NOT_ALLOWED",
            Self::AccessLevelInsufficient { .. } => "ACCESS_LEVEL_INSUFFICIENT",
            Self::TaskBindingInvalid(_) => "TASK_BINDING_INVALID",
            Self::Backpressure(_) => "BACKPRESSURE",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::Store(_) => "BROKER_STORE_FAILURE",
        }
    }

    /// Returns true when the denial is a capacity condition (backpressure,
    /// rate limit, quota) rather than a policy decision, matching §7's
    /// `CAPACITY` kind (429, retriable after backoff).
    #[must_use]
    pub const fn is_capacity(&self) -> bool {
        matches!(self, Self::Backpressure(_) | Self::RateLimited { .. } | Self::QuotaExceeded { .. })
    }
}

/// Error returned by a [`crate::executor::ProviderExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider executor failed: {0}")]
pub struct ExecutorError(pub String);
