// gov-broker/src/store.rs
// ============================================================================
// Module: Broker Store Interface
// Description: The `BrokerStore` trait plus supporting input/output types
//              for capability and ExtCall persistence.
// Purpose: Decouple `gov-broker` from any storage backend, the same way
//          `gov_core::interfaces::GovernanceStore` decouples the engine.
//          `gov-store-sqlite` implements this trait.
// Dependencies: gov-core
// ============================================================================

//! ## Overview
//! [`BrokerStore`] is the seam [`crate::broker::ExtBroker`] uses to read
//! capabilities, read the task a call is bound to, count pending/rate/quota
//! calls, and persist `ExtCall` rows. It is intentionally separate from
//! [`gov_core::interfaces::GovernanceStore`]: capabilities and ext-calls are
//! a broker concern, not a governance-engine one (§3 ownership note:
//! "products and capabilities are admin-only").

// ============================================================================
// SECTION: Imports
// ============================================================================

use gov_core::model::AccessLevel;
use gov_core::model::Capability;
use gov_core::model::ExtCall;
use gov_core::model::ExtCallStatus;
use gov_core::model::TaskState;
use thiserror::Error;

// ============================================================================
// SECTION: Store Error
// ============================================================================

/// Errors a [`BrokerStore`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerStoreError {
    /// An unexpected backend failure (connection, I/O, schema).
    #[error("broker store failure: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Task Binding Snapshot
// ============================================================================

/// The fields of a governed task the broker needs to validate task binding
/// (§4.3 step 5), read without depending on `gov_core::model::Task` itself
/// so a store can answer this with a narrow query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBinding {
    /// The task's current lifecycle state.
    pub state: TaskState,
    /// The group currently responsible for the task.
    pub assigned_group: String,
    /// The product the task belongs to, when scoped to one.
    pub product_id: Option<String>,
}

// ============================================================================
// SECTION: ExtCall Inputs
// ============================================================================

/// Fields needed to insert a new, freshly authorized `ExtCall` row; `id` and
/// `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewExtCall {
    /// Client-supplied unique request identifier.
    pub request_id: String,
    /// Group that made the call.
    pub group_folder: String,
    /// External provider identifier.
    pub provider: String,
    /// Action requested on the provider.
    pub action: String,
    /// Access level used to authorize the call.
    pub access_level: AccessLevel,
    /// HMAC-SHA256 over the canonicalized parameters.
    pub params_hmac: String,
    /// Sanitized human-readable parameter summary.
    pub params_summary: String,
    /// Governed task this call is bound to.
    pub task_id: String,
    /// Product derived from the bound task, when any.
    pub product_id: Option<String>,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

/// Fields used to update an `ExtCall`'s status after dispatch.
#[derive(Debug, Clone)]
pub struct ExtCallStatusUpdate {
    /// New lifecycle status.
    pub status: ExtCallStatus,
    /// Reason the call was denied, when `status == Denied`.
    pub denial_reason: Option<String>,
    /// Human-readable result summary from the executor.
    pub result_summary: Option<String>,
    /// Sanitized JSON response payload from the executor, as a string.
    pub response_data: Option<String>,
    /// Executor duration in milliseconds.
    pub duration_ms: Option<i64>,
}

// ============================================================================
// SECTION: Broker Store Trait
// ============================================================================

/// Storage seam consumed by [`crate::broker::ExtBroker`].
pub trait BrokerStore {
    /// Looks up the active capability for `(group, provider)`, regardless
    /// of expiry; the caller is responsible for checking `active` and
    /// `expires_at` against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn get_capability(&self, group: &str, provider: &str) -> Result<Option<Capability>, BrokerStoreError>;

    /// Counts prior approvals recorded against `(group, provider)`'s
    /// capability, for the L3 "two prior approvals from distinct groups"
    /// invariant.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn count_capability_approvals(&self, group: &str, provider: &str) -> Result<usize, BrokerStoreError>;

    /// Reads the binding snapshot for `task_id`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn get_task_binding(&self, task_id: &str) -> Result<Option<TaskBinding>, BrokerStoreError>;

    /// Counts `ExtCall` rows for `group` whose status is `authorized` or
    /// `processing` (the backpressure pending set).
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn count_pending_ext_calls(&self, group: &str) -> Result<usize, BrokerStoreError>;

    /// Counts `ExtCall` rows for `(group, provider)` created within the
    /// last `window_secs` seconds, for the sliding-window rate limit.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn count_recent_ext_calls(
        &self,
        group: &str,
        provider: &str,
        window_secs: i64,
    ) -> Result<usize, BrokerStoreError>;

    /// Counts `ExtCall` rows for `(group, provider)` created within the
    /// current UTC calendar day, for the daily quota.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn count_calls_today(&self, group: &str, provider: &str) -> Result<usize, BrokerStoreError>;

    /// Finds a prior `executed` call matching `(idempotency_key, provider,
    /// action)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn find_executed_by_idempotency_key(
        &self,
        idempotency_key: &str,
        provider: &str,
        action: &str,
    ) -> Result<Option<ExtCall>, BrokerStoreError>;

    /// Inserts a new `authorized` `ExtCall` row.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn insert_ext_call(&self, call: NewExtCall) -> Result<ExtCall, BrokerStoreError>;

    /// Inserts a `denied` `ExtCall` row (never dispatched to an executor).
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn insert_denied_ext_call(
        &self,
        call: NewExtCall,
        denial_reason: &str,
    ) -> Result<ExtCall, BrokerStoreError>;

    /// Applies a status update to an existing `ExtCall` by `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure, including when `request_id` does not exist.
    fn update_ext_call_status(
        &self,
        request_id: &str,
        update: ExtCallStatusUpdate,
    ) -> Result<ExtCall, BrokerStoreError>;

    /// Deletes terminal-status `ExtCall` rows older than `max_age_secs`
    /// seconds. `processing` rows are never deleted regardless of age.
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerStoreError::Backend`] on an unexpected backend
    /// failure.
    fn sweep_terminal_ext_calls(&self, max_age_secs: i64) -> Result<usize, BrokerStoreError>;
}
