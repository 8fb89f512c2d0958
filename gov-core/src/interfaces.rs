// gov-core/src/interfaces.rs
// ============================================================================
// Module: Governance Store Interface
// Description: The `GovernanceStore` trait plus the command and result
//              structs the engine accepts and returns.
// Purpose: Decouple `gov-core` from any storage backend; `gov-store-sqlite`
//          is the only crate that implements this trait today.
// Dependencies: crate::model
// ============================================================================

//! ## Overview
//! [`GovernanceStore`] is the seam between the pure-logic
//! [`crate::engine::GovernanceEngine`] and a concrete backend. The write
//! methods are intentionally coarse — one method per command shape, not one
//! per row — so an implementation can bracket each call in exactly one
//! database transaction (§5 "a command... executes inside ONE
//! transaction"). Read methods return snapshot reads and need no
//! transaction of their own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::metadata::DodItem;
use crate::model::Activity;
use crate::model::ActivityAction;
use crate::model::Approval;
use crate::model::Gate;
use crate::model::Product;
use crate::model::Task;
use crate::model::TaskState;

// ============================================================================
// SECTION: Store Error
// ============================================================================

/// Errors a [`GovernanceStore`] implementation may return. These are
/// translated into [`crate::errors::GovernanceError`] by the engine, which
/// is the only layer that knows the full semantic error taxonomy (§7).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The referenced task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(String),
    /// The referenced product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(String),
    /// `expected_version` did not match the row's current version.
    #[error("stale version: expected {expected}, current is {actual}")]
    StaleVersion {
        /// Version the caller expected.
        expected: i64,
        /// Version the row actually has.
        actual: i64,
    },
    /// A fresh task id collided with an existing row; the caller should
    /// regenerate the id and retry, up to [`crate::ids::MAX_ID_GENERATION_ATTEMPTS`].
    #[error("task id already exists: {0}")]
    DuplicateTaskId(String),
    /// An unexpected backend failure (connection, I/O, schema).
    #[error("store failure: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Activity and Notification Inputs
// ============================================================================

/// Fields needed to insert one activity row; `id` and `created_at` are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewActivity {
    /// Action kind.
    pub action: ActivityAction,
    /// State transitioned from, when applicable.
    pub from_state: Option<TaskState>,
    /// State transitioned to, when applicable.
    pub to_state: Option<TaskState>,
    /// Actor that performed the action.
    pub actor: String,
    /// Free-text reason/summary.
    pub reason: Option<String>,
}

/// Fields needed to insert one notification row; `id`, `read`, and
/// `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// Group mentioned.
    pub target_group: String,
    /// Actor who wrote the comment.
    pub actor: String,
    /// Notification snippet.
    pub snippet: String,
}

/// One atomic task mutation: a full task replacement, a CAS guard on its
/// prior version, zero or more activity rows, and zero or more notification
/// rows, all applied within one store transaction.
#[derive(Debug, Clone)]
pub struct TaskMutation {
    /// The task's new state; `version` must already be bumped by the
    /// caller.
    pub task: Task,
    /// The version the task row must currently have for this write to
    /// succeed.
    pub expected_version: i64,
    /// Activities to append in the same transaction, in order.
    pub activities: Vec<NewActivity>,
    /// Notifications to append in the same transaction (Comment only).
    pub notifications: Vec<NewNotification>,
}

// ============================================================================
// SECTION: Governance Store Trait
// ============================================================================

/// Storage seam consumed by [`crate::engine::GovernanceEngine`].
pub trait GovernanceStore {
    /// Looks up a product by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on an unexpected backend failure.
    fn get_product(&self, product_id: &str) -> Result<Option<Product>, StoreError>;

    /// Looks up a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on an unexpected backend failure.
    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    /// Inserts a brand-new task row plus its `create` activity in one
    /// transaction. Returns [`StoreError::DuplicateTaskId`] if `task.id`
    /// already exists, so the caller can regenerate the id and retry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTaskId`] or [`StoreError::Backend`].
    fn insert_task(&self, task: &Task, activities: &[NewActivity]) -> Result<Vec<i64>, StoreError>;

    /// Applies a [`TaskMutation`] atomically: replaces the task row (failing
    /// with [`StoreError::StaleVersion`] unless the row's current version
    /// equals `expected_version`), appends every activity, and appends every
    /// notification, all in one transaction. Returns the assigned activity
    /// ids in order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`], [`StoreError::StaleVersion`],
    /// or [`StoreError::Backend`].
    fn update_task(&self, mutation: TaskMutation) -> Result<Vec<i64>, StoreError>;

    /// Lists activities for a task, ordered by `id` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on an unexpected backend failure.
    fn list_activities(&self, task_id: &str) -> Result<Vec<Activity>, StoreError>;

    /// Looks up the current approval for `(task_id, gate)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on an unexpected backend failure.
    fn get_approval(&self, task_id: &str, gate: Gate) -> Result<Option<Approval>, StoreError>;

    /// Inserts or replaces the approval for `approval`'s `(task_id,
    /// gate_type)` key, plus its `approve` activity, in one transaction.
    /// Returns the assigned activity id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on an unexpected backend failure.
    fn upsert_approval(
        &self,
        approval: Approval,
        activity: NewActivity,
    ) -> Result<i64, StoreError>;
}

// ============================================================================
// SECTION: Create
// ============================================================================

/// Command: create a new task.
#[derive(Debug, Clone)]
pub struct CreateTaskCmd {
    /// Acting group; must be `main` (§4.2).
    pub actor: String,
    /// Task title, 1..140 chars.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Kind of work.
    pub task_type: crate::model::TaskType,
    /// Priority; defaults to `P2` when absent.
    pub priority: Option<crate::model::Priority>,
    /// Requested scope.
    pub scope: crate::model::Scope,
    /// Product id, required iff `scope == Product` after coercion.
    pub product_id: Option<String>,
    /// Group to assign the task to; template-defaulted by `task_type` when
    /// absent.
    pub assigned_group: Option<String>,
    /// Specific executor, if known at creation time.
    pub executor: Option<String>,
    /// Group that originated the task; defaults to `actor`.
    pub created_by: Option<String>,
    /// Gate requirement; template-defaulted by `task_type` when absent.
    pub gate: Option<Gate>,
    /// Whether a DoD checklist is required; template-defaulted when absent.
    pub dod_required: Option<bool>,
    /// Initial DoD checklist text entries; template-defaulted when absent.
    pub dod_checklist: Option<Vec<String>>,
}

/// Result of a successful [`CreateTaskCmd`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskResult {
    /// Newly assigned task id.
    pub task_id: String,
    /// Always `INBOX` immediately after creation.
    pub state: TaskState,
}

// ============================================================================
// SECTION: Transition
// ============================================================================

/// Command: move a task to a new state.
#[derive(Debug, Clone)]
pub struct TransitionCmd {
    /// Task to transition.
    pub task_id: String,
    /// Target state.
    pub to_state: TaskState,
    /// Free-text reason; required (non-blank) for strict `DOING -> REVIEW`.
    pub reason: Option<String>,
    /// Optimistic-concurrency guard; rejected with `STALE_VERSION` if it
    /// does not match the task's current version.
    pub expected_version: Option<i64>,
    /// Acting group.
    pub actor: String,
    /// Whether an `auditLink`-equivalent was supplied with this transition,
    /// consulted by the strict `MISSING_EVIDENCE_LINK` check when leaving
    /// `REVIEW`.
    pub audit_link_present: bool,
}

// ============================================================================
// SECTION: Assign
// ============================================================================

/// Command: reassign a task's group and/or executor.
#[derive(Debug, Clone)]
pub struct AssignCmd {
    /// Task to reassign.
    pub task_id: String,
    /// New responsible group.
    pub assigned_group: String,
    /// New executor identity, if any.
    pub executor: Option<String>,
    /// Acting group; must be `main`.
    pub actor: String,
}

// ============================================================================
// SECTION: Approve
// ============================================================================

/// Command: record a gate approval.
#[derive(Debug, Clone)]
pub struct ApproveCmd {
    /// Task being approved.
    pub task_id: String,
    /// Gate the approval applies to.
    pub gate_type: Gate,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Optional evidence link, consulted by `MISSING_EVIDENCE_LINK`.
    pub evidence_link: Option<String>,
    /// Acting group; must pass [`crate::policy::check_approver`] and
    /// [`crate::policy::check_approver_not_executor`].
    pub actor: String,
}

// ============================================================================
// SECTION: Override
// ============================================================================

/// Command: record a founder override, bypassing gate approval.
#[derive(Debug, Clone)]
pub struct OverrideCmd {
    /// Task being overridden.
    pub task_id: String,
    /// Reason for the override.
    pub reason: String,
    /// Accepted-risk statement.
    pub accepted_risk: String,
    /// UTC ISO-8601 deadline by which the risk must be reviewed.
    pub review_deadline_iso: String,
    /// Acting group; must be `main`.
    pub actor: String,
}

// ============================================================================
// SECTION: Comment
// ============================================================================

/// Command: append a comment and fan out `@group` mention notifications.
#[derive(Debug, Clone)]
pub struct CommentCmd {
    /// Task being commented on.
    pub task_id: String,
    /// Raw comment text, sanitized before persisting.
    pub text: String,
    /// Actor; falls back to `cockpit` when absent or too long.
    pub actor: Option<String>,
}

/// Result of a successful [`CommentCmd`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommentResult {
    /// Distinct, valid `@group` mentions parsed from the sanitized text.
    pub mentions: Vec<String>,
}

// ============================================================================
// SECTION: DoD, Evidence, Docs
// ============================================================================

/// One input item to a [`DodUpdateCmd`].
#[derive(Debug, Clone)]
pub struct DodItemInput {
    /// Client-supplied id; preserved only if it matches `^dod-[a-z0-9]+$`.
    pub id: Option<String>,
    /// Item text, 4..200 chars after trim.
    pub text: String,
    /// Completion state.
    pub done: bool,
}

/// Command: replace a task's DoD checklist.
#[derive(Debug, Clone)]
pub struct DodUpdateCmd {
    /// Task to update.
    pub task_id: String,
    /// New checklist items, 0..50.
    pub items: Vec<DodItemInput>,
    /// Acting group, attributed on the `DOD_UPDATED` activity.
    pub actor: String,
}

/// Result of a successful [`DodUpdateCmd`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DodUpdateResult {
    /// The checklist items actually stored, with resolved ids.
    pub items: Vec<DodItem>,
}

/// Command: append one evidence entry.
#[derive(Debug, Clone)]
pub struct EvidenceCmd {
    /// Task to append evidence to.
    pub task_id: String,
    /// Evidence link, ≤ 2000 chars.
    pub link: String,
    /// Optional note, ≤ 1000 chars.
    pub note: Option<String>,
    /// Acting group, attributed on the `EVIDENCE_ADDED` activity.
    pub actor: String,
}

/// Command: append multiple evidence entries atomically.
#[derive(Debug, Clone)]
pub struct EvidenceBulkCmd {
    /// Task to append evidence to.
    pub task_id: String,
    /// Evidence links, 1..20.
    pub links: Vec<String>,
    /// Optional note shared by all entries in this call.
    pub note: Option<String>,
    /// Acting group, attributed on the `EVIDENCE_BULK_ADDED` activity.
    pub actor: String,
}

/// Command: set the `docsUpdated` metadata flag.
#[derive(Debug, Clone)]
pub struct DocsUpdatedCmd {
    /// Task to update.
    pub task_id: String,
    /// New value.
    pub docs_updated: bool,
    /// Acting group, attributed on the `DOCS_UPDATED_SET` activity.
    pub actor: String,
}
