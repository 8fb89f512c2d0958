// gov-core/src/model.rs
// ============================================================================
// Module: Governance Domain Model
// Description: Product, Task, Activity, Approval, Capability, ExtCall,
//              Notification, Topic, and Message entities.
// Purpose: Define the persisted shape of every governed entity, independent
//          of any storage backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! These types are the wire and storage shape of the governance core. They
//! carry no behavior beyond simple string conversions; policy and mutation
//! logic live in [`crate::policy`] and [`crate::engine`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::metadata::TaskMetadata;

// ============================================================================
// SECTION: Product
// ============================================================================

/// Lifecycle status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Product is actively worked.
    Active,
    /// Product is temporarily paused; tasks may still exist against it.
    Paused,
    /// Product is killed; no new tasks may be created against it.
    Killed,
}

/// Risk classification of a product, used by downstream tooling to weight
/// gate strictness (not enforced directly by the policy kernel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk product.
    Low,
    /// Normal risk product.
    Normal,
    /// High risk product.
    High,
}

/// A product that tasks can be scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique short slug.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: ProductStatus,
    /// Risk classification.
    pub risk_level: RiskLevel,
    /// Creation timestamp (UTC ISO-8601 ms), preserved across upserts.
    pub created_at: String,
    /// Last update timestamp (UTC ISO-8601 ms).
    pub updated_at: String,
}

// ============================================================================
// SECTION: Task
// ============================================================================

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Net-new product functionality.
    Feature,
    /// Defect fix.
    Bug,
    /// Multi-task umbrella of work.
    Epic,
    /// Security-sensitive work; forces `docsUpdated` on completion.
    Security,
    /// Revenue-operations work.
    Revops,
    /// Internal operations work.
    Ops,
    /// Exploratory research.
    Research,
    /// Content production.
    Content,
    /// Documentation work.
    Doc,
    /// Production incident response.
    Incident,
}

/// Governed task lifecycle state. `Killed` is reserved (§3) and is not a
/// member of any transition edge in [`crate::policy`] yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Freshly created, not yet triaged.
    Inbox,
    /// Triaged and categorized.
    Triaged,
    /// Ready to be picked up.
    Ready,
    /// Actively being worked.
    Doing,
    /// Implementation complete, under review.
    Review,
    /// Awaiting gate approval.
    Approval,
    /// Terminal success state.
    Done,
    /// Blocked on an external dependency.
    Blocked,
    /// Reserved terminal state; not reachable via any transition edge.
    Killed,
}

impl TaskState {
    /// Returns true when this state has no outgoing transition edges.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Killed)
    }
}

/// Task priority; `P2` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Highest priority.
    P0,
    /// High priority.
    P1,
    /// Default priority.
    P2,
    /// Lowest priority.
    P3,
}

impl Default for Priority {
    fn default() -> Self {
        Self::P2
    }
}

/// Whether a task belongs to the company as a whole or to one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Company-wide task; `product_id` must be `None`.
    Company,
    /// Product-scoped task; `product_id` must reference an active product.
    Product,
}

/// Named quality gate a task may require before reaching `DONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gate {
    /// No gate required.
    #[default]
    None,
    /// Security review gate, approved by the `security` group.
    Security,
    /// Revenue-operations gate, approved by `main`.
    #[serde(rename = "RevOps")]
    RevOps,
    /// Claims review gate, approved by `main`.
    Claims,
    /// Product review gate, approved by `main`.
    Product,
}

impl Gate {
    /// Returns the group authorized to approve this gate, or `None` if the
    /// gate itself is `Gate::None` (nothing to approve).
    #[must_use]
    pub const fn approver_group(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Security => Some("security"),
            Self::RevOps | Self::Claims | Self::Product => Some("main"),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "None",
            Self::Security => "Security",
            Self::RevOps => "RevOps",
            Self::Claims => "Claims",
            Self::Product => "Product",
        };
        f.write_str(label)
    }
}

/// A governed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier of the form `gov-<timestamp>-<suffix>`.
    pub id: String,
    /// Short title, 1..140 chars.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Kind of work.
    pub task_type: TaskType,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Priority.
    pub priority: Priority,
    /// Company-wide or product scope.
    pub scope: Scope,
    /// Product this task belongs to, when `scope == Product`.
    pub product_id: Option<String>,
    /// Group currently responsible for the task.
    pub assigned_group: String,
    /// Specific executor identity, when assigned.
    pub executor: Option<String>,
    /// Group that originated the task.
    pub created_by: String,
    /// Quality gate required before `DONE`.
    pub gate: Gate,
    /// Whether a Definition of Done checklist is required.
    pub dod_required: bool,
    /// Founder identity that issued an override, if any.
    pub override_by: Option<String>,
    /// Override reason, if any.
    pub override_reason: Option<String>,
    /// Override accepted-risk statement, if any.
    pub override_accepted_risk: Option<String>,
    /// Override review deadline (UTC ISO-8601), if any.
    pub override_review_deadline: Option<String>,
    /// Structured metadata (policy version, DoD state, evidence, etc.).
    pub metadata: TaskMetadata,
    /// Optimistic-concurrency version, starts at 1.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last mutation timestamp.
    pub updated_at: String,
}

impl Task {
    /// Returns true when every override field (`by`, `reason`,
    /// `acceptedRisk`, `reviewDeadlineIso`) is populated, satisfying the
    /// strict `GATE_NOT_APPROVED` check's override escape hatch.
    #[must_use]
    pub fn override_populated(&self) -> bool {
        self.override_by.is_some()
            && self.override_reason.is_some()
            && self.override_accepted_risk.is_some()
            && self.override_review_deadline.is_some()
    }
}

// ============================================================================
// SECTION: Activity
// ============================================================================

/// Append-only audit action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityAction {
    /// Task was created.
    Create,
    /// Task transitioned between states.
    Transition,
    /// Task was assigned to a group/executor.
    Assign,
    /// A gate was approved.
    Approve,
    /// Scope was coerced from PRODUCT to COMPANY.
    CoerceScope,
    /// A review summary was recorded alongside a transition.
    ExecutionSummary,
    /// A founder override was recorded.
    Override,
    /// A comment was added.
    #[serde(rename = "COMMENT_ADDED")]
    CommentAdded,
    /// The DoD checklist was updated.
    #[serde(rename = "DOD_UPDATED")]
    DodUpdated,
    /// A single evidence link was appended.
    #[serde(rename = "EVIDENCE_ADDED")]
    EvidenceAdded,
    /// Multiple evidence links were appended atomically.
    #[serde(rename = "EVIDENCE_BULK_ADDED")]
    EvidenceBulkAdded,
    /// The `docsUpdated` flag was set.
    #[serde(rename = "DOCS_UPDATED_SET")]
    DocsUpdatedSet,
}

/// A single append-only audit log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Auto-assigned row id; activities are totally ordered by this.
    pub id: i64,
    /// Task this activity belongs to.
    pub task_id: String,
    /// Action kind.
    pub action: ActivityAction,
    /// State transitioned from, when applicable.
    pub from_state: Option<TaskState>,
    /// State transitioned to, when applicable.
    pub to_state: Option<TaskState>,
    /// Actor (group or `system`) that performed the action.
    pub actor: String,
    /// Free-text reason/summary, action-specific.
    pub reason: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

// ============================================================================
// SECTION: Approval
// ============================================================================

/// A gate approval. `(task_id, gate_type)` is unique; re-approving the same
/// gate replaces the prior row (idempotent upsert).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// Task the approval applies to.
    pub task_id: String,
    /// Gate being approved. Never `Gate::None`.
    pub gate_type: Gate,
    /// Group that approved.
    pub approved_by: String,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Optional evidence link recorded with the approval, consulted by the
    /// `MISSING_EVIDENCE_LINK` strict-mode check.
    pub evidence_link: Option<String>,
    /// Creation timestamp (most recent upsert time).
    pub created_at: String,
}

// ============================================================================
// SECTION: Capability
// ============================================================================

/// Access level granted to a `(group, provider)` capability. Higher levels
/// are a strict superset of the risk profile of lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccessLevel {
    /// Read-public.
    L0 = 0,
    /// Read-scoped.
    L1 = 1,
    /// Write-scoped.
    L2 = 2,
    /// High-risk.
    L3 = 3,
}

impl AccessLevel {
    /// Returns the numeric access level.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Builds an [`AccessLevel`] from its numeric value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::L0),
            1 => Some(Self::L1),
            2 => Some(Self::L2),
            3 => Some(Self::L3),
            _ => None,
        }
    }
}

/// A capability grant entitling `group_folder` to call `provider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Group the capability is granted to.
    pub group_folder: String,
    /// External provider identifier.
    pub provider: String,
    /// Access level granted.
    pub access_level: AccessLevel,
    /// When non-empty, only these actions are permitted.
    pub allowed_actions: Vec<String>,
    /// When non-empty, these actions are always denied (wins over allowed).
    pub denied_actions: Vec<String>,
    /// Group or identity that granted the capability.
    pub granted_by: String,
    /// Grant timestamp.
    pub granted_at: String,
    /// Expiry timestamp; required for L2/L3.
    pub expires_at: Option<String>,
    /// Whether the grant is currently active.
    pub active: bool,
}

// ============================================================================
// SECTION: ExtCall
// ============================================================================

/// Lifecycle status of an external-access broker call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtCallStatus {
    /// Authorized but not yet handed to the executor.
    Authorized,
    /// Handed to the executor, awaiting completion.
    Processing,
    /// Completed successfully.
    Executed,
    /// Denied at authorization time; never executed.
    Denied,
    /// Executor reported failure.
    Failed,
    /// Executor deadline elapsed.
    Timeout,
}

impl ExtCallStatus {
    /// Returns true when this status counts against broker backpressure.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Authorized | Self::Processing)
    }

    /// Returns true when this status is a terminal status eligible for the
    /// cleanup sweep (never `Processing`, which must be preserved regardless
    /// of age).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Denied | Self::Failed | Self::Timeout)
    }
}

/// An audit record of one external-access broker call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtCall {
    /// Auto-assigned row id.
    pub id: i64,
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
    /// HMAC-SHA256 over the canonicalized parameters. Raw values are never
    /// stored.
    pub params_hmac: String,
    /// Sanitized human-readable parameter summary (types/lengths only).
    pub params_summary: String,
    /// Current lifecycle status.
    pub status: ExtCallStatus,
    /// Reason the call was denied, when `status == Denied`.
    pub denial_reason: Option<String>,
    /// Human-readable result summary from the executor.
    pub result_summary: Option<String>,
    /// Sanitized JSON response payload from the executor.
    pub response_data: Option<String>,
    /// Governed task this call is bound to.
    pub task_id: String,
    /// Product derived from the bound task, when any.
    pub product_id: Option<String>,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
    /// Executor duration in milliseconds, once known.
    pub duration_ms: Option<i64>,
    /// Creation timestamp.
    pub created_at: String,
}

// ============================================================================
// SECTION: Notification
// ============================================================================

/// A fan-out notification created from an `@group` mention in a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Auto-assigned row id.
    pub id: i64,
    /// Task the mention occurred on.
    pub task_id: String,
    /// Group mentioned.
    pub target_group: String,
    /// Actor who wrote the comment.
    pub actor: String,
    /// First 200 characters of the sanitized comment text.
    pub snippet: String,
    /// Read state.
    pub read: bool,
    /// Creation timestamp.
    pub created_at: String,
}

// ============================================================================
// SECTION: Topic and Message
// ============================================================================

/// Lifecycle status of a cockpit chat topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    /// Topic is open for new messages.
    Active,
    /// Topic is archived; retained for history only.
    Archived,
}

/// A minimal cockpit chat grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Identifier of the form `topic-<random>`.
    pub id: String,
    /// Group the topic belongs to.
    pub group_folder: String,
    /// Display title.
    pub title: String,
    /// Lifecycle status.
    pub status: TopicStatus,
    /// Creation timestamp.
    pub created_at: String,
    /// Timestamp of the most recent message or status change.
    pub last_activity: String,
    /// Opaque messaging-bus group identifier, echoed back verbatim by
    /// `GET /ops/messages`; the messaging bus integration itself is out of
    /// scope for this core (§1 Non-goals).
    pub group_jid: Option<String>,
}

/// A single chat message row (append-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Auto-assigned row id.
    pub id: i64,
    /// Group the message belongs to.
    pub group_folder: String,
    /// Actor who sent the message.
    pub actor: String,
    /// Sanitized message text, ≤ 4000 chars.
    pub text: String,
    /// Message timestamp; messages are ordered ascending by this.
    pub timestamp: String,
    /// Optional correlation to a governed task.
    pub task_id: Option<String>,
}

// ============================================================================
// SECTION: Group Registry
// ============================================================================

/// Configurable registry of known actor groups (§9 open question). Defaults
/// to the five built-in groups named throughout the spec; unknown groups
/// are rejected at ingress by the HTTP layer, not by this registry itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRegistry {
    groups: BTreeSet<String>,
}

impl GroupRegistry {
    /// Builds the default registry containing the five well-known groups.
    #[must_use]
    pub fn default_groups() -> Self {
        Self {
            groups: ["main", "developer", "security", "revops", "product"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Returns true when `group` is a member of this registry.
    #[must_use]
    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Returns the groups in this registry, sorted.
    #[must_use]
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::default_groups()
    }
}

/// Returns true when `group` is one of the five built-in groups named in
/// the glossary, independent of any configured registry. Used by code paths
/// (e.g. the policy kernel) that must reference the `main` group by name
/// without threading a full registry through every call.
#[must_use]
pub fn is_well_known_group(group: &str) -> bool {
    matches!(group, "main" | "developer" | "security" | "revops" | "product")
}

impl FromStr for TaskState {
    type Err = UnknownStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "INBOX" => Ok(Self::Inbox),
            "TRIAGED" => Ok(Self::Triaged),
            "READY" => Ok(Self::Ready),
            "DOING" => Ok(Self::Doing),
            "REVIEW" => Ok(Self::Review),
            "APPROVAL" => Ok(Self::Approval),
            "DONE" => Ok(Self::Done),
            "BLOCKED" => Ok(Self::Blocked),
            "KILLED" => Ok(Self::Killed),
            other => Err(UnknownStateError(other.to_string())),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Inbox => "INBOX",
            Self::Triaged => "TRIAGED",
            Self::Ready => "READY",
            Self::Doing => "DOING",
            Self::Review => "REVIEW",
            Self::Approval => "APPROVAL",
            Self::Done => "DONE",
            Self::Blocked => "BLOCKED",
            Self::Killed => "KILLED",
        };
        f.write_str(label)
    }
}

/// Error returned when parsing an unrecognized task state string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task state: {0}")]
pub struct UnknownStateError(pub String);

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_state_round_trips_through_display_and_from_str() {
        for state in [
            TaskState::Inbox,
            TaskState::Triaged,
            TaskState::Ready,
            TaskState::Doing,
            TaskState::Review,
            TaskState::Approval,
            TaskState::Done,
            TaskState::Blocked,
            TaskState::Killed,
        ] {
            let rendered = state.to_string();
            assert_eq!(rendered.parse::<TaskState>().expect("parse"), state);
        }
    }

    #[test]
    fn gate_approver_mapping_matches_spec() {
        assert_eq!(Gate::Security.approver_group(), Some("security"));
        assert_eq!(Gate::RevOps.approver_group(), Some("main"));
        assert_eq!(Gate::Claims.approver_group(), Some("main"));
        assert_eq!(Gate::Product.approver_group(), Some("main"));
        assert_eq!(Gate::None.approver_group(), None);
    }

    #[test]
    fn default_group_registry_contains_five_builtins() {
        let registry = GroupRegistry::default_groups();
        for group in ["main", "developer", "security", "revops", "product"] {
            assert!(registry.contains(group));
        }
        assert!(!registry.contains("finance"));
    }

    #[test]
    fn access_level_numeric_round_trip() {
        for level in [AccessLevel::L0, AccessLevel::L1, AccessLevel::L2, AccessLevel::L3] {
            assert_eq!(AccessLevel::from_u8(level.as_u8()), Some(level));
        }
        assert_eq!(AccessLevel::from_u8(9), None);
    }

    #[test]
    fn ext_call_status_pending_and_terminal_are_disjoint() {
        for status in [
            ExtCallStatus::Authorized,
            ExtCallStatus::Processing,
            ExtCallStatus::Executed,
            ExtCallStatus::Denied,
            ExtCallStatus::Failed,
            ExtCallStatus::Timeout,
        ] {
            assert_ne!(status.is_pending(), status.is_terminal() && status.is_pending());
        }
        assert!(ExtCallStatus::Processing.is_pending());
        assert!(!ExtCallStatus::Processing.is_terminal());
    }
}
