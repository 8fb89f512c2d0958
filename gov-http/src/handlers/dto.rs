// gov-http/src/handlers/dto.rs
// ============================================================================
// Module: Request/Response Bodies
// Description: JSON wire shapes for every `/ops/*` endpoint, translated to
//              and from the `gov-core`/`gov-broker` command types.
// Purpose: Keep serde field naming (camelCase over the wire, snake_case in
//          Rust) in one place instead of scattered across handler bodies.
// Dependencies: gov-broker, gov-core, serde
// ============================================================================

//! ## Overview
//! Every struct here mirrors one JSON request or response body named in
//! §4.6. Request DTOs carry a `to_cmd`/`into_cmd`-style conversion into the
//! matching `gov-core`/`gov-broker` command struct; response DTOs are built
//! directly from domain types with `#[serde(rename_all = "camelCase")]` to
//! match [`gov_core::TaskMetadata`]'s own `dodChecklist`/`docsUpdated` wire
//! convention.

// ============================================================================
// SECTION: Imports
// ============================================================================

use gov_broker::CallRequest;
use gov_core::ApproveCmd;
use gov_core::AssignCmd;
use gov_core::CommentCmd;
use gov_core::CreateTaskCmd;
use gov_core::DocsUpdatedCmd;
use gov_core::DodUpdateCmd;
use gov_core::EvidenceBulkCmd;
use gov_core::EvidenceCmd;
use gov_core::Gate;
use gov_core::OverrideCmd;
use gov_core::Priority;
use gov_core::Scope;
use gov_core::TaskState;
use gov_core::TaskType;
use gov_core::TransitionCmd;
use gov_core::interfaces::DodItemInput;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Create
// ============================================================================

/// Body of `POST /ops/actions/create`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    /// Acting group; must be `main`.
    pub actor: String,
    /// Task title.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Kind of work.
    pub task_type: TaskType,
    /// Priority; defaults to `P2` when absent.
    pub priority: Option<Priority>,
    /// Requested scope.
    pub scope: Scope,
    /// Product id, required iff `scope == Product` after coercion.
    pub product_id: Option<String>,
    /// Group to assign the task to.
    pub assigned_group: Option<String>,
    /// Specific executor, if known at creation time.
    pub executor: Option<String>,
    /// Group that originated the task; defaults to `actor`.
    pub created_by: Option<String>,
    /// Gate requirement.
    pub gate: Option<Gate>,
    /// Whether a DoD checklist is required.
    pub dod_required: Option<bool>,
    /// Initial DoD checklist text entries.
    pub dod_checklist: Option<Vec<String>>,
}

impl CreateTaskBody {
    /// Converts this request body into a [`CreateTaskCmd`].
    #[must_use]
    pub fn into_cmd(self) -> CreateTaskCmd {
        CreateTaskCmd {
            actor: self.actor,
            title: self.title,
            description: self.description,
            task_type: self.task_type,
            priority: self.priority,
            scope: self.scope,
            product_id: self.product_id,
            assigned_group: self.assigned_group,
            executor: self.executor,
            created_by: self.created_by,
            gate: self.gate,
            dod_required: self.dod_required,
            dod_checklist: self.dod_checklist,
        }
    }
}

// ============================================================================
// SECTION: Transition
// ============================================================================

/// Body of `POST /ops/actions/transition`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    /// Task to transition.
    pub task_id: String,
    /// Target state.
    pub to_state: TaskState,
    /// Free-text reason.
    pub reason: Option<String>,
    /// Optimistic-concurrency guard.
    pub expected_version: Option<i64>,
    /// Acting group.
    pub actor: String,
    /// Audit link supplied with this transition, if any; its mere presence
    /// (not its content) satisfies the strict `MISSING_EVIDENCE_LINK`
    /// check.
    pub audit_link: Option<String>,
}

impl TransitionBody {
    /// Converts this request body into a [`TransitionCmd`].
    #[must_use]
    pub fn into_cmd(self) -> TransitionCmd {
        TransitionCmd {
            task_id: self.task_id,
            to_state: self.to_state,
            reason: self.reason,
            expected_version: self.expected_version,
            actor: self.actor,
            audit_link_present: self.audit_link.is_some(),
        }
    }
}

// ============================================================================
// SECTION: Assign
// ============================================================================

/// Body of `POST /ops/actions/assign`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    /// Task to reassign.
    pub task_id: String,
    /// New responsible group.
    pub assigned_group: String,
    /// New executor identity, if any.
    pub executor: Option<String>,
    /// Acting group; must be `main`.
    pub actor: String,
}

impl AssignBody {
    /// Converts this request body into an [`AssignCmd`].
    #[must_use]
    pub fn into_cmd(self) -> AssignCmd {
        AssignCmd { task_id: self.task_id, assigned_group: self.assigned_group, executor: self.executor, actor: self.actor }
    }
}

// ============================================================================
// SECTION: Approve
// ============================================================================

/// Body of `POST /ops/actions/approve`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
    /// Task being approved.
    pub task_id: String,
    /// Gate the approval applies to.
    pub gate_type: Gate,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Optional evidence link.
    pub evidence_link: Option<String>,
    /// Acting group.
    pub actor: String,
}

impl ApproveBody {
    /// Converts this request body into an [`ApproveCmd`].
    #[must_use]
    pub fn into_cmd(self) -> ApproveCmd {
        ApproveCmd {
            task_id: self.task_id,
            gate_type: self.gate_type,
            notes: self.notes,
            evidence_link: self.evidence_link,
            actor: self.actor,
        }
    }
}

// ============================================================================
// SECTION: Override
// ============================================================================

/// Body of `POST /ops/actions/override`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBody {
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

impl OverrideBody {
    /// Converts this request body into an [`OverrideCmd`].
    #[must_use]
    pub fn into_cmd(self) -> OverrideCmd {
        OverrideCmd {
            task_id: self.task_id,
            reason: self.reason,
            accepted_risk: self.accepted_risk,
            review_deadline_iso: self.review_deadline_iso,
            actor: self.actor,
        }
    }
}

// ============================================================================
// SECTION: Comment
// ============================================================================

/// Body of `POST /ops/actions/comment`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    /// Task being commented on.
    pub task_id: String,
    /// Raw comment text.
    pub text: String,
    /// Actor; falls back to `cockpit` when absent or too long.
    pub actor: Option<String>,
}

impl CommentBody {
    /// Converts this request body into a [`CommentCmd`].
    #[must_use]
    pub fn into_cmd(self) -> CommentCmd {
        CommentCmd { task_id: self.task_id, text: self.text, actor: self.actor }
    }
}

// ============================================================================
// SECTION: DoD
// ============================================================================

/// One checklist item in a [`DodBody`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DodItemBody {
    /// Client-supplied id; preserved only if it matches `^dod-[a-z0-9]+$`.
    pub id: Option<String>,
    /// Item text.
    pub text: String,
    /// Completion state.
    pub done: bool,
}

/// Body of `POST /ops/actions/dod`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DodBody {
    /// Task to update.
    pub task_id: String,
    /// New checklist items.
    pub items: Vec<DodItemBody>,
    /// Acting group.
    pub actor: String,
}

impl DodBody {
    /// Converts this request body into a [`DodUpdateCmd`].
    #[must_use]
    pub fn into_cmd(self) -> DodUpdateCmd {
        DodUpdateCmd {
            task_id: self.task_id,
            items: self
                .items
                .into_iter()
                .map(|item| DodItemInput { id: item.id, text: item.text, done: item.done })
                .collect(),
            actor: self.actor,
        }
    }
}

// ============================================================================
// SECTION: Evidence
// ============================================================================

/// Body of `POST /ops/actions/evidence`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBody {
    /// Task to append evidence to.
    pub task_id: String,
    /// Evidence link.
    pub link: String,
    /// Optional note.
    pub note: Option<String>,
    /// Acting group.
    pub actor: String,
}

impl EvidenceBody {
    /// Converts this request body into an [`EvidenceCmd`].
    #[must_use]
    pub fn into_cmd(self) -> EvidenceCmd {
        EvidenceCmd { task_id: self.task_id, link: self.link, note: self.note, actor: self.actor }
    }
}

/// Body of `POST /ops/actions/evidence/bulk`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBulkBody {
    /// Task to append evidence to.
    pub task_id: String,
    /// Evidence links.
    pub links: Vec<String>,
    /// Optional note shared by all entries.
    pub note: Option<String>,
    /// Acting group.
    pub actor: String,
}

impl EvidenceBulkBody {
    /// Converts this request body into an [`EvidenceBulkCmd`].
    #[must_use]
    pub fn into_cmd(self) -> EvidenceBulkCmd {
        EvidenceBulkCmd { task_id: self.task_id, links: self.links, note: self.note, actor: self.actor }
    }
}

// ============================================================================
// SECTION: Docs Updated
// ============================================================================

/// Body of `POST /ops/actions/docsUpdated`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocsUpdatedBody {
    /// Task to update.
    pub task_id: String,
    /// New value.
    pub docs_updated: bool,
    /// Acting group.
    pub actor: String,
}

impl DocsUpdatedBody {
    /// Converts this request body into a [`DocsUpdatedCmd`].
    #[must_use]
    pub fn into_cmd(self) -> DocsUpdatedCmd {
        DocsUpdatedCmd { task_id: self.task_id, docs_updated: self.docs_updated, actor: self.actor }
    }
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

/// Body of `POST /ops/actions/notifications/markRead`.
#[derive(Debug, Deserialize)]
pub struct MarkReadBody {
    /// Notification ids to mark read.
    pub ids: Vec<i64>,
}

/// Response of `POST /ops/actions/notifications/markRead`.
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    /// Number of rows actually flipped from unread to read.
    pub marked: usize,
}

// ============================================================================
// SECTION: Chat and Topics
// ============================================================================

/// Body of `POST /ops/actions/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    /// Group the message belongs to.
    pub group_folder: String,
    /// Actor who sent the message.
    pub actor: Option<String>,
    /// Raw message text.
    pub text: String,
    /// Optional correlation to a governed task.
    pub task_id: Option<String>,
}

/// Body of `POST /ops/actions/topic`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicBody {
    /// Group the topic belongs to.
    pub group_folder: String,
    /// Display title.
    pub title: String,
    /// Opaque messaging-bus group identifier, echoed back verbatim.
    pub group_jid: Option<String>,
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Query parameters of `GET /ops/topics`.
#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    /// Group to list topics for.
    pub group: String,
}

/// Query parameters of `GET /ops/messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Maximum number of messages to return.
    pub limit: Option<i64>,
    /// Return only messages with `id < before`.
    pub before: Option<i64>,
    /// Group whose most-recently-active topic's `group_jid` is echoed back.
    pub group: Option<String>,
}

/// Response of `GET /ops/messages`.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Messages, ascending by timestamp.
    pub messages: Vec<gov_core::model::Message>,
    /// Opaque messaging-bus group identifier for [`MessagesQuery::group`],
    /// `None` when no group was requested or it has no topics yet.
    pub group_jid: Option<String>,
}

/// Query parameters of `GET /ops/notifications`.
#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    /// Group the notifications were fanned out to.
    pub target_group: String,
    /// Restrict to unread notifications when `Some(true)`.
    #[serde(default)]
    pub unread_only: Option<bool>,
    /// Maximum number of notifications to return.
    pub limit: Option<i64>,
}

// ============================================================================
// SECTION: External Access
// ============================================================================

/// Body of `POST /ops/ext/call`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtCallBody {
    /// Client-supplied unique request identifier.
    pub request_id: String,
    /// Group making the call.
    pub group_folder: String,
    /// External provider identifier.
    pub provider: String,
    /// Action requested on the provider.
    pub action: String,
    /// Raw call parameters; never persisted.
    pub params: Value,
    /// Governed task this call is bound to.
    pub task_id: String,
    /// Client-supplied idempotency key, if any.
    pub idempotency_key: Option<String>,
}

impl ExtCallBody {
    /// Converts this request body into a [`CallRequest`].
    #[must_use]
    pub fn into_cmd(self) -> CallRequest {
        CallRequest {
            request_id: self.request_id,
            group_folder: self.group_folder,
            provider: self.provider,
            action: self.action,
            params: self.params,
            task_id: self.task_id,
            idempotency_key: self.idempotency_key,
        }
    }
}
