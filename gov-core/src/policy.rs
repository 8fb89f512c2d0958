// gov-core/src/policy.rs
// ============================================================================
// Module: Governance Policy Kernel
// Description: Pure functions over (task, transition, actor) -> allow/deny.
// Purpose: Centralize the fixed state graph, gate/approver mapping, and
//          strict-mode validators so the engine never embeds policy logic
//          inline.
// Dependencies: crate::{errors, model}
// ============================================================================

//! ## Overview
//! The policy kernel has zero I/O: every function here takes owned or
//! borrowed values and returns a decision. [`crate::engine::GovernanceEngine`]
//! is the only caller; it supplies whatever store-backed context (the task
//! row, a prior approval) these functions need as plain arguments.
//!
//! The state graph, gate-approver mapping, and strict-mode rule set are
//! fixed by design (§1 Non-goals: "not a generic workflow engine") — there is
//! no registration mechanism for new edges or gates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::errors::GovernanceError;
use crate::model::Gate;
use crate::model::TaskState;

// ============================================================================
// SECTION: Policy Version
// ============================================================================

/// Version string injected into `metadata.policy_version` on task creation.
/// Bump this when the transition graph or strict-mode rules change; there is
/// no migration of already-created tasks' recorded version.
pub const POLICY_VERSION: &str = "gov-policy-v1";

// ============================================================================
// SECTION: Transition Graph
// ============================================================================

/// Outcome of a transition check that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// `from != to` and the edge exists; the caller should write a
    /// `transition` activity and bump version.
    Allowed,
    /// `from == to`; the caller must treat this as a successful no-op:
    /// write no activity, bump no version.
    NoOp,
}

/// Returns the set of states reachable from `state` in one transition.
/// `DONE` and `KILLED` are terminal and return an empty slice.
#[must_use]
pub const fn transition_edges(state: TaskState) -> &'static [TaskState] {
    match state {
        TaskState::Inbox => &[TaskState::Triaged, TaskState::Blocked],
        TaskState::Triaged => &[TaskState::Ready, TaskState::Blocked],
        TaskState::Ready => &[TaskState::Doing, TaskState::Blocked],
        TaskState::Doing => &[TaskState::Review, TaskState::Blocked],
        TaskState::Review => &[TaskState::Approval, TaskState::Doing, TaskState::Blocked],
        TaskState::Approval => &[TaskState::Done, TaskState::Review, TaskState::Blocked],
        TaskState::Blocked => {
            &[TaskState::Inbox, TaskState::Triaged, TaskState::Ready, TaskState::Doing]
        }
        TaskState::Done | TaskState::Killed => &[],
    }
}

/// Validates a bare state transition against the fixed graph edges (§4.1).
///
/// Same-state transitions are always a [`TransitionOutcome::NoOp`], even
/// from a terminal state, since the caller treats a no-op as success without
/// consulting the edge set.
///
/// # Errors
///
/// Returns a `POLICY_DENY`/`INVALID_TRANSITION` error when no edge connects
/// `from` to `to`.
pub fn validate_transition(
    from: TaskState,
    to: TaskState,
) -> Result<TransitionOutcome, GovernanceError> {
    if from == to {
        return Ok(TransitionOutcome::NoOp);
    }
    if transition_edges(from).contains(&to) {
        Ok(TransitionOutcome::Allowed)
    } else {
        Err(GovernanceError::policy_deny(
            "INVALID_TRANSITION",
            format!("no transition edge from {from} to {to}"),
        ))
    }
}

// ============================================================================
// SECTION: Approver Checks
// ============================================================================

/// Returns the group authorized to approve `gate`, mirroring
/// [`Gate::approver_group`]. Exposed here so callers reading the policy
/// kernel don't need to reach into the model module for this mapping.
#[must_use]
pub const fn gate_approver(gate: Gate) -> Option<&'static str> {
    gate.approver_group()
}

/// Checks that `actor_group` is authorized to approve `gate`. `main` may
/// approve any gate; any other group must match the gate's fixed approver
/// group exactly.
///
/// # Errors
///
/// Returns a `FORBIDDEN` error when `actor_group` is not the gate's approver
/// and is not `main`.
pub fn check_approver(gate: Gate, actor_group: &str) -> Result<(), GovernanceError> {
    if actor_group == "main" {
        return Ok(());
    }
    match gate_approver(gate) {
        Some(required) if required == actor_group => Ok(()),
        _ => Err(GovernanceError::forbidden(
            "FORBIDDEN",
            format!("group {actor_group} may not approve gate {gate}"),
        )),
    }
}

/// Enforces separation of powers: the approver of a gate must not also be
/// the task's executor.
///
/// # Errors
///
/// Returns a `FORBIDDEN_executor` error when `executor` is set and equals
/// `actor_group`.
pub fn check_approver_not_executor(
    actor_group: &str,
    executor: Option<&str>,
) -> Result<(), GovernanceError> {
    if executor == Some(actor_group) {
        return Err(GovernanceError::forbidden(
            "FORBIDDEN_executor",
            format!("{actor_group} may not approve a gate on a task it executes"),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Strict-Mode Validators
// ============================================================================

/// Snapshot of the fields strict-mode validators need, gathered by the
/// engine from the current task row and the incoming command. Kept separate
/// from [`crate::model::Task`] so the kernel never depends on how the
/// engine assembles this context.
#[derive(Debug, Clone, Copy)]
pub struct StrictContext<'a> {
    /// Whether the task (after this transition) has a priority set. Always
    /// true in this model since `Task.priority` is a required field with a
    /// default; retained so the check has somewhere to fail if that ever
    /// changes.
    pub priority_present: bool,
    /// Whether the task has a non-empty `assigned_group` ("owner").
    pub owner_present: bool,
    /// Whether `metadata.dodChecklist` is non-empty.
    pub dod_checklist_non_empty: bool,
    /// Value of the `evidenceRequired` metadata key, if present and boolean.
    pub evidence_required: Option<bool>,
    /// Non-blank trimmed review summary supplied with a `DOING -> REVIEW`
    /// transition, if any.
    pub review_summary: Option<&'a str>,
    /// Whether an `auditLink` was supplied with this transition.
    pub audit_link_present: bool,
    /// Whether an existing approval for the task's gate carries an
    /// `evidence_link`.
    pub approval_evidence_link_present: bool,
    /// Whether every `dodStatus` item is `done` (and the list is non-empty).
    pub dod_all_done: bool,
    /// Whether the task's `task_type` is `SECURITY`.
    pub task_type_is_security: bool,
    /// Current value of `metadata.docsUpdated`.
    pub docs_updated: bool,
    /// The task's configured gate.
    pub gate: Gate,
    /// Whether a matching approval exists for the task's gate.
    pub gate_approved: bool,
    /// Whether an override (`by`, `reason`, `acceptedRisk`,
    /// `reviewDeadlineIso`) is fully populated on the task.
    pub override_populated: bool,
}

/// Runs every strict-mode validator applicable to the `from -> to`
/// transition (§4.1) and returns all violated rules. An empty result means
/// the transition passes strict mode.
#[must_use]
pub fn validate_strict(from: TaskState, to: TaskState, ctx: &StrictContext<'_>) -> Vec<GovernanceError> {
    let mut errors = Vec::new();

    if !ctx.priority_present {
        errors.push(GovernanceError::policy_deny("MISSING_PRIORITY", "priority is required"));
    }
    if !ctx.owner_present {
        errors.push(GovernanceError::policy_deny("MISSING_OWNER", "owner is required"));
    }

    if to == TaskState::Doing {
        if !ctx.dod_checklist_non_empty {
            errors.push(GovernanceError::policy_deny(
                "MISSING_DOD_CHECKLIST",
                "a non-empty dodChecklist is required to enter DOING",
            ));
        }
        if ctx.evidence_required.is_none() {
            errors.push(GovernanceError::policy_deny(
                "MISSING_EVIDENCE_REQUIRED",
                "evidenceRequired must be a boolean to enter DOING",
            ));
        }
    }

    if from == TaskState::Doing
        && to == TaskState::Review
        && !ctx.review_summary.is_some_and(|summary| !summary.trim().is_empty())
    {
        errors.push(GovernanceError::policy_deny(
            "MISSING_REVIEW_SUMMARY",
            "a non-blank review summary is required to transition DOING -> REVIEW",
        ));
    }

    if from == TaskState::Review
        && ctx.evidence_required == Some(true)
        && !ctx.audit_link_present
        && !ctx.approval_evidence_link_present
    {
        errors.push(GovernanceError::policy_deny(
            "MISSING_EVIDENCE_LINK",
            "an auditLink or an approval with evidenceLink is required to leave REVIEW",
        ));
    }

    if to == TaskState::Done {
        if !ctx.dod_all_done {
            errors.push(GovernanceError::policy_deny(
                "DOD_INCOMPLETE",
                "all dodChecklist items must be done to enter DONE",
            ));
        }
        if ctx.task_type_is_security && !ctx.docs_updated {
            errors.push(GovernanceError::policy_deny(
                "DOCS_NOT_UPDATED",
                "SECURITY tasks require docsUpdated before DONE",
            ));
        }
        if ctx.gate != Gate::None && !ctx.gate_approved && !ctx.override_populated {
            errors.push(GovernanceError::policy_deny(
                "GATE_NOT_APPROVED",
                format!("gate {} is not approved and no override is recorded", ctx.gate),
            ));
        }
    }

    errors
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_graph_matches_spec_edges() {
        assert_eq!(transition_edges(TaskState::Inbox), &[TaskState::Triaged, TaskState::Blocked]);
        assert_eq!(
            transition_edges(TaskState::Review),
            &[TaskState::Approval, TaskState::Doing, TaskState::Blocked]
        );
        assert_eq!(
            transition_edges(TaskState::Blocked),
            &[TaskState::Inbox, TaskState::Triaged, TaskState::Ready, TaskState::Doing]
        );
        assert!(transition_edges(TaskState::Done).is_empty());
        assert!(transition_edges(TaskState::Killed).is_empty());
    }

    #[test]
    fn same_state_transition_is_always_a_noop() {
        assert_eq!(
            validate_transition(TaskState::Done, TaskState::Done),
            Ok(TransitionOutcome::NoOp)
        );
    }

    #[test]
    fn missing_edge_is_invalid_transition() {
        let err = validate_transition(TaskState::Inbox, TaskState::Done).expect_err("denied");
        assert_eq!(err.code, Some("INVALID_TRANSITION"));
    }

    #[test]
    fn valid_edge_is_allowed() {
        assert_eq!(
            validate_transition(TaskState::Inbox, TaskState::Triaged),
            Ok(TransitionOutcome::Allowed)
        );
    }

    #[test]
    fn check_approver_main_may_approve_any_gate() {
        assert!(check_approver(Gate::Security, "main").is_ok());
    }

    #[test]
    fn check_approver_rejects_wrong_group() {
        let err = check_approver(Gate::Security, "revops").expect_err("forbidden");
        assert_eq!(err.code, Some("FORBIDDEN"));
    }

    #[test]
    fn check_approver_accepts_matching_group() {
        assert!(check_approver(Gate::Security, "security").is_ok());
    }

    #[test]
    fn check_approver_not_executor_rejects_self_approval() {
        let err = check_approver_not_executor("security", Some("security")).expect_err("forbidden");
        assert_eq!(err.code, Some("FORBIDDEN_executor"));
    }

    #[test]
    fn check_approver_not_executor_allows_distinct_executor() {
        assert!(check_approver_not_executor("security", Some("developer")).is_ok());
        assert!(check_approver_not_executor("security", None).is_ok());
    }

    fn base_ctx() -> StrictContext<'static> {
        StrictContext {
            priority_present: true,
            owner_present: true,
            dod_checklist_non_empty: true,
            evidence_required: Some(false),
            review_summary: None,
            audit_link_present: false,
            approval_evidence_link_present: false,
            dod_all_done: true,
            task_type_is_security: false,
            docs_updated: true,
            gate: Gate::None,
            gate_approved: false,
            override_populated: false,
        }
    }

    #[test]
    fn entering_doing_requires_dod_checklist_and_evidence_required() {
        let mut ctx = base_ctx();
        ctx.dod_checklist_non_empty = false;
        ctx.evidence_required = None;
        let errors = validate_strict(TaskState::Ready, TaskState::Doing, &ctx);
        assert!(errors.iter().any(|e| e.code == Some("MISSING_DOD_CHECKLIST")));
        assert!(errors.iter().any(|e| e.code == Some("MISSING_EVIDENCE_REQUIRED")));
    }

    #[test]
    fn doing_to_review_requires_nonblank_summary() {
        let mut ctx = base_ctx();
        ctx.review_summary = Some("   ");
        let errors = validate_strict(TaskState::Doing, TaskState::Review, &ctx);
        assert!(errors.iter().any(|e| e.code == Some("MISSING_REVIEW_SUMMARY")));

        ctx.review_summary = Some("did the thing");
        assert!(validate_strict(TaskState::Doing, TaskState::Review, &ctx).is_empty());
    }

    #[test]
    fn entering_done_checks_dod_docs_and_gate() {
        let mut ctx = base_ctx();
        ctx.dod_all_done = false;
        ctx.task_type_is_security = true;
        ctx.docs_updated = false;
        ctx.gate = Gate::Security;
        let errors = validate_strict(TaskState::Approval, TaskState::Done, &ctx);
        assert!(errors.iter().any(|e| e.code == Some("DOD_INCOMPLETE")));
        assert!(errors.iter().any(|e| e.code == Some("DOCS_NOT_UPDATED")));
        assert!(errors.iter().any(|e| e.code == Some("GATE_NOT_APPROVED")));
    }

    #[test]
    fn entering_done_passes_with_gate_approved() {
        let mut ctx = base_ctx();
        ctx.gate = Gate::Security;
        ctx.gate_approved = true;
        assert!(validate_strict(TaskState::Approval, TaskState::Done, &ctx).is_empty());
    }

    #[test]
    fn entering_done_passes_with_override_populated_instead_of_approval() {
        let mut ctx = base_ctx();
        ctx.gate = Gate::Security;
        ctx.override_populated = true;
        assert!(validate_strict(TaskState::Approval, TaskState::Done, &ctx).is_empty());
    }
}
