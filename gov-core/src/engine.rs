// gov-core/src/engine.rs
// ============================================================================
// Module: Governance Engine
// Description: Orchestrates every governance command against a pluggable
//              `GovernanceStore`, calling the policy kernel before each
//              mutation and translating store failures into the uniform
//              error taxonomy.
// Purpose: Be the single place where "apply a command atomically" is
//          implemented, so HTTP and IPC-style callers share one code path.
// Dependencies: crate::{errors, hashing, ids, interfaces, metadata, model,
//               policy, sanitize, time}
// ============================================================================

//! ## Overview
//! [`GovernanceEngine`] is generic over any [`GovernanceStore`] implementor,
//! the way the teacher's control-plane engine is generic over its store and
//! policy trait objects. It holds no database handle itself: every method
//! reads whatever rows it needs through the store, asks [`crate::policy`]
//! whether the requested mutation is allowed, and — if so — builds the new
//! task state and hands it to the store as one [`TaskMutation`].
//!
//! Two calling conventions share this engine (§9 "Separation of IPC-style vs
//! HTTP-style commands"): HTTP handlers call these methods directly and map
//! the returned [`GovernanceError`] to a status code; trusted in-process
//! callers should instead go through [`apply_lenient`], which swallows the
//! error after invoking a caller-supplied hook (typically an audit sink)
//! and returns `None`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;

use crate::errors::ErrorKind;
use crate::errors::GovernanceError;
use crate::hashing;
use crate::ids;
use crate::interfaces::ApproveCmd;
use crate::interfaces::AssignCmd;
use crate::interfaces::CommentCmd;
use crate::interfaces::CommentResult;
use crate::interfaces::CreateTaskCmd;
use crate::interfaces::CreateTaskResult;
use crate::interfaces::DocsUpdatedCmd;
use crate::interfaces::DodUpdateCmd;
use crate::interfaces::DodUpdateResult;
use crate::interfaces::EvidenceBulkCmd;
use crate::interfaces::EvidenceCmd;
use crate::interfaces::GovernanceStore;
use crate::interfaces::NewActivity;
use crate::interfaces::NewNotification;
use crate::interfaces::OverrideCmd;
use crate::interfaces::StoreError;
use crate::interfaces::TaskMutation;
use crate::interfaces::TransitionCmd;
use crate::metadata::DodItem;
use crate::metadata::EvidenceEntry;
use crate::metadata::MAX_DOD_ITEMS;
use crate::metadata::MAX_DOD_TEXT_LEN;
use crate::metadata::MAX_EVIDENCE_BULK_ITEMS;
use crate::metadata::MAX_EVIDENCE_LINK_LEN;
use crate::metadata::MAX_EVIDENCE_NOTE_LEN;
use crate::metadata::MAX_METADATA_BYTES;
use crate::metadata::MIN_DOD_TEXT_LEN;
use crate::metadata::TaskMetadata;
use crate::model::Activity;
use crate::model::ActivityAction;
use crate::model::Gate;
use crate::model::GroupRegistry;
use crate::model::ProductStatus;
use crate::model::Task;
use crate::model::TaskState;
use crate::model::TaskType;
use crate::policy;
use crate::policy::StrictContext;
use crate::policy::TransitionOutcome;
use crate::sanitize;
use crate::time;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Orchestrates governance commands against a [`GovernanceStore`].
pub struct GovernanceEngine<S> {
    store: S,
    strict: bool,
    groups: GroupRegistry,
}

impl<S: GovernanceStore> GovernanceEngine<S> {
    /// Builds an engine with the default five-group registry.
    pub fn new(store: S, strict: bool) -> Self {
        Self { store, strict, groups: GroupRegistry::default_groups() }
    }

    /// Builds an engine with a caller-supplied group registry (§9).
    pub fn with_group_registry(store: S, strict: bool, groups: GroupRegistry) -> Self {
        Self { store, strict, groups }
    }

    /// Returns true when strict-mode validators are engaged.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Fetches a task snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the task does not exist.
    pub fn get_task(&self, task_id: &str) -> Result<Task, GovernanceError> {
        self.store
            .get_task(task_id)
            .map_err(map_store_error)?
            .ok_or_else(|| GovernanceError::task_not_found(task_id))
    }

    /// Lists activities for a task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the task does not exist.
    pub fn list_activities(&self, task_id: &str) -> Result<Vec<Activity>, GovernanceError> {
        self.get_task(task_id)?;
        self.store.list_activities(task_id).map_err(map_store_error)
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Creates a new task in `INBOX`.
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` if `actor != "main"`, `VALIDATION` on malformed
    /// input, `NOT_FOUND` if `product_id` is set but unknown, or `INTERNAL`
    /// if task-id generation exhausts its retry budget.
    pub fn create_task(&self, cmd: CreateTaskCmd) -> Result<CreateTaskResult, GovernanceError> {
        if cmd.actor != "main" {
            return Err(GovernanceError::forbidden("FORBIDDEN", "only main may create tasks"));
        }
        if cmd.title.is_empty() || cmd.title.chars().count() > 140 {
            return Err(GovernanceError::validation("title must be 1..140 characters"));
        }

        let (scope, product_id, coerced) = self.resolve_scope(cmd.scope, cmd.product_id.as_deref())?;

        let template = template_defaults(cmd.task_type);
        let gate = cmd.gate.unwrap_or(template.0);
        let assigned_group = cmd.assigned_group.unwrap_or_else(|| template.1.to_string());
        if !self.groups.contains(&assigned_group) {
            return Err(GovernanceError::validation(format!(
                "assigned_group {assigned_group} is not a known group"
            )));
        }
        let dod_checklist = cmd.dod_checklist.unwrap_or(template.2);
        let dod_status = build_dod_status(&dod_checklist)?;
        let dod_required = cmd.dod_required.unwrap_or(!dod_checklist.is_empty());

        let metadata = TaskMetadata {
            policy_version: Some(policy::POLICY_VERSION.to_string()),
            dod_checklist,
            dod_status,
            evidence: Vec::new(),
            docs_updated: None,
            extra: Map::new(),
        };
        check_metadata_size(&metadata)?;

        let created_by = cmd.created_by.unwrap_or_else(|| cmd.actor.clone());
        let now = time::now_iso8601_ms();

        for _ in 0..ids::MAX_ID_GENERATION_ATTEMPTS {
            let task_id = ids::new_task_id();
            let task = Task {
                id: task_id.clone(),
                title: cmd.title.clone(),
                description: cmd.description.clone(),
                task_type: cmd.task_type,
                state: TaskState::Inbox,
                priority: cmd.priority.unwrap_or_default(),
                scope,
                product_id: product_id.clone(),
                assigned_group: assigned_group.clone(),
                executor: cmd.executor.clone(),
                created_by: created_by.clone(),
                gate,
                dod_required,
                override_by: None,
                override_reason: None,
                override_accepted_risk: None,
                override_review_deadline: None,
                metadata: metadata.clone(),
                version: 1,
                created_at: now.clone(),
                updated_at: now.clone(),
            };

            let mut activities = vec![NewActivity {
                action: ActivityAction::Create,
                from_state: None,
                to_state: Some(TaskState::Inbox),
                actor: cmd.actor.clone(),
                reason: None,
            }];
            if coerced {
                activities.push(NewActivity {
                    action: ActivityAction::CoerceScope,
                    from_state: None,
                    to_state: None,
                    actor: "system".to_string(),
                    reason: Some("PRODUCT_SCOPE_WITHOUT_PRODUCT_ID".to_string()),
                });
            }

            match self.store.insert_task(&task, &activities) {
                Ok(_) => return Ok(CreateTaskResult { task_id, state: TaskState::Inbox }),
                Err(StoreError::DuplicateTaskId(_)) => continue,
                Err(other) => return Err(map_store_error(other)),
            }
        }
        Err(GovernanceError::new(ErrorKind::Internal, "exhausted task id generation attempts"))
    }

    /// Normalizes the `(scope, product_id)` pair per §3's scope invariants,
    /// returning whether a coercion occurred.
    fn resolve_scope(
        &self,
        scope: crate::model::Scope,
        product_id: Option<&str>,
    ) -> Result<(crate::model::Scope, Option<String>, bool), GovernanceError> {
        use crate::model::Scope;
        match (scope, product_id) {
            (Scope::Company, Some(_)) => {
                Err(GovernanceError::validation("scope COMPANY must not set product_id"))
            }
            (Scope::Company, None) => Ok((Scope::Company, None, false)),
            (Scope::Product, None) => Ok((Scope::Company, None, true)),
            (Scope::Product, Some(id)) => {
                let product = self
                    .store
                    .get_product(id)
                    .map_err(map_store_error)?
                    .ok_or_else(|| GovernanceError::new(ErrorKind::NotFound, format!("product not found: {id}")))?;
                if product.status == ProductStatus::Killed {
                    return Err(GovernanceError::validation(format!("product {id} is killed")));
                }
                Ok((Scope::Product, Some(id.to_string()), false))
            }
        }
    }

    // ------------------------------------------------------------------
    // Transition
    // ------------------------------------------------------------------

    /// Transitions a task to a new state.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND`, `CONFLICT` on a stale `expected_version`,
    /// `POLICY_DENY` on an invalid edge or failed strict-mode check, or
    /// `FORBIDDEN` if `actor` is neither `main` nor the assigned group.
    pub fn transition(&self, cmd: TransitionCmd) -> Result<(), GovernanceError> {
        let mut task = self.get_task(&cmd.task_id)?;
        if let Some(expected) = cmd.expected_version {
            if expected != task.version {
                return Err(GovernanceError::stale_version(expected, task.version));
            }
        }

        let outcome = policy::validate_transition(task.state, cmd.to_state)?;
        if outcome == TransitionOutcome::NoOp {
            return Ok(());
        }

        if cmd.actor != "main" && cmd.actor != task.assigned_group {
            return Err(GovernanceError::forbidden(
                "FORBIDDEN",
                format!("{} may not transition a task assigned to {}", cmd.actor, task.assigned_group),
            ));
        }

        if self.strict {
            let approval = self.store.get_approval(&task.id, task.gate).map_err(map_store_error)?;
            let ctx = StrictContext {
                priority_present: true,
                owner_present: !task.assigned_group.is_empty(),
                dod_checklist_non_empty: !task.metadata.dod_checklist.is_empty(),
                evidence_required: evidence_required_flag(&task.metadata),
                review_summary: cmd.reason.as_deref(),
                audit_link_present: cmd.audit_link_present,
                approval_evidence_link_present: approval
                    .as_ref()
                    .is_some_and(|a| a.evidence_link.is_some()),
                dod_all_done: task.metadata.dod_all_done(),
                task_type_is_security: task.task_type == TaskType::Security,
                docs_updated: task.metadata.docs_updated.unwrap_or(false),
                gate: task.gate,
                gate_approved: approval.is_some(),
                override_populated: task.override_populated(),
            };
            if let Some(first) = policy::validate_strict(task.state, cmd.to_state, &ctx).into_iter().next()
            {
                return Err(first);
            }
        }

        let from_state = task.state;
        let expected_version = task.version;
        task.state = cmd.to_state;
        task.version += 1;
        task.updated_at = time::now_iso8601_ms();

        let mut activities = vec![NewActivity {
            action: ActivityAction::Transition,
            from_state: Some(from_state),
            to_state: Some(cmd.to_state),
            actor: cmd.actor.clone(),
            reason: cmd.reason.clone(),
        }];
        if from_state == TaskState::Doing && cmd.to_state == TaskState::Review {
            activities.push(NewActivity {
                action: ActivityAction::ExecutionSummary,
                from_state: None,
                to_state: None,
                actor: cmd.actor,
                reason: cmd.reason,
            });
        }

        self.store
            .update_task(TaskMutation { task, expected_version, activities, notifications: Vec::new() })
            .map_err(map_store_error)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assign
    // ------------------------------------------------------------------

    /// Reassigns a task's group and/or executor.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND`, `VALIDATION` on an unknown group, or
    /// `FORBIDDEN` if `actor != "main"`.
    pub fn assign(&self, cmd: AssignCmd) -> Result<(), GovernanceError> {
        if cmd.actor != "main" {
            return Err(GovernanceError::forbidden("FORBIDDEN", "only main may assign tasks"));
        }
        if !self.groups.contains(&cmd.assigned_group) {
            return Err(GovernanceError::validation(format!(
                "assigned_group {} is not a known group",
                cmd.assigned_group
            )));
        }
        let mut task = self.get_task(&cmd.task_id)?;
        let expected_version = task.version;
        task.assigned_group = cmd.assigned_group.clone();
        task.executor = cmd.executor;
        task.version += 1;
        task.updated_at = time::now_iso8601_ms();

        let activity = NewActivity {
            action: ActivityAction::Assign,
            from_state: None,
            to_state: None,
            actor: cmd.actor,
            reason: Some(format!("assigned to {}", cmd.assigned_group)),
        };
        self.store
            .update_task(TaskMutation {
                task,
                expected_version,
                activities: vec![activity],
                notifications: Vec::new(),
            })
            .map_err(map_store_error)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Approve
    // ------------------------------------------------------------------

    /// Records a gate approval; a second approval for the same
    /// `(task, gate_type)` replaces the first.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND`, or `FORBIDDEN` if `actor` is not the gate's
    /// approver or is the task's executor.
    pub fn approve(&self, cmd: ApproveCmd) -> Result<(), GovernanceError> {
        let task = self.get_task(&cmd.task_id)?;
        policy::check_approver(cmd.gate_type, &cmd.actor)?;
        policy::check_approver_not_executor(&cmd.actor, task.executor.as_deref())?;

        let now = time::now_iso8601_ms();
        let approval = crate::model::Approval {
            task_id: task.id.clone(),
            gate_type: cmd.gate_type,
            approved_by: cmd.actor.clone(),
            notes: cmd.notes,
            evidence_link: cmd.evidence_link,
            created_at: now,
        };
        let activity = NewActivity {
            action: ActivityAction::Approve,
            from_state: None,
            to_state: None,
            actor: cmd.actor,
            reason: Some(format!("gate {}", cmd.gate_type)),
        };
        self.store.upsert_approval(approval, activity).map_err(map_store_error)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Override
    // ------------------------------------------------------------------

    /// Records a founder override, bypassing gate approval; if the task is
    /// currently in `APPROVAL`, also transitions it to `DONE` in the same
    /// write.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` or `FORBIDDEN` if `actor != "main"`.
    pub fn override_task(&self, cmd: OverrideCmd) -> Result<(), GovernanceError> {
        if cmd.actor != "main" {
            return Err(GovernanceError::forbidden("FORBIDDEN", "only main may override a gate"));
        }
        let mut task = self.get_task(&cmd.task_id)?;
        let expected_version = task.version;
        task.override_by = Some(cmd.actor.clone());
        task.override_reason = Some(cmd.reason.clone());
        task.override_accepted_risk = Some(cmd.accepted_risk);
        task.override_review_deadline = Some(cmd.review_deadline_iso);
        task.version += 1;
        task.updated_at = time::now_iso8601_ms();

        let mut activities = vec![NewActivity {
            action: ActivityAction::Override,
            from_state: None,
            to_state: None,
            actor: cmd.actor.clone(),
            reason: Some(cmd.reason),
        }];

        if task.state == TaskState::Approval {
            activities.push(NewActivity {
                action: ActivityAction::Transition,
                from_state: Some(TaskState::Approval),
                to_state: Some(TaskState::Done),
                actor: cmd.actor,
                reason: Some("override".to_string()),
            });
            task.state = TaskState::Done;
        }

        self.store
            .update_task(TaskMutation { task, expected_version, activities, notifications: Vec::new() })
            .map_err(map_store_error)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Comment
    // ------------------------------------------------------------------

    /// Appends a sanitized comment and fans out `@group` mention
    /// notifications.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` or `VALIDATION` if the text is empty or too long.
    pub fn comment(&self, cmd: CommentCmd) -> Result<CommentResult, GovernanceError> {
        let mut task = self.get_task(&cmd.task_id)?;
        let sanitized = sanitize::sanitize_comment(&cmd.text)
            .map_err(|err| GovernanceError::validation(err.to_string()))?;
        let actor = sanitize::resolve_actor(cmd.actor.as_deref());
        let mentions = sanitize::parse_mentions(&sanitized, &self.groups);
        let snippet = sanitize::notification_snippet(&sanitized);

        let expected_version = task.version;
        task.version += 1;
        task.updated_at = time::now_iso8601_ms();

        let activity = NewActivity {
            action: ActivityAction::CommentAdded,
            from_state: None,
            to_state: None,
            actor: actor.clone(),
            reason: Some(sanitized),
        };
        let notifications = mentions
            .iter()
            .map(|group| NewNotification {
                target_group: group.clone(),
                actor: actor.clone(),
                snippet: snippet.clone(),
            })
            .collect();

        self.store
            .update_task(TaskMutation { task, expected_version, activities: vec![activity], notifications })
            .map_err(map_store_error)?;
        Ok(CommentResult { mentions })
    }

    // ------------------------------------------------------------------
    // DoD
    // ------------------------------------------------------------------

    /// Replaces a task's DoD checklist.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` or `VALIDATION` on malformed items.
    pub fn dod_update(&self, cmd: DodUpdateCmd) -> Result<DodUpdateResult, GovernanceError> {
        if cmd.items.len() > MAX_DOD_ITEMS {
            return Err(GovernanceError::validation(format!(
                "dodChecklist accepts at most {MAX_DOD_ITEMS} items"
            )));
        }
        let mut task = self.get_task(&cmd.task_id)?;

        let mut items = Vec::with_capacity(cmd.items.len());
        for input in cmd.items {
            let text = input.text.trim().to_string();
            if text.chars().count() < MIN_DOD_TEXT_LEN || text.chars().count() > MAX_DOD_TEXT_LEN {
                return Err(GovernanceError::validation(format!(
                    "dod item text must be {MIN_DOD_TEXT_LEN}..{MAX_DOD_TEXT_LEN} characters"
                )));
            }
            let id = input
                .id
                .filter(|id| ids::is_valid_dod_id(id))
                .unwrap_or_else(ids::new_dod_id);
            items.push(DodItem { id, text, done: input.done });
        }

        task.metadata.dod_checklist = items.iter().map(|item| item.text.clone()).collect();
        task.metadata.dod_status = items.clone();
        check_metadata_size(&task.metadata)?;

        let done = items.iter().filter(|item| item.done).count();
        let total = items.len();
        let concatenated = items.iter().map(|item| item.text.as_str()).collect::<Vec<_>>().join(",");
        let hash = hashing::short_hash(&concatenated);

        let expected_version = task.version;
        task.version += 1;
        task.updated_at = time::now_iso8601_ms();

        let activity = NewActivity {
            action: ActivityAction::DodUpdated,
            from_state: None,
            to_state: None,
            actor: cmd.actor,
            reason: Some(format!("{done}/{total} h:{hash}")),
        };
        self.store
            .update_task(TaskMutation {
                task,
                expected_version,
                activities: vec![activity],
                notifications: Vec::new(),
            })
            .map_err(map_store_error)?;
        Ok(DodUpdateResult { items })
    }

    // ------------------------------------------------------------------
    // Evidence
    // ------------------------------------------------------------------

    /// Appends one evidence entry.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` or `VALIDATION` if the link/note exceed their
    /// length limits.
    pub fn evidence(&self, cmd: EvidenceCmd) -> Result<(), GovernanceError> {
        if cmd.link.chars().count() > MAX_EVIDENCE_LINK_LEN {
            return Err(GovernanceError::validation(format!(
                "evidence link must be at most {MAX_EVIDENCE_LINK_LEN} characters"
            )));
        }
        if let Some(note) = &cmd.note {
            if note.chars().count() > MAX_EVIDENCE_NOTE_LEN {
                return Err(GovernanceError::validation(format!(
                    "evidence note must be at most {MAX_EVIDENCE_NOTE_LEN} characters"
                )));
            }
        }
        let mut task = self.get_task(&cmd.task_id)?;
        let now = time::now_iso8601_ms();
        task.metadata.evidence.push(EvidenceEntry {
            link: cmd.link.clone(),
            note: cmd.note.clone(),
            added_at: now.clone(),
        });
        check_metadata_size(&task.metadata)?;

        let expected_version = task.version;
        task.version += 1;
        task.updated_at = now;

        let reason = match &cmd.note {
            Some(note) => format!("{} ({note})", cmd.link),
            None => cmd.link,
        };
        let activity = NewActivity {
            action: ActivityAction::EvidenceAdded,
            from_state: None,
            to_state: None,
            actor: cmd.actor,
            reason: Some(reason),
        };
        self.store
            .update_task(TaskMutation {
                task,
                expected_version,
                activities: vec![activity],
                notifications: Vec::new(),
            })
            .map_err(map_store_error)?;
        Ok(())
    }

    /// Appends multiple evidence entries atomically, with one shared
    /// timestamp and one `EVIDENCE_BULK_ADDED` activity that names a count
    /// but never a raw URL.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` or `VALIDATION` on malformed input.
    pub fn evidence_bulk(&self, cmd: EvidenceBulkCmd) -> Result<(), GovernanceError> {
        if cmd.links.is_empty() || cmd.links.len() > MAX_EVIDENCE_BULK_ITEMS {
            return Err(GovernanceError::validation(format!(
                "evidence bulk accepts 1..{MAX_EVIDENCE_BULK_ITEMS} links"
            )));
        }
        for link in &cmd.links {
            if link.chars().count() > MAX_EVIDENCE_LINK_LEN {
                return Err(GovernanceError::validation(format!(
                    "evidence link must be at most {MAX_EVIDENCE_LINK_LEN} characters"
                )));
            }
        }
        if let Some(note) = &cmd.note {
            if note.chars().count() > MAX_EVIDENCE_NOTE_LEN {
                return Err(GovernanceError::validation(format!(
                    "evidence note must be at most {MAX_EVIDENCE_NOTE_LEN} characters"
                )));
            }
        }

        let mut task = self.get_task(&cmd.task_id)?;
        let now = time::now_iso8601_ms();
        let count = cmd.links.len();
        for link in cmd.links {
            task.metadata.evidence.push(EvidenceEntry { link, note: cmd.note.clone(), added_at: now.clone() });
        }
        check_metadata_size(&task.metadata)?;

        let expected_version = task.version;
        task.version += 1;
        task.updated_at = now;

        let reason = match &cmd.note {
            Some(note) => format!("{count} links added ({note})"),
            None => format!("{count} links added"),
        };
        let activity = NewActivity {
            action: ActivityAction::EvidenceBulkAdded,
            from_state: None,
            to_state: None,
            actor: cmd.actor,
            reason: Some(reason),
        };
        self.store
            .update_task(TaskMutation {
                task,
                expected_version,
                activities: vec![activity],
                notifications: Vec::new(),
            })
            .map_err(map_store_error)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Docs Updated
    // ------------------------------------------------------------------

    /// Sets the `docsUpdated` metadata flag.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the task does not exist.
    pub fn docs_updated(&self, cmd: DocsUpdatedCmd) -> Result<(), GovernanceError> {
        let mut task = self.get_task(&cmd.task_id)?;
        task.metadata.docs_updated = Some(cmd.docs_updated);
        let expected_version = task.version;
        task.version += 1;
        task.updated_at = time::now_iso8601_ms();

        let activity = NewActivity {
            action: ActivityAction::DocsUpdatedSet,
            from_state: None,
            to_state: None,
            actor: cmd.actor,
            reason: Some(cmd.docs_updated.to_string()),
        };
        self.store
            .update_task(TaskMutation {
                task,
                expected_version,
                activities: vec![activity],
                notifications: Vec::new(),
            })
            .map_err(map_store_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Template defaults for `(gate, assigned_group, dod_checklist)`, applied
/// only to fields the caller left absent on [`CreateTaskCmd`]. Not part of
/// the wire contract; an internal convenience so every task type doesn't
/// need gate/group spelled out on every create call.
fn template_defaults(task_type: TaskType) -> (Gate, &'static str, Vec<String>) {
    match task_type {
        TaskType::Security => {
            (Gate::Security, "security", vec!["Security review complete".to_string()])
        }
        TaskType::Revops => (Gate::RevOps, "revops", vec!["Revops sign-off recorded".to_string()]),
        TaskType::Incident => (Gate::None, "main", vec!["Incident postmortem filed".to_string()]),
        TaskType::Feature
        | TaskType::Bug
        | TaskType::Epic
        | TaskType::Ops
        | TaskType::Research
        | TaskType::Content
        | TaskType::Doc => (Gate::None, "developer", Vec::new()),
    }
}

/// Builds the initial `dodStatus` from a checklist of raw text entries,
/// minting a fresh id for each.
fn build_dod_status(checklist: &[String]) -> Result<Vec<DodItem>, GovernanceError> {
    checklist
        .iter()
        .map(|text| {
            let trimmed = text.trim();
            if trimmed.chars().count() < MIN_DOD_TEXT_LEN || trimmed.chars().count() > MAX_DOD_TEXT_LEN {
                return Err(GovernanceError::validation(format!(
                    "dod item text must be {MIN_DOD_TEXT_LEN}..{MAX_DOD_TEXT_LEN} characters"
                )));
            }
            Ok(DodItem { id: ids::new_dod_id(), text: trimmed.to_string(), done: false })
        })
        .collect()
}

/// Rejects metadata that would serialize past [`MAX_METADATA_BYTES`].
fn check_metadata_size(metadata: &TaskMetadata) -> Result<(), GovernanceError> {
    let len = metadata
        .serialized_len()
        .map_err(|err| GovernanceError::new(ErrorKind::Internal, err.to_string()))?;
    if len > MAX_METADATA_BYTES {
        return Err(GovernanceError::validation(format!(
            "metadata exceeds {MAX_METADATA_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Reads the `evidenceRequired` metadata key, treating anything but an
/// explicit JSON boolean as absent (§4.1 `MISSING_EVIDENCE_REQUIRED`).
fn evidence_required_flag(metadata: &TaskMetadata) -> Option<bool> {
    metadata.extra.get("evidenceRequired").and_then(serde_json::Value::as_bool)
}

/// Translates a [`StoreError`] into the uniform [`GovernanceError`]
/// taxonomy (§7).
fn map_store_error(err: StoreError) -> GovernanceError {
    match err {
        StoreError::TaskNotFound(id) => GovernanceError::task_not_found(&id),
        StoreError::ProductNotFound(id) => {
            GovernanceError::new(ErrorKind::NotFound, format!("product not found: {id}"))
        }
        StoreError::StaleVersion { expected, actual } => GovernanceError::stale_version(expected, actual),
        StoreError::DuplicateTaskId(id) => {
            GovernanceError::new(ErrorKind::Internal, format!("task id collision: {id}"))
        }
        StoreError::Backend(message) => GovernanceError::new(ErrorKind::Internal, message),
    }
}

// ============================================================================
// SECTION: Lenient (IPC-Style) Wrapper
// ============================================================================

/// Adapts an HTTP-style `Result` for a trusted in-process caller: on
/// success returns `Some(value)`; on failure invokes `on_error` (typically
/// an audit-log hook) and returns `None` without propagating the error,
/// preserving crash-safety under adversarial internal callers (§7 "Local
/// recovery").
pub fn apply_lenient<T>(
    result: Result<T, GovernanceError>,
    on_error: impl FnOnce(&GovernanceError),
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            on_error(&err);
            None
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::interfaces::DodItemInput;
    use crate::model::Product;
    use crate::model::Scope;

    #[derive(Default)]
    struct InMemoryStore {
        products: RefCell<HashMap<String, Product>>,
        tasks: RefCell<HashMap<String, Task>>,
        activities: RefCell<Vec<Activity>>,
        approvals: RefCell<HashMap<(String, String), crate::model::Approval>>,
        notifications: RefCell<Vec<crate::model::Notification>>,
        next_activity_id: RefCell<i64>,
        next_notification_id: RefCell<i64>,
    }

    impl InMemoryStore {
        fn append_activities(&self, task_id: &str, items: Vec<NewActivity>) -> Vec<i64> {
            let mut ids = Vec::with_capacity(items.len());
            let mut next = self.next_activity_id.borrow_mut();
            let mut log = self.activities.borrow_mut();
            for item in items {
                *next += 1;
                log.push(Activity {
                    id: *next,
                    task_id: task_id.to_string(),
                    action: item.action,
                    from_state: item.from_state,
                    to_state: item.to_state,
                    actor: item.actor,
                    reason: item.reason,
                    created_at: time::now_iso8601_ms(),
                });
                ids.push(*next);
            }
            ids
        }
    }

    impl GovernanceStore for InMemoryStore {
        fn get_product(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
            Ok(self.products.borrow().get(product_id).cloned())
        }

        fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
            Ok(self.tasks.borrow().get(task_id).cloned())
        }

        fn insert_task(&self, task: &Task, activities: &[NewActivity]) -> Result<Vec<i64>, StoreError> {
            let mut tasks = self.tasks.borrow_mut();
            if tasks.contains_key(&task.id) {
                return Err(StoreError::DuplicateTaskId(task.id.clone()));
            }
            tasks.insert(task.id.clone(), task.clone());
            drop(tasks);
            Ok(self.append_activities(&task.id, activities.to_vec()))
        }

        fn update_task(&self, mutation: TaskMutation) -> Result<Vec<i64>, StoreError> {
            let mut tasks = self.tasks.borrow_mut();
            let current = tasks
                .get(&mutation.task.id)
                .ok_or_else(|| StoreError::TaskNotFound(mutation.task.id.clone()))?;
            if current.version != mutation.expected_version {
                return Err(StoreError::StaleVersion {
                    expected: mutation.expected_version,
                    actual: current.version,
                });
            }
            tasks.insert(mutation.task.id.clone(), mutation.task.clone());
            drop(tasks);
            let ids = self.append_activities(&mutation.task.id, mutation.activities);
            let mut next_n = self.next_notification_id.borrow_mut();
            let mut notifications = self.notifications.borrow_mut();
            for n in mutation.notifications {
                *next_n += 1;
                notifications.push(crate::model::Notification {
                    id: *next_n,
                    task_id: mutation.task.id.clone(),
                    target_group: n.target_group,
                    actor: n.actor,
                    snippet: n.snippet,
                    read: false,
                    created_at: time::now_iso8601_ms(),
                });
            }
            Ok(ids)
        }

        fn list_activities(&self, task_id: &str) -> Result<Vec<Activity>, StoreError> {
            Ok(self
                .activities
                .borrow()
                .iter()
                .filter(|a| a.task_id == task_id)
                .cloned()
                .collect())
        }

        fn get_approval(
            &self,
            task_id: &str,
            gate: Gate,
        ) -> Result<Option<crate::model::Approval>, StoreError> {
            Ok(self.approvals.borrow().get(&(task_id.to_string(), gate.to_string())).cloned())
        }

        fn upsert_approval(
            &self,
            approval: crate::model::Approval,
            activity: NewActivity,
        ) -> Result<i64, StoreError> {
            let key = (approval.task_id.clone(), approval.gate_type.to_string());
            self.approvals.borrow_mut().insert(key, approval.clone());
            let ids = self.append_activities(&approval.task_id, vec![activity]);
            Ok(ids[0])
        }
    }

    fn new_engine() -> GovernanceEngine<InMemoryStore> {
        GovernanceEngine::new(InMemoryStore::default(), false)
    }

    fn create_cmd(actor: &str) -> CreateTaskCmd {
        CreateTaskCmd {
            actor: actor.to_string(),
            title: "Pipeline test".to_string(),
            description: None,
            task_type: TaskType::Feature,
            priority: None,
            scope: Scope::Company,
            product_id: None,
            assigned_group: Some("developer".to_string()),
            executor: None,
            created_by: None,
            gate: Some(Gate::Security),
            dod_required: None,
            dod_checklist: None,
        }
    }

    #[test]
    fn full_pipeline_reaches_done_with_one_approve_activity() {
        let engine = new_engine();
        let created = engine.create_task(create_cmd("main")).expect("create");
        assert_eq!(created.state, TaskState::Inbox);

        for (actor, to) in [
            ("main", TaskState::Triaged),
            ("main", TaskState::Ready),
            ("developer", TaskState::Doing),
        ] {
            engine
                .transition(TransitionCmd {
                    task_id: created.task_id.clone(),
                    to_state: to,
                    reason: None,
                    expected_version: None,
                    actor: actor.to_string(),
                    audit_link_present: false,
                })
                .unwrap_or_else(|err| panic!("transition to {to}: {err}"));
        }
        engine
            .transition(TransitionCmd {
                task_id: created.task_id.clone(),
                to_state: TaskState::Review,
                reason: Some("Done implementing".to_string()),
                expected_version: None,
                actor: "developer".to_string(),
                audit_link_present: false,
            })
            .expect("doing -> review");
        engine
            .transition(TransitionCmd {
                task_id: created.task_id.clone(),
                to_state: TaskState::Approval,
                reason: None,
                expected_version: None,
                actor: "main".to_string(),
                audit_link_present: false,
            })
            .expect("review -> approval");
        engine
            .approve(ApproveCmd {
                task_id: created.task_id.clone(),
                gate_type: Gate::Security,
                notes: None,
                evidence_link: None,
                actor: "security".to_string(),
            })
            .expect("approve");
        engine
            .transition(TransitionCmd {
                task_id: created.task_id.clone(),
                to_state: TaskState::Done,
                reason: None,
                expected_version: None,
                actor: "main".to_string(),
                audit_link_present: false,
            })
            .expect("approval -> done");

        let task = engine.get_task(&created.task_id).expect("task");
        assert_eq!(task.state, TaskState::Done);
        let activities = engine.list_activities(&created.task_id).expect("activities");
        assert!(activities.len() >= 7);
        assert_eq!(
            activities.iter().filter(|a| a.action == ActivityAction::Approve).count(),
            1
        );
    }

    #[test]
    fn separation_of_powers_rejects_executor_approving_own_gate() {
        let engine = new_engine();
        let mut cmd = create_cmd("main");
        cmd.executor = Some("security".to_string());
        let created = engine.create_task(cmd).expect("create");

        let err = engine
            .approve(ApproveCmd {
                task_id: created.task_id.clone(),
                gate_type: Gate::Security,
                notes: None,
                evidence_link: None,
                actor: "security".to_string(),
            })
            .expect_err("executor cannot approve own gate");
        assert_eq!(err.code, Some("FORBIDDEN_executor"));

        engine
            .approve(ApproveCmd {
                task_id: created.task_id,
                gate_type: Gate::Security,
                notes: None,
                evidence_link: None,
                actor: "main".to_string(),
            })
            .expect("main may approve");
    }

    #[test]
    fn stale_expected_version_rejects_without_mutation() {
        let engine = new_engine();
        let created = engine.create_task(create_cmd("main")).expect("create");
        let err = engine
            .transition(TransitionCmd {
                task_id: created.task_id.clone(),
                to_state: TaskState::Triaged,
                reason: None,
                expected_version: Some(99),
                actor: "main".to_string(),
                audit_link_present: false,
            })
            .expect_err("stale version");
        assert_eq!(err.code, Some("STALE_VERSION"));
        let task = engine.get_task(&created.task_id).expect("task");
        assert_eq!(task.state, TaskState::Inbox);
        assert_eq!(task.version, 1);
    }

    #[test]
    fn scope_coercion_logs_system_activity() {
        let engine = new_engine();
        let mut cmd = create_cmd("main");
        cmd.scope = Scope::Product;
        cmd.product_id = None;
        let created = engine.create_task(cmd).expect("create");

        let task = engine.get_task(&created.task_id).expect("task");
        assert_eq!(task.scope, Scope::Company);
        assert_eq!(task.product_id, None);

        let activities = engine.list_activities(&created.task_id).expect("activities");
        let coerce = activities
            .iter()
            .find(|a| a.action == ActivityAction::CoerceScope)
            .expect("coerce_scope activity");
        assert_eq!(coerce.actor, "system");
        assert_eq!(coerce.reason.as_deref(), Some("PRODUCT_SCOPE_WITHOUT_PRODUCT_ID"));
    }

    #[test]
    fn mention_comment_produces_one_notification_per_group() {
        let engine = new_engine();
        let created = engine.create_task(create_cmd("main")).expect("create");
        let result = engine
            .comment(CommentCmd {
                task_id: created.task_id,
                text: "cc @developer and @security please review".to_string(),
                actor: None,
            })
            .expect("comment");
        assert_eq!(result.mentions, vec!["developer".to_string(), "security".to_string()]);
    }

    #[test]
    fn apply_lenient_swallows_errors_and_invokes_hook() {
        let engine = new_engine();
        let logged = RefCell::new(None);
        let outcome = apply_lenient(engine.get_task("gov-missing"), |err| {
            *logged.borrow_mut() = Some(err.code);
        });
        assert!(outcome.is_none());
        assert_eq!(*logged.borrow(), Some(None));
    }

    #[test]
    fn title_exactly_140_chars_accepted_141_rejected() {
        let engine = new_engine();
        let mut at_limit = create_cmd("main");
        at_limit.title = "a".repeat(140);
        assert!(engine.create_task(at_limit).is_ok());

        let mut over_limit = create_cmd("main");
        over_limit.title = "a".repeat(141);
        let err = engine.create_task(over_limit).expect_err("title too long");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn approve_twice_replaces_row_and_each_call_adds_one_activity() {
        let engine = new_engine();
        let created = engine.create_task(create_cmd("main")).expect("create");
        for notes in [None, Some("revised notes".to_string())] {
            engine
                .approve(ApproveCmd {
                    task_id: created.task_id.clone(),
                    gate_type: Gate::Security,
                    notes,
                    evidence_link: None,
                    actor: "security".to_string(),
                })
                .expect("approve");
        }
        let activities = engine.list_activities(&created.task_id).expect("activities");
        assert_eq!(
            activities.iter().filter(|a| a.action == ActivityAction::Approve).count(),
            2
        );
    }

    #[test]
    fn dod_update_is_idempotent_over_same_payload() {
        let engine = new_engine();
        let created = engine.create_task(create_cmd("main")).expect("create");
        let items = vec![
            DodItemInput { id: None, text: "write tests".to_string(), done: true },
            DodItemInput { id: None, text: "ship it".to_string(), done: false },
        ];
        let first = engine
            .dod_update(DodUpdateCmd {
                task_id: created.task_id.clone(),
                items: items.clone(),
                actor: "developer".to_string(),
            })
            .expect("first dod_update");
        let reapplied = items
            .into_iter()
            .zip(first.items.iter())
            .map(|(input, stored)| DodItemInput {
                id: Some(stored.id.clone()),
                text: input.text,
                done: input.done,
            })
            .collect::<Vec<_>>();
        let second = engine
            .dod_update(DodUpdateCmd {
                task_id: created.task_id.clone(),
                items: reapplied,
                actor: "developer".to_string(),
            })
            .expect("second dod_update");
        assert_eq!(first.items, second.items);

        let activities = engine.list_activities(&created.task_id).expect("activities");
        let hashes = activities
            .iter()
            .filter(|a| a.action == ActivityAction::DodUpdated)
            .map(|a| a.reason.clone())
            .collect::<Vec<_>>();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[0], hashes[1]);
    }

    #[test]
    fn evidence_link_and_note_boundary_lengths() {
        let engine = new_engine();
        let created = engine.create_task(create_cmd("main")).expect("create");

        let at_limit = EvidenceCmd {
            task_id: created.task_id.clone(),
            link: "x".repeat(MAX_EVIDENCE_LINK_LEN),
            note: Some("n".repeat(MAX_EVIDENCE_NOTE_LEN)),
            actor: "developer".to_string(),
        };
        engine.evidence(at_limit).expect("exact boundary accepted");

        let over_limit = EvidenceCmd {
            task_id: created.task_id.clone(),
            link: "x".repeat(MAX_EVIDENCE_LINK_LEN + 1),
            note: None,
            actor: "developer".to_string(),
        };
        assert!(engine.evidence(over_limit).is_err());
    }

    #[test]
    fn bulk_evidence_boundary_counts() {
        let engine = new_engine();
        let created = engine.create_task(create_cmd("main")).expect("create");

        let empty = EvidenceBulkCmd {
            task_id: created.task_id.clone(),
            links: Vec::new(),
            note: None,
            actor: "developer".to_string(),
        };
        assert!(engine.evidence_bulk(empty).is_err());

        let at_limit = EvidenceBulkCmd {
            task_id: created.task_id.clone(),
            links: (0..MAX_EVIDENCE_BULK_ITEMS).map(|i| format!("https://example.com/{i}")).collect(),
            note: None,
            actor: "developer".to_string(),
        };
        engine.evidence_bulk(at_limit).expect("20 links accepted");

        let over_limit = EvidenceBulkCmd {
            task_id: created.task_id.clone(),
            links: (0..MAX_EVIDENCE_BULK_ITEMS + 1).map(|i| format!("https://example.com/{i}")).collect(),
            note: None,
            actor: "developer".to_string(),
        };
        assert!(engine.evidence_bulk(over_limit).is_err());
    }
}
