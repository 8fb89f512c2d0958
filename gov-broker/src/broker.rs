// gov-broker/src/broker.rs
// ============================================================================
// Module: External-Access Broker
// Description: Runs the seven-step authorization order (§4.3) over a
//              `BrokerStore`, dispatches accepted calls to a
//              `ProviderExecutor`, and persists the full `ExtCall`
//              lifecycle.
// Purpose: Be the single place "may group G call provider P to do action A
//          for task T" is decided and audited, the way
//          `decision-gate-broker::CompositeBroker` is the single place a
//          payload is resolved and delivered.
// Dependencies: gov-core, crate::{capability, errors, executor, sanitize,
//               store}, time
// ============================================================================

//! ## Overview
//! [`ExtBroker::call`] runs, in order: capability lookup → deny-wins →
//! allowed-actions → access-level envelope → task binding → backpressure →
//! rate limit → daily quota → idempotency (§4.3, with the rate-limit/quota
//! steps added per SPEC_FULL §4.3 between backpressure and idempotency).
//! The first failing step wins; everything after idempotency either returns
//! a prior response with no new row, or dispatches to a
//! [`crate::executor::ProviderExecutor`] and records the outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use gov_core::hashing;
use gov_core::model::AccessLevel;
use gov_core::model::ExtCall;
use gov_core::model::ExtCallStatus;
use gov_core::model::TaskState;
use serde_json::Value;
use time::OffsetDateTime;

use crate::capability;
use crate::errors::BrokerError;
use crate::executor::ExecutionRequest;
use crate::executor::ProviderExecutor;
use crate::sanitize::scrub_response;
use crate::sanitize::summarize_params;
use crate::store::BrokerStore;
use crate::store::ExtCallStatusUpdate;
use crate::store::NewExtCall;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Tunable limits enforced by the broker, sourced from `gov-http`'s config
/// module (`EXT_RATE_LIMIT_*`, `EXT_DAILY_QUOTA_*`).
#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    /// Maximum pending (`authorized`/`processing`) calls per group before
    /// `BACKPRESSURE` (§4.3 step 6).
    pub backpressure_limit: usize,
    /// Sliding-window length, in seconds, for the rate-limit check.
    pub rate_limit_window_secs: i64,
    /// Maximum calls per `(group, provider)` within the rate-limit window.
    pub rate_limit_max: usize,
    /// Maximum calls per `(group, provider)` within the current UTC day.
    pub daily_quota_max: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backpressure_limit: 10,
            rate_limit_window_secs: 60,
            rate_limit_max: 30,
            daily_quota_max: 500,
        }
    }
}

// ============================================================================
// SECTION: Call Request
// ============================================================================

/// One external-access call request.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Client-supplied unique request identifier.
    pub request_id: String,
    /// Group making the call.
    pub group_folder: String,
    /// External provider identifier.
    pub provider: String,
    /// Action requested on the provider.
    pub action: String,
    /// Raw call parameters; never persisted (only hashed and summarized).
    pub params: Value,
    /// Governed task this call is bound to.
    pub task_id: String,
    /// Client-supplied idempotency key, if any.
    pub idempotency_key: Option<String>,
}

// ============================================================================
// SECTION: External-Access Broker
// ============================================================================

/// Authorization-and-dispatch broker for external-access calls.
pub struct ExtBroker<S> {
    store: S,
    levels: capability::ProviderActionLevels,
    config: BrokerConfig,
    hmac_secret: Vec<u8>,
    executor: Arc<dyn ProviderExecutor>,
}

impl<S: BrokerStore> ExtBroker<S> {
    /// Builds a broker over `store`, authorizing actions per `levels` and
    /// dispatching accepted calls to `executor`.
    pub fn new(
        store: S,
        levels: capability::ProviderActionLevels,
        config: BrokerConfig,
        hmac_secret: Vec<u8>,
        executor: Arc<dyn ProviderExecutor>,
    ) -> Self {
        Self { store, levels, config, hmac_secret, executor }
    }

    /// Runs the full authorization order for `request`, dispatching to the
    /// executor on success. Returns the resulting [`ExtCall`] row — the
    /// prior `executed` row on an idempotency-key hit, a freshly `denied`
    /// row on any earlier-step failure, or the newly dispatched row.
    ///
    /// # Errors
    ///
    /// Returns the [`BrokerError`] variant of the first authorization-order
    /// step that fails, or [`BrokerError::Store`] on a backend failure.
    pub fn call(&self, request: CallRequest) -> Result<ExtCall, BrokerError> {
        match self.authorize(&request) {
            Ok(AuthOutcome::Idempotent(call)) => Ok(call),
            Ok(AuthOutcome::Proceed { access_level }) => self.dispatch(&request, access_level),
            Err(err) => {
                let denial_reason = err.code().to_string();
                let new_call = self.new_ext_call(&request, AccessLevel::L0);
                self.store
                    .insert_denied_ext_call(new_call, &denial_reason)
                    .map_err(|store_err| BrokerError::Store(store_err.to_string()))?;
                Err(err)
            }
        }
    }

    /// Deletes terminal-status `ExtCall` rows older than `max_age_secs`
    /// seconds (§4.3 cleanup sweep). `processing` rows are never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] on a backend failure.
    pub fn sweep(&self, max_age_secs: i64) -> Result<usize, BrokerError> {
        self.store
            .sweep_terminal_ext_calls(max_age_secs)
            .map_err(|err| BrokerError::Store(err.to_string()))
    }

    // ------------------------------------------------------------------
    // Authorization order
    // ------------------------------------------------------------------

    fn authorize(&self, request: &CallRequest) -> Result<AuthOutcome, BrokerError> {
        let now = OffsetDateTime::now_utc();

        // Step 1: capability lookup.
        let capability = self
            .store
            .get_capability(&request.group_folder, &request.provider)
            .map_err(|err| BrokerError::Store(err.to_string()))?;
        let capability = capability::check_capability_active(
            capability.as_ref(),
            &request.group_folder,
            &request.provider,
            now,
        )?;

        // Step 2: deny-wins.
        capability::check_deny_wins(capability, &request.action)?;

        // Step 3: allowed_actions.
        capability::check_allowed_actions(capability, &request.action)?;

        // Step 4: access-level envelope.
        let required = self.levels.required_level(&request.provider, &request.action);
        capability::check_access_level(capability, &request.action, required)?;

        // Step 5: task binding.
        let binding = self
            .store
            .get_task_binding(&request.task_id)
            .map_err(|err| BrokerError::Store(err.to_string()))?
            .ok_or_else(|| BrokerError::TaskBindingInvalid(format!("task not found: {}", request.task_id)))?;
        if !matches!(binding.state, TaskState::Doing | TaskState::Approval) {
            return Err(BrokerError::TaskBindingInvalid(format!(
                "task {} is in state {}, not DOING or APPROVAL",
                request.task_id, binding.state
            )));
        }
        if request.group_folder != "main" && binding.assigned_group != request.group_folder {
            return Err(BrokerError::TaskBindingInvalid(format!(
                "task {} is assigned to {}, not {}",
                request.task_id, binding.assigned_group, request.group_folder
            )));
        }

        // Step 6: backpressure.
        let pending = self
            .store
            .count_pending_ext_calls(&request.group_folder)
            .map_err(|err| BrokerError::Store(err.to_string()))?;
        if pending >= self.config.backpressure_limit {
            return Err(BrokerError::Backpressure(request.group_folder.clone()));
        }

        // Step 6.5 [ADDED]: rate limit.
        let recent = self
            .store
            .count_recent_ext_calls(&request.group_folder, &request.provider, self.config.rate_limit_window_secs)
            .map_err(|err| BrokerError::Store(err.to_string()))?;
        if recent >= self.config.rate_limit_max {
            return Err(BrokerError::RateLimited {
                group: request.group_folder.clone(),
                provider: request.provider.clone(),
            });
        }

        // Step 6.6 [ADDED]: daily quota.
        let today = self
            .store
            .count_calls_today(&request.group_folder, &request.provider)
            .map_err(|err| BrokerError::Store(err.to_string()))?;
        if today >= self.config.daily_quota_max {
            return Err(BrokerError::QuotaExceeded {
                group: request.group_folder.clone(),
                provider: request.provider.clone(),
            });
        }

        // Step 7: idempotency.
        if let Some(key) = &request.idempotency_key {
            let prior = self
                .store
                .find_executed_by_idempotency_key(key, &request.provider, &request.action)
                .map_err(|err| BrokerError::Store(err.to_string()))?;
            if let Some(prior) = prior {
                return Ok(AuthOutcome::Idempotent(prior));
            }
        }

        Ok(AuthOutcome::Proceed { access_level: capability.access_level })
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn dispatch(&self, request: &CallRequest, access_level: AccessLevel) -> Result<ExtCall, BrokerError> {
        let new_call = self.new_ext_call(request, access_level);
        let authorized = self.store.insert_ext_call(new_call).map_err(|err| BrokerError::Store(err.to_string()))?;

        self.store
            .update_ext_call_status(
                &authorized.request_id,
                ExtCallStatusUpdate {
                    status: ExtCallStatus::Processing,
                    denial_reason: None,
                    result_summary: None,
                    response_data: None,
                    duration_ms: None,
                },
            )
            .map_err(|err| BrokerError::Store(err.to_string()))?;

        let exec_request = ExecutionRequest {
            request_id: &authorized.request_id,
            provider: &request.provider,
            action: &request.action,
            params: &request.params,
        };
        let outcome = self
            .executor
            .execute(&exec_request)
            .map_err(|err| BrokerError::Store(err.0))?;

        let response_data = outcome
            .response_data
            .as_ref()
            .map(scrub_response)
            .map(|scrubbed| scrubbed.to_string());

        self.store
            .update_ext_call_status(
                &authorized.request_id,
                ExtCallStatusUpdate {
                    status: outcome.status,
                    denial_reason: None,
                    result_summary: outcome.result_summary,
                    response_data,
                    duration_ms: Some(outcome.duration_ms),
                },
            )
            .map_err(|err| BrokerError::Store(err.to_string()))
    }

    fn new_ext_call(&self, request: &CallRequest, access_level: AccessLevel) -> NewExtCall {
        let canonical = canonicalize(&request.params);
        let params_hmac = hashing::hmac_hex(&self.hmac_secret, canonical.as_bytes()).unwrap_or_default();
        NewExtCall {
            request_id: request.request_id.clone(),
            group_folder: request.group_folder.clone(),
            provider: request.provider.clone(),
            action: request.action.clone(),
            access_level,
            params_hmac,
            params_summary: summarize_params(&request.params),
            task_id: request.task_id.clone(),
            product_id: None,
            idempotency_key: request.idempotency_key.clone(),
        }
    }
}

/// Serializes `value` with keys in stable (`BTreeMap`) order — `serde_json`
/// sorts object keys by default when the `preserve_order` feature is not
/// enabled, so this is just a named entry point for "the canonical form",
/// not an extra sorting pass.
fn canonicalize(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

enum AuthOutcome {
    Idempotent(ExtCall),
    Proceed { access_level: AccessLevel },
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use gov_core::model::Capability;

    use super::*;
    use crate::executor::ExecutorOutcome;
    use crate::store::BrokerStoreError;
    use crate::store::TaskBinding;

    #[derive(Default)]
    struct FakeStore {
        capabilities: Mutex<HashMap<(String, String), Capability>>,
        bindings: Mutex<HashMap<String, TaskBinding>>,
        calls: Mutex<Vec<ExtCall>>,
        pending_override: Mutex<Option<usize>>,
        next_id: Mutex<i64>,
    }

    impl BrokerStore for FakeStore {
        fn get_capability(&self, group: &str, provider: &str) -> Result<Option<Capability>, BrokerStoreError> {
            Ok(self.capabilities.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
                .get(&(group.to_string(), provider.to_string())).cloned())
        }

        fn count_capability_approvals(&self, _group: &str, _provider: &str) -> Result<usize, BrokerStoreError> {
            Ok(2)
        }

        fn get_task_binding(&self, task_id: &str) -> Result<Option<TaskBinding>, BrokerStoreError> {
            Ok(self.bindings.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(task_id).cloned())
        }

        fn count_pending_ext_calls(&self, _group: &str) -> Result<usize, BrokerStoreError> {
            Ok(self.pending_override.lock().unwrap_or_else(std::sync::PoisonError::into_inner).unwrap_or(0))
        }

        fn count_recent_ext_calls(&self, _group: &str, _provider: &str, _window_secs: i64) -> Result<usize, BrokerStoreError> {
            Ok(0)
        }

        fn count_calls_today(&self, _group: &str, _provider: &str) -> Result<usize, BrokerStoreError> {
            Ok(0)
        }

        fn find_executed_by_idempotency_key(
            &self,
            idempotency_key: &str,
            provider: &str,
            action: &str,
        ) -> Result<Option<ExtCall>, BrokerStoreError> {
            Ok(self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().find(|call| {
                call.idempotency_key.as_deref() == Some(idempotency_key)
                    && call.provider == provider
                    && call.action == action
                    && call.status == ExtCallStatus::Executed
            }).cloned())
        }

        fn insert_ext_call(&self, call: NewExtCall) -> Result<ExtCall, BrokerStoreError> {
            let mut next_id = self.next_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *next_id += 1;
            let row = ExtCall {
                id: *next_id,
                request_id: call.request_id,
                group_folder: call.group_folder,
                provider: call.provider,
                action: call.action,
                access_level: call.access_level,
                params_hmac: call.params_hmac,
                params_summary: call.params_summary,
                status: ExtCallStatus::Authorized,
                denial_reason: None,
                result_summary: None,
                response_data: None,
                task_id: call.task_id,
                product_id: call.product_id,
                idempotency_key: call.idempotency_key,
                duration_ms: None,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            };
            self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(row.clone());
            Ok(row)
        }

        fn insert_denied_ext_call(&self, call: NewExtCall, denial_reason: &str) -> Result<ExtCall, BrokerStoreError> {
            let mut row = self.insert_ext_call(call)?;
            row.status = ExtCallStatus::Denied;
            row.denial_reason = Some(denial_reason.to_string());
            let mut calls = self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(last) = calls.last_mut() {
                *last = row.clone();
            }
            Ok(row)
        }

        fn update_ext_call_status(&self, request_id: &str, update: ExtCallStatusUpdate) -> Result<ExtCall, BrokerStoreError> {
            let mut calls = self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let row = calls.iter_mut().find(|call| call.request_id == request_id)
                .ok_or_else(|| BrokerStoreError::Backend("missing".to_string()))?;
            row.status = update.status;
            row.denial_reason = update.denial_reason;
            row.result_summary = update.result_summary;
            row.response_data = update.response_data;
            row.duration_ms = update.duration_ms;
            Ok(row.clone())
        }

        fn sweep_terminal_ext_calls(&self, _max_age_secs: i64) -> Result<usize, BrokerStoreError> {
            Ok(0)
        }
    }

    struct StubExecutor;
    impl ProviderExecutor for StubExecutor {
        fn execute(&self, _request: &ExecutionRequest<'_>) -> Result<ExecutorOutcome, crate::errors::ExecutorError> {
            Ok(ExecutorOutcome::executed("ok", Some(serde_json::json!({"apiToken": "x", "id": 1})), 12))
        }
    }

    fn capability(access_level: AccessLevel) -> Capability {
        Capability {
            group_folder: "developer".to_string(),
            provider: "github".to_string(),
            access_level,
            allowed_actions: Vec::new(),
            denied_actions: Vec::new(),
            granted_by: "main".to_string(),
            granted_at: "2026-01-01T00:00:00.000Z".to_string(),
            expires_at: None,
            active: true,
        }
    }

    fn broker(store: FakeStore) -> ExtBroker<FakeStore> {
        ExtBroker::new(
            store,
            capability::ProviderActionLevels::new(),
            BrokerConfig::default(),
            b"hmac-secret".to_vec(),
            Arc::new(StubExecutor),
        )
    }

    fn request() -> CallRequest {
        CallRequest {
            request_id: "req-1".to_string(),
            group_folder: "developer".to_string(),
            provider: "github".to_string(),
            action: "read".to_string(),
            params: serde_json::json!({"repo": "gov"}),
            task_id: "gov-task".to_string(),
            idempotency_key: None,
        }
    }

    #[test]
    fn missing_capability_is_denied_and_recorded() {
        let store = FakeStore::default();
        let err = broker(store).call(request()).expect_err("denied");
        assert_eq!(err.code(), "NO_CAPABILITY");
    }

    #[test]
    fn call_with_bound_task_executes_and_scrubs_response() {
        let store = FakeStore::default();
        store.capabilities.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(("developer".to_string(), "github".to_string()), capability(AccessLevel::L1));
        store.bindings.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(
            "gov-task".to_string(),
            TaskBinding { state: TaskState::Doing, assigned_group: "developer".to_string(), product_id: None },
        );
        let call = broker(store).call(request()).expect("executed");
        assert_eq!(call.status, ExtCallStatus::Executed);
        let response = call.response_data.expect("response present");
        assert!(response.contains("[redacted]"));
        assert!(!response.contains("\"x\""));
    }

    #[test]
    fn wrong_group_binding_is_task_binding_invalid() {
        let store = FakeStore::default();
        store.capabilities.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(("developer".to_string(), "github".to_string()), capability(AccessLevel::L1));
        store.bindings.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(
            "gov-task".to_string(),
            TaskBinding { state: TaskState::Doing, assigned_group: "security".to_string(), product_id: None },
        );
        let err = broker(store).call(request()).expect_err("denied");
        assert_eq!(err.code(), "TASK_BINDING_INVALID");
    }

    #[test]
    fn backpressure_limit_denies_before_dispatch() {
        let store = FakeStore::default();
        store.capabilities.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(("developer".to_string(), "github".to_string()), capability(AccessLevel::L1));
        store.bindings.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(
            "gov-task".to_string(),
            TaskBinding { state: TaskState::Doing, assigned_group: "developer".to_string(), product_id: None },
        );
        *store.pending_override.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(999);
        let err = broker(store).call(request()).expect_err("denied");
        assert_eq!(err.code(), "BACKPRESSURE");
    }

    #[test]
    fn idempotency_key_returns_prior_executed_call_without_new_dispatch() {
        let store = FakeStore::default();
        store.capabilities.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(("developer".to_string(), "github".to_string()), capability(AccessLevel::L1));
        store.bindings.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(
            "gov-task".to_string(),
            TaskBinding { state: TaskState::Doing, assigned_group: "developer".to_string(), product_id: None },
        );
        let broker = broker(store);
        let mut first_request = request();
        first_request.idempotency_key = Some("idem-1".to_string());
        let first = broker.call(first_request.clone()).expect("executed");
        assert_eq!(first.status, ExtCallStatus::Executed);

        let mut second_request = first_request;
        second_request.request_id = "req-2".to_string();
        let second = broker.call(second_request).expect("idempotent hit");
        assert_eq!(second.request_id, first.request_id);
        assert_eq!(broker.store.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len(), 1);
    }
}
