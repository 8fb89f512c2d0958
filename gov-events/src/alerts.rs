// gov-events/src/alerts.rs
// ============================================================================
// Module: Alert Rules
// Description: Worker-offline grace, dispatch-failure threshold, and
//              breaker-open alert rules over the event bus, deduplicated by
//              (ruleName, subject) within a configurable window.
// Purpose: Turn a stream of bus events into at-most-one alert per incident
//          per dedup window, dispatched through an injectable sink so tests
//          can replace the transport with a mock.
// Dependencies: crate::bus, crate::time, std::sync, std::thread
// ============================================================================

//! ## Overview
//! [`AlertEngine`] holds three independent rules:
//!
//! - **worker-offline grace**: an `offline` [`crate::bus::EventTopic::WorkerStatus`]
//!   event schedules a delayed alert after [`AlertConfig::offline_grace`]; a
//!   subsequent `online` event for the same worker before the deadline
//!   cancels it. Implemented with a single background thread parked on a
//!   min-heap of deadlines plus a per-worker epoch counter: rescheduling or
//!   cancelling a worker bumps its epoch, which invalidates any heap entries
//!   already scheduled under the old epoch.
//! - **dispatch-fail sliding window**: a sliding count of `FAILED`
//!   [`crate::bus::EventTopic::DispatchLifecycle`] events per subject; once
//!   the count within [`AlertConfig::dispatch_fail_window`] reaches
//!   [`AlertConfig::dispatch_fail_threshold`], one alert fires and the
//!   window resets for that subject.
//! - **breaker-open immediate**: a [`crate::bus::EventTopic::BreakerState`]
//!   event with `open: true` fires an alert immediately (still subject to
//!   dedup).
//!
//! All three share one dedup cache keyed by `(rule_name, subject)`: a rule
//! that already fired for a subject within [`AlertConfig::dedup_window`]
//! emits nothing on a repeat.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use serde_json::Value;

use crate::bus::EventBus;
use crate::bus::EventTopic;
use crate::time::now_iso8601_ms;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default grace period before a worker's `offline` status fires an alert.
pub const DEFAULT_OFFLINE_GRACE: Duration = Duration::from_secs(120);
/// Default sliding-window length for the dispatch-fail rule.
pub const DEFAULT_DISPATCH_FAIL_WINDOW: Duration = Duration::from_secs(300);
/// Default failure count within the window that triggers an alert.
pub const DEFAULT_DISPATCH_FAIL_THRESHOLD: usize = 5;
/// Default dedup window shared by every rule.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(600);

/// Tunable thresholds for [`AlertEngine`], sourced from `gov-http`'s config
/// module (`WORKER_OFFLINE_GRACE_MS`, `DISPATCH_FAIL_THRESHOLD`, `BREAKER_*`).
#[derive(Debug, Clone, Copy)]
pub struct AlertConfig {
    /// Grace period before an `offline` worker status becomes an alert.
    pub offline_grace: Duration,
    /// Sliding-window length for counting `FAILED` dispatch events.
    pub dispatch_fail_window: Duration,
    /// Failure count within the window that triggers the alert.
    pub dispatch_fail_threshold: usize,
    /// Shared dedup window for all three rules.
    pub dedup_window: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            offline_grace: DEFAULT_OFFLINE_GRACE,
            dispatch_fail_window: DEFAULT_DISPATCH_FAIL_WINDOW,
            dispatch_fail_threshold: DEFAULT_DISPATCH_FAIL_THRESHOLD,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

// ============================================================================
// SECTION: Alert and Sink
// ============================================================================

/// Stable rule name recorded on the worker-offline alert.
pub const RULE_WORKER_OFFLINE: &str = "worker-offline";
/// Stable rule name recorded on the dispatch-fail-threshold alert.
pub const RULE_DISPATCH_FAIL: &str = "dispatch-fail-threshold";
/// Stable rule name recorded on the breaker-open alert.
pub const RULE_BREAKER_OPEN: &str = "breaker-open";

/// One fired alert, handed to an [`AlertSink`].
#[derive(Debug, Clone)]
pub struct Alert {
    /// Which rule fired.
    pub rule_name: &'static str,
    /// The subject the alert concerns (a worker id, dispatcher id, or
    /// breaker name).
    pub subject: String,
    /// Human-readable alert body. Never contains a raw forbidden-key value;
    /// callers must scrub any payload fragment before interpolating it here.
    pub body: String,
    /// UTC ISO-8601 millisecond timestamp the alert fired at.
    pub fired_at: String,
}

/// Error returned by an [`AlertSink`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("alert dispatch failed: {0}")]
pub struct AlertSendError(pub String);

/// Injectable alert transport. Production code wires this to the
/// `ALERT_TELEGRAM_BOT_TOKEN`/`ALERT_TELEGRAM_CHAT_ID` send function; tests
/// replace it with an in-memory recorder.
pub trait AlertSink: Send + Sync {
    /// Delivers one alert. Implementations should not panic on delivery
    /// failure; they return an error instead so the caller can log it.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying transport rejects the alert.
    fn send(&self, alert: &Alert) -> Result<(), AlertSendError>;
}

/// A sink that records every alert it receives, in order. Used by tests and
/// as the default when no alert transport is configured.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Alert>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every alert recorded so far, in firing order.
    #[must_use]
    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl AlertSink for RecordingSink {
    fn send(&self, alert: &Alert) -> Result<(), AlertSendError> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(alert.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Dedup Cache
// ============================================================================

struct DedupCache {
    window: Duration,
    last_fired: Mutex<HashMap<(&'static str, String), Instant>>,
}

impl DedupCache {
    fn new(window: Duration) -> Self {
        Self { window, last_fired: Mutex::new(HashMap::new()) }
    }

    /// Returns true when the rule should fire now, recording the firing.
    fn should_fire(&self, rule: &'static str, subject: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.last_fired.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (rule, subject.to_string());
        match guard.get(&key) {
            Some(last) if now.duration_since(*last) < self.window => false,
            _ => {
                guard.insert(key, now);
                true
            }
        }
    }
}

// ============================================================================
// SECTION: Offline Grace Timer
// ============================================================================

struct OfflineTimerState {
    heap: Mutex<BinaryHeap<Reverse<(Instant, String, u64)>>>,
    epochs: Mutex<HashMap<String, u64>>,
    cv: Condvar,
    shutdown: Mutex<bool>,
}

/// Background-thread-driven scheduler for the worker-offline grace rule.
pub struct OfflineTimer {
    state: Arc<OfflineTimerState>,
    worker: Option<JoinHandle<()>>,
}

impl OfflineTimer {
    fn start(dedup: Arc<DedupCache>, sink: Arc<dyn AlertSink>) -> Self {
        let state = Arc::new(OfflineTimerState {
            heap: Mutex::new(BinaryHeap::new()),
            epochs: Mutex::new(HashMap::new()),
            cv: Condvar::new(),
            shutdown: Mutex::new(false),
        });
        let thread_state = Arc::clone(&state);
        let worker = thread::spawn(move || offline_timer_loop(&thread_state, &dedup, &sink));
        Self { state, worker: Some(worker) }
    }

    /// Schedules an offline alert for `worker_id` to fire after `grace`
    /// unless cancelled first.
    fn schedule(&self, worker_id: &str, grace: Duration) {
        let mut epochs = self.state.epochs.lock().unwrap_or_else(PoisonError::into_inner);
        let epoch = epochs.entry(worker_id.to_string()).or_insert(0);
        *epoch += 1;
        let current = *epoch;
        drop(epochs);
        let deadline = Instant::now() + grace;
        let mut heap = self.state.heap.lock().unwrap_or_else(PoisonError::into_inner);
        heap.push(Reverse((deadline, worker_id.to_string(), current)));
        drop(heap);
        self.state.cv.notify_all();
    }

    /// Cancels any pending offline alert for `worker_id`.
    fn cancel(&self, worker_id: &str) {
        let mut epochs = self.state.epochs.lock().unwrap_or_else(PoisonError::into_inner);
        let epoch = epochs.entry(worker_id.to_string()).or_insert(0);
        *epoch += 1;
        drop(epochs);
        self.state.cv.notify_all();
    }
}

impl Drop for OfflineTimer {
    fn drop(&mut self) {
        if let Ok(mut shutdown) = self.state.shutdown.lock() {
            *shutdown = true;
        }
        self.state.cv.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ignored = worker.join();
        }
    }
}

fn offline_timer_loop(state: &Arc<OfflineTimerState>, dedup: &Arc<DedupCache>, sink: &Arc<dyn AlertSink>) {
    loop {
        let mut heap = state.heap.lock().unwrap_or_else(PoisonError::into_inner);
        if *state.shutdown.lock().unwrap_or_else(PoisonError::into_inner) {
            return;
        }
        let Some(Reverse((deadline, worker_id, epoch))) = heap.peek().cloned() else {
            let guard = state.cv.wait(heap).unwrap_or_else(PoisonError::into_inner);
            drop(guard);
            continue;
        };
        let now = Instant::now();
        if deadline > now {
            let timeout = deadline - now;
            let (guard, _timed_out) =
                state.cv.wait_timeout(heap, timeout).unwrap_or_else(PoisonError::into_inner);
            drop(guard);
            continue;
        }
        heap.pop();
        drop(heap);
        let still_current = {
            let epochs = state.epochs.lock().unwrap_or_else(PoisonError::into_inner);
            epochs.get(&worker_id).copied() == Some(epoch)
        };
        if still_current && dedup.should_fire(RULE_WORKER_OFFLINE, &worker_id) {
            let alert = Alert {
                rule_name: RULE_WORKER_OFFLINE,
                subject: worker_id.clone(),
                body: format!("worker {worker_id} has been offline past its grace period"),
                fired_at: now_iso8601_ms(),
            };
            let _ignored = sink.send(&alert);
        }
    }
}

// ============================================================================
// SECTION: Dispatch-Fail Sliding Window
// ============================================================================

struct FailWindows {
    window: Duration,
    threshold: usize,
    by_subject: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl FailWindows {
    fn new(window: Duration, threshold: usize) -> Self {
        Self { window, threshold, by_subject: Mutex::new(HashMap::new()) }
    }

    /// Records one failure for `subject`; returns true when the count within
    /// the window has just reached the threshold.
    fn record_failure(&self, subject: &str) -> bool {
        let now = Instant::now();
        let mut by_subject = self.by_subject.lock().unwrap_or_else(PoisonError::into_inner);
        let deque = by_subject.entry(subject.to_string()).or_default();
        deque.push_back(now);
        while let Some(front) = deque.front() {
            if now.duration_since(*front) > self.window {
                deque.pop_front();
            } else {
                break;
            }
        }
        if deque.len() >= self.threshold {
            deque.clear();
            true
        } else {
            false
        }
    }
}

// ============================================================================
// SECTION: Alert Engine
// ============================================================================

/// Owns the three alert rules and dispatches fired alerts to an
/// [`AlertSink`].
pub struct AlertEngine {
    sink: Arc<dyn AlertSink>,
    dedup: Arc<DedupCache>,
    offline_timer: OfflineTimer,
    offline_grace: Duration,
    fail_windows: FailWindows,
}

impl AlertEngine {
    /// Builds an alert engine with `config` thresholds, dispatching through
    /// `sink`.
    #[must_use]
    pub fn new(config: AlertConfig, sink: Arc<dyn AlertSink>) -> Self {
        let dedup = Arc::new(DedupCache::new(config.dedup_window));
        let offline_timer = OfflineTimer::start(Arc::clone(&dedup), Arc::clone(&sink));
        Self {
            sink,
            dedup,
            offline_timer,
            offline_grace: config.offline_grace,
            fail_windows: FailWindows::new(config.dispatch_fail_window, config.dispatch_fail_threshold),
        }
    }

    /// Handles a `worker:status` event. `status` is `"online"` or
    /// `"offline"`; any other value is ignored.
    pub fn handle_worker_status(&self, worker_id: &str, status: &str) {
        match status {
            "offline" => self.offline_timer.schedule(worker_id, self.offline_grace),
            "online" => self.offline_timer.cancel(worker_id),
            _ => {}
        }
    }

    /// Handles a `dispatch:lifecycle` event. `status` is matched against
    /// `"FAILED"`; other statuses are ignored by this rule.
    pub fn handle_dispatch_lifecycle(&self, subject: &str, status: &str) {
        if status != "FAILED" {
            return;
        }
        if self.fail_windows.record_failure(subject) && self.dedup.should_fire(RULE_DISPATCH_FAIL, subject) {
            let alert = Alert {
                rule_name: RULE_DISPATCH_FAIL,
                subject: subject.to_string(),
                body: format!("dispatch failures for {subject} reached the alert threshold"),
                fired_at: now_iso8601_ms(),
            };
            let _ignored = self.sink.send(&alert);
        }
    }

    /// Handles a `breaker:state` event. Fires immediately when `open` is
    /// true, subject to dedup.
    pub fn handle_breaker_state(&self, subject: &str, open: bool) {
        if open && self.dedup.should_fire(RULE_BREAKER_OPEN, subject) {
            let alert = Alert {
                rule_name: RULE_BREAKER_OPEN,
                subject: subject.to_string(),
                body: format!("circuit breaker {subject} is open"),
                fired_at: now_iso8601_ms(),
            };
            let _ignored = self.sink.send(&alert);
        }
    }

    /// Spawns a background thread that consumes events from `bus` and
    /// drives the three rules above. The returned handle is joined when
    /// dropped.
    #[must_use]
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let subscription = bus.subscribe_to(vec![
            EventTopic::WorkerStatus,
            EventTopic::DispatchLifecycle,
            EventTopic::BreakerState,
        ]);
        thread::spawn(move || {
            while let Some(event) = subscription.recv() {
                dispatch_event(&engine, event.topic, &event.payload);
            }
        })
    }
}

fn dispatch_event(engine: &AlertEngine, topic: EventTopic, payload: &Value) {
    match topic {
        EventTopic::WorkerStatus => {
            let worker_id = payload.get("workerId").and_then(Value::as_str).unwrap_or_default();
            let status = payload.get("status").and_then(Value::as_str).unwrap_or_default();
            engine.handle_worker_status(worker_id, status);
        }
        EventTopic::DispatchLifecycle => {
            let subject = payload
                .get("dispatcherId")
                .or_else(|| payload.get("taskId"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let status = payload.get("status").and_then(Value::as_str).unwrap_or_default();
            engine.handle_dispatch_lifecycle(subject, status);
        }
        EventTopic::BreakerState => {
            let subject = payload.get("breaker").and_then(Value::as_str).unwrap_or_default();
            let open = payload.get("open").and_then(Value::as_bool).unwrap_or(false);
            engine.handle_breaker_state(subject, open);
        }
        EventTopic::NotificationCreated | EventTopic::ChatMessage => {}
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AlertConfig {
        AlertConfig {
            offline_grace: Duration::from_millis(30),
            dispatch_fail_window: Duration::from_secs(5),
            dispatch_fail_threshold: 3,
            dedup_window: Duration::from_secs(5),
        }
    }

    #[test]
    fn worker_offline_fires_after_grace_period() {
        let sink = Arc::new(RecordingSink::new());
        let engine = AlertEngine::new(test_config(), sink.clone());
        engine.handle_worker_status("w-1", "offline");
        thread::sleep(Duration::from_millis(100));
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].rule_name, RULE_WORKER_OFFLINE);
        assert_eq!(sent[0].subject, "w-1");
    }

    #[test]
    fn worker_online_before_grace_cancels_alert() {
        let sink = Arc::new(RecordingSink::new());
        let engine = AlertEngine::new(test_config(), sink.clone());
        engine.handle_worker_status("w-2", "offline");
        engine.handle_worker_status("w-2", "online");
        thread::sleep(Duration::from_millis(100));
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn dispatch_fail_fires_once_threshold_reached() {
        let sink = Arc::new(RecordingSink::new());
        let engine = AlertEngine::new(test_config(), sink.clone());
        engine.handle_dispatch_lifecycle("dispatcher-a", "FAILED");
        engine.handle_dispatch_lifecycle("dispatcher-a", "FAILED");
        assert!(sink.sent().is_empty());
        engine.handle_dispatch_lifecycle("dispatcher-a", "FAILED");
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].rule_name, RULE_DISPATCH_FAIL);
    }

    #[test]
    fn breaker_open_fires_immediately_and_dedups() {
        let sink = Arc::new(RecordingSink::new());
        let engine = AlertEngine::new(test_config(), sink.clone());
        engine.handle_breaker_state("payments", true);
        engine.handle_breaker_state("payments", true);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].rule_name, RULE_BREAKER_OPEN);
    }

    #[test]
    fn breaker_close_does_not_fire() {
        let sink = Arc::new(RecordingSink::new());
        let engine = AlertEngine::new(test_config(), sink.clone());
        engine.handle_breaker_state("payments", false);
        assert!(sink.sent().is_empty());
    }
}
