// gov-events/src/lib.rs
// ============================================================================
// Crate: gov-events
// Description: In-process event bus and alert rules for the governance core.
// Purpose: Fan out committed-state events to subscribers and raise
//          deduplicated alerts for worker-offline, dispatch-failure, and
//          breaker-open conditions.
// Dependencies: regex, serde_json, thiserror, time
// ============================================================================

//! # gov-events
//!
//! This crate is deliberately free of any async runtime: the event bus is
//! built on `std::sync::mpsc` bounded queues and the alert timers run on a
//! single `std::thread`. Only `gov-http`, the outermost crate, depends on
//! `tokio`; everything below it — including this crate — stays synchronous,
//! mirroring the teacher's `decision-gate-core` posture.
//!
//! - [`bus`] is the typed publish/subscribe bus.
//! - [`scrub`] is the forbidden-key redaction applied to every published
//!   payload, and shared with `gov-broker`'s sanitized-response scrubbing.
//! - [`alerts`] holds the three alert rules and their dedup cache.

pub mod alerts;
pub mod bus;
pub mod scrub;
mod telegram;
mod time;

pub use alerts::Alert;
pub use alerts::AlertConfig;
pub use alerts::AlertEngine;
pub use alerts::AlertSendError;
pub use alerts::AlertSink;
pub use alerts::RecordingSink;
pub use bus::Event;
pub use bus::EventBus;
pub use bus::EventTopic;
pub use bus::Subscription;
pub use scrub::scrub_value;
pub use telegram::TelegramAlertSink;
