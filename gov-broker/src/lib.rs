// gov-broker/src/lib.rs
// ============================================================================
// Crate: gov-broker
// Description: Capability-gated external-access broker: authorization
//              order, idempotency, backpressure/rate/quota, and the
//              `ExtCall` audit lifecycle.
// Purpose: Be the single choke point every outbound call to an external
//          provider passes through on behalf of a governed task.
// Dependencies: gov-core, hmac, sha2, regex, thiserror, time
// ============================================================================

//! # gov-broker
//!
//! [`broker::ExtBroker`] runs the seven-step authorization order (§4.3) over
//! a pluggable [`store::BrokerStore`], dispatches accepted calls to a
//! pluggable [`executor::ProviderExecutor`], and never persists a raw
//! parameter value — only an HMAC and a type/length summary
//! ([`sanitize::summarize_params`]).

pub mod broker;
pub mod capability;
pub mod errors;
pub mod executor;
pub mod sanitize;
pub mod store;

pub use broker::BrokerConfig;
pub use broker::CallRequest;
pub use broker::ExtBroker;
pub use capability::ProviderActionLevels;
pub use errors::BrokerError;
pub use errors::ExecutorError;
pub use executor::ExecutionRequest;
pub use executor::ExecutorOutcome;
pub use executor::NoopExecutor;
pub use executor::ProviderExecutor;
pub use store::BrokerStore;
pub use store::BrokerStoreError;
pub use store::ExtCallStatusUpdate;
pub use store::NewExtCall;
pub use store::TaskBinding;
