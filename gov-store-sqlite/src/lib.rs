// gov-store-sqlite/src/lib.rs
// ============================================================================
// Crate: gov-store-sqlite
// Description: Durable `GovernanceStore` and `BrokerStore` implementation
//              backed by SQLite.
// Purpose: The only crate in the workspace that depends on `rusqlite`;
//          every other crate talks to storage through the trait seams.
// Dependencies: gov-core, gov-broker, rusqlite, serde_json, thiserror
// ============================================================================

//! # gov-store-sqlite
//!
//! [`store::SqliteStore`] holds one `Mutex<Connection>` (teacher pattern:
//! `decision-gate-store-sqlite::SqliteRunStateStore`) so every governance
//! command and every broker call executes inside exactly one
//! `rusqlite::Transaction`, committed or rolled back as a unit (§5).

pub mod store;

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
