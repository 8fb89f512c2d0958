// gov-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Governance Store
// Description: Schema DDL, connection/pragma setup, and the
//              `GovernanceStore`/`BrokerStore` trait implementations plus
//              the admin-only reads/writes (products, capabilities,
//              topics, messages, notifications) the HTTP and CLI layers
//              need beyond those two trait seams.
// Purpose: Be the single writer every governance/broker mutation passes
//          through, one transaction per command (§5).
// Dependencies: gov-core, gov-broker, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteStore`] wraps one `Mutex<rusqlite::Connection>` in WAL mode with
//! foreign keys enforced. Every [`gov_core::GovernanceStore`] write method
//! and every [`gov_broker::BrokerStore`] write method opens exactly one
//! `rusqlite::Transaction`, matching §5's "a command... executes inside ONE
//! transaction" requirement. Reads take a short-lived lock on the same
//! connection and see whatever was last committed (SQLite WAL readers never
//! observe another transaction's uncommitted writes).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use gov_broker::BrokerStore;
use gov_broker::BrokerStoreError;
use gov_broker::ExtCallStatusUpdate;
use gov_broker::NewExtCall;
use gov_broker::TaskBinding;
use gov_core::interfaces::GovernanceStore;
use gov_core::interfaces::NewActivity;
use gov_core::interfaces::StoreError;
use gov_core::interfaces::TaskMutation;
use gov_core::model::AccessLevel;
use gov_core::model::Activity;
use gov_core::model::ActivityAction;
use gov_core::model::Approval;
use gov_core::model::Capability;
use gov_core::model::Gate;
use gov_core::model::ExtCall;
use gov_core::model::ExtCallStatus;
use gov_core::model::Message;
use gov_core::model::Notification;
use gov_core::model::Product;
use gov_core::model::ProductStatus;
use gov_core::model::RiskLevel;
use gov_core::model::Task;
use gov_core::model::TaskState;
use gov_core::model::Topic;
use gov_core::model::TopicStatus;
use gov_core::metadata::TaskMetadata;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version pragma, bumped whenever `initialize_schema` changes shape.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout applied to the connection.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config and Errors
// ============================================================================

/// Configuration for [`SqliteStore::open`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Builds a config pointing at `path` with the default busy timeout.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS }
    }
}

/// Errors produced by [`SqliteStore`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Underlying `SQLite` failure.
    #[error("sqlite failure: {0}")]
    Db(String),
    /// JSON (de)serialization failure of a stored column.
    #[error("serialization failure: {0}")]
    Serde(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<SqliteStoreError> for BrokerStoreError {
    fn from(err: SqliteStoreError) -> Self {
        Self::Backend(err.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed governance and broker store.
///
/// Cheaply [`Clone`]: the underlying connection is shared behind an `Arc`,
/// the way `gov-http` shares one store across axum handlers.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared handle to the single underlying `SQLite` connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if absent) the database at `config.path`, applies
    /// pragmas, and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let connection = open_connection(config)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    /// Opens an in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let mut connection = Connection::open_in_memory().map_err(db_err)?;
        connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    /// Locks the shared connection, recovering from poisoning rather than
    /// propagating it — a panic in one handler must not wedge every other.
    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Admin: products
    // ------------------------------------------------------------------

    /// Inserts or updates a product by `id`, preserving `created_at` across
    /// upserts (§3 "Upsert on `id` preserves `created_at`").
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn upsert_product(
        &self,
        id: &str,
        name: &str,
        status: ProductStatus,
        risk_level: RiskLevel,
        now: &str,
    ) -> Result<Product, SqliteStoreError> {
        let conn = self.lock();
        let existing_created_at: Option<String> = conn
            .query_row("SELECT created_at FROM products WHERE id = ?1", params![id], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        let created_at = existing_created_at.unwrap_or_else(|| now.to_string());
        conn.execute(
            "INSERT INTO products (id, name, status, risk_level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                risk_level = excluded.risk_level,
                updated_at = excluded.updated_at",
            params![id, name, enum_text(&status)?, enum_text(&risk_level)?, created_at, now],
        )
        .map_err(db_err)?;
        Ok(Product {
            id: id.to_string(),
            name: name.to_string(),
            status,
            risk_level,
            created_at,
            updated_at: now.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Admin: capabilities
    // ------------------------------------------------------------------

    /// Grants (or re-grants/reactivates) a capability.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn grant_capability(&self, capability: &Capability) -> Result<(), SqliteStoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO capabilities
                (group_folder, provider, access_level, allowed_actions, denied_actions,
                 granted_by, granted_at, expires_at, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)
             ON CONFLICT(group_folder, provider) DO UPDATE SET
                access_level = excluded.access_level,
                allowed_actions = excluded.allowed_actions,
                denied_actions = excluded.denied_actions,
                granted_by = excluded.granted_by,
                granted_at = excluded.granted_at,
                expires_at = excluded.expires_at,
                active = 1",
            params![
                capability.group_folder,
                capability.provider,
                i64::from(capability.access_level.as_u8()),
                to_json(&capability.allowed_actions)?,
                to_json(&capability.denied_actions)?,
                capability.granted_by,
                capability.granted_at,
                capability.expires_at,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Revokes a capability by setting `active = 0`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn revoke_capability(&self, group: &str, provider: &str) -> Result<(), SqliteStoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE capabilities SET active = 0 WHERE group_folder = ?1 AND provider = ?2",
            params![group, provider],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Records one capability approval (§3 L3 "two prior approvals from
    /// distinct groups"), distinct from task gate [`Approval`] rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn record_capability_approval(
        &self,
        group: &str,
        provider: &str,
        approved_by: &str,
        now: &str,
    ) -> Result<(), SqliteStoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO capability_approvals (group_folder, provider, approved_by, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![group, provider, approved_by, now],
        )
        .map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Admin: topics and messages
    // ------------------------------------------------------------------

    /// Creates a new chat topic.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn create_topic(&self, topic: &Topic) -> Result<(), SqliteStoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO topics (id, group_folder, title, status, created_at, last_activity, group_jid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                topic.id,
                topic.group_folder,
                topic.title,
                enum_text(&topic.status)?,
                topic.created_at,
                topic.last_activity,
                topic.group_jid,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Lists topics for `group`, newest activity first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn list_topics(&self, group: &str) -> Result<Vec<Topic>, SqliteStoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, group_folder, title, status, created_at, last_activity, group_jid
                 FROM topics WHERE group_folder = ?1 ORDER BY last_activity DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![group], row_to_topic)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows.into_iter().map(|row| row.map_err(SqliteStoreError::Serde)).collect()
    }

    /// Inserts a chat message and bumps its topic's `last_activity`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn insert_message(&self, message: &Message, now: &str) -> Result<i64, SqliteStoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO messages (group_folder, actor, text, timestamp, task_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![message.group_folder, message.actor, message.text, message.timestamp, message.task_id],
        )
        .map_err(db_err)?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE topics SET last_activity = ?1 WHERE group_folder = ?2",
            params![now, message.group_folder],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(id)
    }

    /// Lists messages with `id < before` (if given), ascending by
    /// `timestamp` then `id`, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn list_messages(&self, limit: i64, before: Option<i64>) -> Result<Vec<Message>, SqliteStoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, group_folder, actor, text, timestamp, task_id FROM messages
                 WHERE (?1 IS NULL OR id < ?1)
                 ORDER BY timestamp ASC, id ASC LIMIT ?2",
            )
            .map_err(db_err)?;
        stmt.query_map(params![before, limit], row_to_message)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)
    }

    // ------------------------------------------------------------------
    // Admin: notifications
    // ------------------------------------------------------------------

    /// Lists notifications for `target_group`, optionally unread-only,
    /// newest first, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn list_notifications(
        &self,
        target_group: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, SqliteStoreError> {
        let conn = self.lock();
        let sql = if unread_only {
            "SELECT id, task_id, target_group, actor, snippet, read, created_at FROM notifications
             WHERE target_group = ?1 AND read = 0 ORDER BY id DESC LIMIT ?2"
        } else {
            "SELECT id, task_id, target_group, actor, snippet, read, created_at FROM notifications
             WHERE target_group = ?1 ORDER BY id DESC LIMIT ?2"
        };
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        stmt.query_map(params![target_group, limit], row_to_notification)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)
    }

    /// Marks the given notification ids read; returns how many rows were
    /// actually flipped from unread to read.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn mark_notifications_read(&self, ids: &[i64]) -> Result<usize, SqliteStoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let mut marked = 0usize;
        for id in ids {
            let changed = tx
                .execute("UPDATE notifications SET read = 1 WHERE id = ?1 AND read = 0", params![id])
                .map_err(db_err)?;
            marked += changed;
        }
        tx.commit().map_err(db_err)?;
        Ok(marked)
    }

    /// Counts unread notifications for `target_group`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on a backend failure.
    pub fn count_unread(&self, target_group: &str) -> Result<i64, SqliteStoreError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE target_group = ?1 AND read = 0",
            params![target_group],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    // ------------------------------------------------------------------
    // Admin: backup source path
    // ------------------------------------------------------------------

    /// Returns the filesystem path backing this store, if it is file-backed
    /// (not `:memory:`), for `gov-cli backup` to archive the store
    /// directory.
    #[must_use]
    pub fn db_path(&self) -> Option<PathBuf> {
        self.lock().path().map(PathBuf::from)
    }
}

// ============================================================================
// SECTION: GovernanceStore Implementation
// ============================================================================

impl GovernanceStore for SqliteStore {
    fn get_product(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, name, status, risk_level, created_at, updated_at FROM products WHERE id = ?1",
                params![product_id],
                row_to_product,
            )
            .optional()
            .map_err(db_err)?;
        row.transpose().map_err(|err| StoreError::Backend(err))
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(TASK_SELECT_BY_ID, params![task_id], row_to_task)
            .optional()
            .map_err(db_err)?;
        row.transpose().map_err(StoreError::Backend)
    }

    fn insert_task(&self, task: &Task, activities: &[NewActivity]) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let existing: Option<i64> =
            tx.query_row("SELECT 1 FROM tasks WHERE id = ?1", params![task.id], |row| row.get(0))
                .optional()
                .map_err(db_err)?;
        if existing.is_some() {
            return Err(StoreError::DuplicateTaskId(task.id.clone()));
        }
        insert_task_row(&tx, task).map_err(|err| StoreError::Backend(err.to_string()))?;
        let ids = activities
            .iter()
            .map(|activity| insert_activity_row(&tx, &task.id, activity))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        tx.commit().map_err(db_err)?;
        Ok(ids)
    }

    fn update_task(&self, mutation: TaskMutation) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let current_version: Option<i64> = tx
            .query_row("SELECT version FROM tasks WHERE id = ?1", params![mutation.task.id], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        let Some(current_version) = current_version else {
            return Err(StoreError::TaskNotFound(mutation.task.id.clone()));
        };
        if current_version != mutation.expected_version {
            return Err(StoreError::StaleVersion { expected: mutation.expected_version, actual: current_version });
        }
        update_task_row(&tx, &mutation.task).map_err(|err| StoreError::Backend(err.to_string()))?;
        let mut ids = mutation
            .activities
            .iter()
            .map(|activity| insert_activity_row(&tx, &mutation.task.id, activity))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        for notification in &mutation.notifications {
            let id = insert_notification_row(&tx, &mutation.task.id, notification)
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            ids.push(id);
        }
        tx.commit().map_err(db_err)?;
        Ok(ids)
    }

    fn list_activities(&self, task_id: &str) -> Result<Vec<Activity>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, task_id, action, from_state, to_state, actor, reason, created_at
                 FROM activities WHERE task_id = ?1 ORDER BY id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![task_id], row_to_activity)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows.into_iter().collect::<Result<Vec<_>, _>>().map_err(StoreError::Backend)
    }

    fn get_approval(&self, task_id: &str, gate: Gate) -> Result<Option<Approval>, StoreError> {
        let conn = self.lock();
        let gate_text = enum_text(&gate).map_err(|err| StoreError::Backend(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT task_id, gate_type, approved_by, notes, evidence_link, created_at
                 FROM approvals WHERE task_id = ?1 AND gate_type = ?2",
                params![task_id, gate_text],
                row_to_approval,
            )
            .optional()
            .map_err(db_err)?;
        row.transpose().map_err(StoreError::Backend)
    }

    fn upsert_approval(&self, approval: Approval, activity: NewActivity) -> Result<i64, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let gate_text = enum_text(&approval.gate_type).map_err(|err| StoreError::Backend(err.to_string()))?;
        tx.execute(
            "INSERT INTO approvals (task_id, gate_type, approved_by, notes, evidence_link, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(task_id, gate_type) DO UPDATE SET
                approved_by = excluded.approved_by,
                notes = excluded.notes,
                evidence_link = excluded.evidence_link,
                created_at = excluded.created_at",
            params![approval.task_id, gate_text, approval.approved_by, approval.notes, approval.evidence_link, approval.created_at],
        )
        .map_err(db_err)?;
        let id = insert_activity_row(&tx, &approval.task_id, &activity)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        tx.commit().map_err(db_err)?;
        Ok(id)
    }
}

/// Column list shared by every `tasks` row fetch; keep in sync with `row_to_task`'s indices.
const TASK_SELECT_BY_ID: &str = "SELECT id, title, description, task_type, state, priority, scope, product_id,
     assigned_group, executor, created_by, gate, dod_required, override_by, override_reason,
     override_accepted_risk, override_review_deadline, metadata_json, version, created_at, updated_at
     FROM tasks WHERE id = ?1";

// ============================================================================
// SECTION: BrokerStore Implementation
// ============================================================================

impl BrokerStore for SqliteStore {
    fn get_capability(&self, group: &str, provider: &str) -> Result<Option<Capability>, BrokerStoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT group_folder, provider, access_level, allowed_actions, denied_actions,
                        granted_by, granted_at, expires_at, active
                 FROM capabilities WHERE group_folder = ?1 AND provider = ?2",
                params![group, provider],
                row_to_capability,
            )
            .optional()
            .map_err(broker_db_err)?;
        row.transpose().map_err(BrokerStoreError::Backend)
    }

    fn count_capability_approvals(&self, group: &str, provider: &str) -> Result<usize, BrokerStoreError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT approved_by) FROM capability_approvals WHERE group_folder = ?1 AND provider = ?2",
                params![group, provider],
                |row| row.get(0),
            )
            .map_err(broker_db_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn get_task_binding(&self, task_id: &str) -> Result<Option<TaskBinding>, BrokerStoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT state, assigned_group, product_id FROM tasks WHERE id = ?1",
                params![task_id],
                |row| {
                    let state_text: String = row.get(0)?;
                    let assigned_group: String = row.get(1)?;
                    let product_id: Option<String> = row.get(2)?;
                    Ok((state_text, assigned_group, product_id))
                },
            )
            .optional()
            .map_err(broker_db_err)?;
        let Some((state_text, assigned_group, product_id)) = row else { return Ok(None) };
        let state: TaskState =
            text_to_enum(&state_text).map_err(|err| BrokerStoreError::Backend(err.to_string()))?;
        Ok(Some(TaskBinding { state, assigned_group, product_id }))
    }

    fn count_pending_ext_calls(&self, group: &str) -> Result<usize, BrokerStoreError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ext_calls WHERE group_folder = ?1 AND status IN ('authorized', 'processing')",
                params![group],
                |row| row.get(0),
            )
            .map_err(broker_db_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn count_recent_ext_calls(&self, group: &str, provider: &str, window_secs: i64) -> Result<usize, BrokerStoreError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ext_calls WHERE group_folder = ?1 AND provider = ?2
                 AND created_at >= datetime('now', printf('-%d seconds', ?3))",
                params![group, provider, window_secs],
                |row| row.get(0),
            )
            .map_err(broker_db_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn count_calls_today(&self, group: &str, provider: &str) -> Result<usize, BrokerStoreError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ext_calls WHERE group_folder = ?1 AND provider = ?2
                 AND substr(created_at, 1, 10) = strftime('%Y-%m-%d', 'now')",
                params![group, provider],
                |row| row.get(0),
            )
            .map_err(broker_db_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn find_executed_by_idempotency_key(
        &self,
        idempotency_key: &str,
        provider: &str,
        action: &str,
    ) -> Result<Option<ExtCall>, BrokerStoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!(
                    "{EXT_CALL_SELECT} WHERE idempotency_key = ?1 AND provider = ?2 AND action = ?3 AND status = 'executed'
                     ORDER BY id DESC LIMIT 1"
                ),
                params![idempotency_key, provider, action],
                row_to_ext_call,
            )
            .optional()
            .map_err(broker_db_err)?;
        row.transpose().map_err(BrokerStoreError::Backend)
    }

    fn insert_ext_call(&self, call: NewExtCall) -> Result<ExtCall, BrokerStoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(broker_db_err)?;
        let row = insert_ext_call_row(&tx, &call, ExtCallStatus::Authorized, None)
            .map_err(|err| BrokerStoreError::Backend(err.to_string()))?;
        tx.commit().map_err(broker_db_err)?;
        Ok(row)
    }

    fn insert_denied_ext_call(&self, call: NewExtCall, denial_reason: &str) -> Result<ExtCall, BrokerStoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(broker_db_err)?;
        let row = insert_ext_call_row(&tx, &call, ExtCallStatus::Denied, Some(denial_reason))
            .map_err(|err| BrokerStoreError::Backend(err.to_string()))?;
        tx.commit().map_err(broker_db_err)?;
        Ok(row)
    }

    fn update_ext_call_status(&self, request_id: &str, update: ExtCallStatusUpdate) -> Result<ExtCall, BrokerStoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(broker_db_err)?;
        let status_text = enum_text(&update.status).map_err(|err| BrokerStoreError::Backend(err.to_string()))?;
        tx.execute(
            "UPDATE ext_calls SET status = ?1, denial_reason = ?2, result_summary = ?3,
                response_data = ?4, duration_ms = ?5 WHERE request_id = ?6",
            params![
                status_text,
                update.denial_reason,
                update.result_summary,
                update.response_data,
                update.duration_ms,
                request_id,
            ],
        )
        .map_err(broker_db_err)?;
        let row = tx
            .query_row(&format!("{EXT_CALL_SELECT} WHERE request_id = ?1"), params![request_id], row_to_ext_call)
            .map_err(broker_db_err)?
            .map_err(BrokerStoreError::Backend)?;
        tx.commit().map_err(broker_db_err)?;
        Ok(row)
    }

    fn sweep_terminal_ext_calls(&self, max_age_secs: i64) -> Result<usize, BrokerStoreError> {
        let conn = self.lock();
        let deleted = conn
            .execute(
                "DELETE FROM ext_calls WHERE status IN ('executed', 'denied', 'failed', 'timeout')
                 AND created_at < datetime('now', printf('-%d seconds', ?1))",
                params![max_age_secs],
            )
            .map_err(broker_db_err)?;
        Ok(deleted)
    }
}

/// Column list shared by every `ext_calls` row fetch; keep in sync with `row_to_ext_call`'s indices.
const EXT_CALL_SELECT: &str = "SELECT id, request_id, group_folder, provider, action, access_level,
     params_hmac, params_summary, status, denial_reason, result_summary, response_data,
     task_id, product_id, idempotency_key, duration_ms, created_at FROM ext_calls";

// ============================================================================
// SECTION: Row Insert Helpers
// ============================================================================

/// Inserts a brand-new `tasks` row.
fn insert_task_row(tx: &Transaction<'_>, task: &Task) -> Result<(), SqliteStoreError> {
    tx.execute(
        "INSERT INTO tasks (id, title, description, task_type, state, priority, scope, product_id,
            assigned_group, executor, created_by, gate, dod_required, override_by, override_reason,
            override_accepted_risk, override_review_deadline, metadata_json, version, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
        params![
            task.id,
            task.title,
            task.description,
            enum_text(&task.task_type)?,
            enum_text(&task.state)?,
            enum_text(&task.priority)?,
            enum_text(&task.scope)?,
            task.product_id,
            task.assigned_group,
            task.executor,
            task.created_by,
            enum_text(&task.gate)?,
            task.dod_required,
            task.override_by,
            task.override_reason,
            task.override_accepted_risk,
            task.override_review_deadline,
            to_json(&task.metadata)?,
            task.version,
            task.created_at,
            task.updated_at,
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Overwrites an existing `tasks` row; the caller has already checked the CAS version.
fn update_task_row(tx: &Transaction<'_>, task: &Task) -> Result<(), SqliteStoreError> {
    tx.execute(
        "UPDATE tasks SET title=?2, description=?3, task_type=?4, state=?5, priority=?6, scope=?7,
            product_id=?8, assigned_group=?9, executor=?10, created_by=?11, gate=?12, dod_required=?13,
            override_by=?14, override_reason=?15, override_accepted_risk=?16, override_review_deadline=?17,
            metadata_json=?18, version=?19, updated_at=?20 WHERE id=?1",
        params![
            task.id,
            task.title,
            task.description,
            enum_text(&task.task_type)?,
            enum_text(&task.state)?,
            enum_text(&task.priority)?,
            enum_text(&task.scope)?,
            task.product_id,
            task.assigned_group,
            task.executor,
            task.created_by,
            enum_text(&task.gate)?,
            task.dod_required,
            task.override_by,
            task.override_reason,
            task.override_accepted_risk,
            task.override_review_deadline,
            to_json(&task.metadata)?,
            task.version,
            task.updated_at,
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Inserts one `activities` row and returns its assigned id.
fn insert_activity_row(tx: &Transaction<'_>, task_id: &str, activity: &NewActivity) -> Result<i64, SqliteStoreError> {
    let now = gov_core::time::now_iso8601_ms();
    tx.execute(
        "INSERT INTO activities (task_id, action, from_state, to_state, actor, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            task_id,
            enum_text(&activity.action)?,
            activity.from_state.map(|state| enum_text(&state)).transpose()?,
            activity.to_state.map(|state| enum_text(&state)).transpose()?,
            activity.actor,
            activity.reason,
            now,
        ],
    )
    .map_err(db_err)?;
    Ok(tx.last_insert_rowid())
}

/// Inserts one `notifications` row and returns its assigned id.
fn insert_notification_row(
    tx: &Transaction<'_>,
    task_id: &str,
    notification: &gov_core::interfaces::NewNotification,
) -> Result<i64, SqliteStoreError> {
    let now = gov_core::time::now_iso8601_ms();
    tx.execute(
        "INSERT INTO notifications (task_id, target_group, actor, snippet, read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![task_id, notification.target_group, notification.actor, notification.snippet, now],
    )
    .map_err(db_err)?;
    Ok(tx.last_insert_rowid())
}

/// Inserts one `ext_calls` row in the given `status` and returns the decoded row.
fn insert_ext_call_row(
    tx: &Transaction<'_>,
    call: &NewExtCall,
    status: ExtCallStatus,
    denial_reason: Option<&str>,
) -> Result<ExtCall, SqliteStoreError> {
    let now = gov_core::time::now_iso8601_ms();
    tx.execute(
        "INSERT INTO ext_calls (request_id, group_folder, provider, action, access_level, params_hmac,
            params_summary, status, denial_reason, task_id, product_id, idempotency_key, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
        params![
            call.request_id,
            call.group_folder,
            call.provider,
            call.action,
            i64::from(call.access_level.as_u8()),
            call.params_hmac,
            call.params_summary,
            enum_text(&status)?,
            denial_reason,
            call.task_id,
            call.product_id,
            call.idempotency_key,
            now,
        ],
    )
    .map_err(db_err)?;
    Ok(ExtCall {
        id: tx.last_insert_rowid(),
        request_id: call.request_id.clone(),
        group_folder: call.group_folder.clone(),
        provider: call.provider.clone(),
        action: call.action.clone(),
        access_level: call.access_level,
        params_hmac: call.params_hmac.clone(),
        params_summary: call.params_summary.clone(),
        status,
        denial_reason: denial_reason.map(str::to_string),
        result_summary: None,
        response_data: None,
        task_id: call.task_id.clone(),
        product_id: call.product_id.clone(),
        idempotency_key: call.idempotency_key.clone(),
        duration_ms: None,
        created_at: now,
    })
}

// ============================================================================
// SECTION: Row Decode Helpers
// ============================================================================

/// Decodes one `products` row.
fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Product, String>> {
    let status_text: String = row.get(2)?;
    let risk_text: String = row.get(3)?;
    Ok((|| {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            status: text_to_enum(&status_text)?,
            risk_level: text_to_enum(&risk_text)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    })())
}

/// Decodes one `tasks` row selected via [`TASK_SELECT_BY_ID`].
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Task, String>> {
    Ok((|| -> Result<Task, String> {
        let task_type: String = row.get(3)?;
        let state: String = row.get(4)?;
        let priority: String = row.get(5)?;
        let scope: String = row.get(6)?;
        let gate: String = row.get(11)?;
        let metadata_json: String = row.get(17)?;
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            task_type: text_to_enum(&task_type)?,
            state: text_to_enum(&state)?,
            priority: text_to_enum(&priority)?,
            scope: text_to_enum(&scope)?,
            product_id: row.get(7)?,
            assigned_group: row.get(8)?,
            executor: row.get(9)?,
            created_by: row.get(10)?,
            gate: text_to_enum(&gate)?,
            dod_required: row.get(12)?,
            override_by: row.get(13)?,
            override_reason: row.get(14)?,
            override_accepted_risk: row.get(15)?,
            override_review_deadline: row.get(16)?,
            metadata: from_json::<TaskMetadata>(&metadata_json)?,
            version: row.get(18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    })())
}

/// Decodes one `activities` row.
fn row_to_activity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Activity, String>> {
    Ok((|| -> Result<Activity, String> {
        let action: String = row.get(2)?;
        let from_state: Option<String> = row.get(3)?;
        let to_state: Option<String> = row.get(4)?;
        Ok(Activity {
            id: row.get(0)?,
            task_id: row.get(1)?,
            action: text_to_enum::<ActivityAction>(&action)?,
            from_state: from_state.map(|text| text_to_enum::<TaskState>(&text)).transpose()?,
            to_state: to_state.map(|text| text_to_enum::<TaskState>(&text)).transpose()?,
            actor: row.get(5)?,
            reason: row.get(6)?,
            created_at: row.get(7)?,
        })
    })())
}

/// Decodes one `approvals` row.
fn row_to_approval(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Approval, String>> {
    Ok((|| -> Result<Approval, String> {
        let gate_type: String = row.get(1)?;
        Ok(Approval {
            task_id: row.get(0)?,
            gate_type: text_to_enum(&gate_type)?,
            approved_by: row.get(2)?,
            notes: row.get(3)?,
            evidence_link: row.get(4)?,
            created_at: row.get(5)?,
        })
    })())
}

/// Decodes one `capabilities` row.
fn row_to_capability(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Capability, String>> {
    Ok((|| -> Result<Capability, String> {
        let access_level: i64 = row.get(2)?;
        let allowed_actions: String = row.get(3)?;
        let denied_actions: String = row.get(4)?;
        Ok(Capability {
            group_folder: row.get(0)?,
            provider: row.get(1)?,
            access_level: AccessLevel::from_u8(u8::try_from(access_level).map_err(|err| err.to_string())?)
                .ok_or_else(|| format!("invalid access level {access_level}"))?,
            allowed_actions: from_json(&allowed_actions)?,
            denied_actions: from_json(&denied_actions)?,
            granted_by: row.get(5)?,
            granted_at: row.get(6)?,
            expires_at: row.get(7)?,
            active: row.get(8)?,
        })
    })())
}

/// Decodes one `ext_calls` row selected via [`EXT_CALL_SELECT`].
fn row_to_ext_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<ExtCall, String>> {
    Ok((|| -> Result<ExtCall, String> {
        let access_level: i64 = row.get(5)?;
        let status: String = row.get(8)?;
        Ok(ExtCall {
            id: row.get(0)?,
            request_id: row.get(1)?,
            group_folder: row.get(2)?,
            provider: row.get(3)?,
            action: row.get(4)?,
            access_level: AccessLevel::from_u8(u8::try_from(access_level).map_err(|err| err.to_string())?)
                .ok_or_else(|| format!("invalid access level {access_level}"))?,
            params_hmac: row.get(6)?,
            params_summary: row.get(7)?,
            status: text_to_enum(&status)?,
            denial_reason: row.get(9)?,
            result_summary: row.get(10)?,
            response_data: row.get(11)?,
            task_id: row.get(12)?,
            product_id: row.get(13)?,
            idempotency_key: row.get(14)?,
            duration_ms: row.get(15)?,
            created_at: row.get(16)?,
        })
    })())
}

/// Decodes one `notifications` row.
fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        task_id: row.get(1)?,
        target_group: row.get(2)?,
        actor: row.get(3)?,
        snippet: row.get(4)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Decodes one `topics` row.
fn row_to_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Topic, String>> {
    Ok((|| -> Result<Topic, String> {
        let status: String = row.get(3)?;
        Ok(Topic {
            id: row.get(0)?,
            group_folder: row.get(1)?,
            title: row.get(2)?,
            status: text_to_enum::<TopicStatus>(&status)?,
            created_at: row.get(4)?,
            last_activity: row.get(5)?,
            group_jid: row.get(6)?,
        })
    })())
}

/// Decodes one `messages` row.
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        group_folder: row.get(1)?,
        actor: row.get(2)?,
        text: row.get(3)?,
        timestamp: row.get(4)?,
        task_id: row.get(5)?,
    })
}

// ============================================================================
// SECTION: Serialization Helpers
// ============================================================================

/// Serializes a simple unit enum to its bare `serde` string form (stripped
/// of the surrounding JSON quotes), so it can be stored as a plain `TEXT`
/// column value.
fn enum_text<T: Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    let json = serde_json::to_string(value).map_err(|err| SqliteStoreError::Serde(err.to_string()))?;
    Ok(json.trim_matches('"').to_string())
}

/// Parses a plain `TEXT` column value back into a unit enum via the same
/// bare-string convention as [`enum_text`].
fn text_to_enum<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    serde_json::from_str(&format!("\"{text}\"")).map_err(|err| err.to_string())
}

/// Serializes any value to a JSON string for storage in a `TEXT` column.
fn to_json<T: Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Serde(err.to_string()))
}

/// Deserializes a JSON `TEXT` column value.
fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    serde_json::from_str(text).map_err(|err| err.to_string())
}

/// Wraps a raw `rusqlite` error for [`GovernanceStore`] callers.
fn db_err(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

/// Wraps a raw `rusqlite` error for [`BrokerStore`] callers.
fn broker_db_err(err: rusqlite::Error) -> BrokerStoreError {
    BrokerStoreError::Backend(err.to_string())
}

// ============================================================================
// SECTION: Connection Setup and Schema
// ============================================================================

/// Opens the on-disk connection, applies pragmas, and creates the schema if absent.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let mut connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    apply_pragmas(&connection, config)?;
    initialize_schema(&mut connection)?;
    Ok(connection)
}

/// Applies the foreign-key, WAL, and busy-timeout pragmas.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
        .map_err(db_err)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_err)?;
    Ok(())
}

/// Creates the schema on first open, tracked via `store_meta`.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);").map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    if version.is_none() {
        tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION]).map_err(db_err)?;
        tx.execute_batch(SCHEMA_DDL).map_err(db_err)?;
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}

/// `CREATE TABLE IF NOT EXISTS` DDL for every entity in §3, plus the
/// `capability_approvals` join table from SPEC_FULL's Open Question
/// resolution #2.
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    risk_level TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    task_type TEXT NOT NULL,
    state TEXT NOT NULL,
    priority TEXT NOT NULL,
    scope TEXT NOT NULL,
    product_id TEXT REFERENCES products(id),
    assigned_group TEXT NOT NULL,
    executor TEXT,
    created_by TEXT NOT NULL,
    gate TEXT NOT NULL,
    dod_required INTEGER NOT NULL,
    override_by TEXT,
    override_reason TEXT,
    override_accepted_risk TEXT,
    override_review_deadline TEXT,
    metadata_json TEXT NOT NULL,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_product ON tasks(product_id);

CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT NOT NULL REFERENCES tasks(id),
    action TEXT NOT NULL,
    from_state TEXT,
    to_state TEXT,
    actor TEXT NOT NULL,
    reason TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activities_task ON activities(task_id, id);

CREATE TABLE IF NOT EXISTS approvals (
    task_id TEXT NOT NULL,
    gate_type TEXT NOT NULL,
    approved_by TEXT NOT NULL,
    notes TEXT,
    evidence_link TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (task_id, gate_type)
);

CREATE TABLE IF NOT EXISTS capabilities (
    group_folder TEXT NOT NULL,
    provider TEXT NOT NULL,
    access_level INTEGER NOT NULL,
    allowed_actions TEXT NOT NULL,
    denied_actions TEXT NOT NULL,
    granted_by TEXT NOT NULL,
    granted_at TEXT NOT NULL,
    expires_at TEXT,
    active INTEGER NOT NULL,
    PRIMARY KEY (group_folder, provider)
);

CREATE TABLE IF NOT EXISTS capability_approvals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_folder TEXT NOT NULL,
    provider TEXT NOT NULL,
    approved_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ext_calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL UNIQUE,
    group_folder TEXT NOT NULL,
    provider TEXT NOT NULL,
    action TEXT NOT NULL,
    access_level INTEGER NOT NULL,
    params_hmac TEXT NOT NULL,
    params_summary TEXT NOT NULL,
    status TEXT NOT NULL,
    denial_reason TEXT,
    result_summary TEXT,
    response_data TEXT,
    task_id TEXT NOT NULL,
    product_id TEXT,
    idempotency_key TEXT,
    duration_ms INTEGER,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ext_calls_group ON ext_calls(group_folder, status);
CREATE INDEX IF NOT EXISTS idx_ext_calls_idem ON ext_calls(idempotency_key, provider, action);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT NOT NULL,
    target_group TEXT NOT NULL,
    actor TEXT NOT NULL,
    snippet TEXT NOT NULL,
    read INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_group ON notifications(target_group, read);

CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    group_folder TEXT NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    group_jid TEXT
);
CREATE INDEX IF NOT EXISTS idx_topics_group ON topics(group_folder);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_folder TEXT NOT NULL,
    actor TEXT NOT NULL,
    text TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    task_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp, id);
";

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use gov_core::interfaces::CreateTaskCmd;
    use gov_core::GovernanceEngine;
    use gov_core::model::Scope;
    use gov_core::model::TaskType;

    use super::*;

    #[test]
    fn insert_and_fetch_task_round_trips() {
        let store = SqliteStore::open_in_memory().expect("open");
        let engine = GovernanceEngine::new(store, false);
        let result = engine
            .create_task(CreateTaskCmd {
                actor: "main".to_string(),
                title: "Hello".to_string(),
                description: None,
                task_type: TaskType::Feature,
                priority: None,
                scope: Scope::Company,
                product_id: None,
                assigned_group: None,
                executor: None,
                created_by: None,
                gate: None,
                dod_required: None,
                dod_checklist: None,
            })
            .expect("create");
        let task = engine.get_task(&result.task_id).expect("fetch");
        assert_eq!(task.title, "Hello");
        assert_eq!(task.state, TaskState::Inbox);
        assert_eq!(task.version, 1);
    }

    #[test]
    fn duplicate_product_upsert_preserves_created_at() {
        let store = SqliteStore::open_in_memory().expect("open");
        let first = store
            .upsert_product("acme", "Acme", ProductStatus::Active, RiskLevel::Normal, "2026-01-01T00:00:00.000Z")
            .expect("create");
        let second = store
            .upsert_product("acme", "Acme Renamed", ProductStatus::Paused, RiskLevel::High, "2026-02-01T00:00:00.000Z")
            .expect("update");
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.name, "Acme Renamed");
        assert_eq!(second.status, ProductStatus::Paused);
    }

    #[test]
    fn stale_version_is_rejected_without_mutation() {
        let store = SqliteStore::open_in_memory().expect("open");
        let engine = GovernanceEngine::new(store, false);
        let created = engine
            .create_task(CreateTaskCmd {
                actor: "main".to_string(),
                title: "Stale test".to_string(),
                description: None,
                task_type: TaskType::Bug,
                priority: None,
                scope: Scope::Company,
                product_id: None,
                assigned_group: None,
                executor: None,
                created_by: None,
                gate: None,
                dod_required: None,
                dod_checklist: None,
            })
            .expect("create");
        let before = engine.get_task(&created.task_id).expect("fetch");
        engine
            .assign(gov_core::interfaces::AssignCmd {
                task_id: created.task_id.clone(),
                assigned_group: "developer".to_string(),
                executor: None,
                actor: "main".to_string(),
            })
            .expect("assign bumps version");
        let err = engine
            .transition(gov_core::interfaces::TransitionCmd {
                task_id: created.task_id.clone(),
                to_state: TaskState::Triaged,
                reason: None,
                expected_version: Some(before.version),
                actor: "main".to_string(),
                audit_link_present: false,
            })
            .expect_err("stale");
        assert_eq!(err.code, Some("STALE_VERSION"));
        let after = engine.get_task(&created.task_id).expect("fetch");
        assert_eq!(after.state, TaskState::Inbox);
    }

    #[test]
    fn notifications_mark_read_is_idempotent_in_count() {
        let store = SqliteStore::open_in_memory().expect("open");
        let engine = GovernanceEngine::new(store.clone(), false);
        let created = engine
            .create_task(CreateTaskCmd {
                actor: "main".to_string(),
                title: "Mentions".to_string(),
                description: None,
                task_type: TaskType::Feature,
                priority: None,
                scope: Scope::Company,
                product_id: None,
                assigned_group: None,
                executor: None,
                created_by: None,
                gate: None,
                dod_required: None,
                dod_checklist: None,
            })
            .expect("create");
        engine
            .comment(gov_core::interfaces::CommentCmd {
                task_id: created.task_id,
                text: "cc @developer and @security please review".to_string(),
                actor: None,
            })
            .expect("comment");
        let unread = store.count_unread("developer").expect("count");
        assert_eq!(unread, 1);
        let notifications = store.list_notifications("developer", true, 10).expect("list");
        let marked = store.mark_notifications_read(&[notifications[0].id]).expect("mark");
        assert_eq!(marked, 1);
        assert_eq!(store.count_unread("developer").expect("count"), 0);
        let marked_again = store.mark_notifications_read(&[notifications[0].id]).expect("mark again");
        assert_eq!(marked_again, 0);
    }
}
