// gov-http/src/state.rs
// ============================================================================
// Module: Application State
// Description: The shared, cloneable handle every axum handler receives:
//              the governance engine, the external-access broker, the
//              event bus, the alert engine, and the raw store for reads
//              that fall outside both trait seams.
// Purpose: Wire the crates below gov-http together exactly once, at
//          startup, instead of re-deriving the stack per request.
// Dependencies: gov-broker, gov-core, gov-events, gov-store-sqlite
// ============================================================================

//! ## Overview
//! [`AppState`] is cheap to clone: every field is either an `Arc` or, for
//! [`gov_store_sqlite::SqliteStore`], a handle that is itself internally
//! `Arc<Mutex<Connection>>`. [`AppState::bootstrap`] is the one place the
//! engine, broker, bus, and alert engine are constructed and wired
//! together, the way the teacher's `ServeCommand::run` builds its
//! long-lived services before handing them to the router.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use gov_broker::ExtBroker;
use gov_broker::NoopExecutor;
use gov_core::GovernanceEngine;
use gov_events::AlertEngine;
use gov_events::EventBus;
use gov_events::RecordingSink;
use gov_events::TelegramAlertSink;
use gov_store_sqlite::SqliteStore;
use gov_store_sqlite::SqliteStoreConfig;
use gov_store_sqlite::SqliteStoreError;

use crate::config::HttpConfig;

// ============================================================================
// SECTION: Bootstrap Error
// ============================================================================

/// Failure constructing [`AppState`] at startup.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The embedded store could not be opened.
    #[error("failed to open store: {0}")]
    Store(#[from] SqliteStoreError),
    /// The Telegram alert sink could not be built.
    #[error("failed to build telegram alert sink: {0}")]
    Telegram(String),
    /// The configured store directory could not be created.
    #[error("failed to create store directory: {0}")]
    StoreDir(String),
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared handle cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Resolved server configuration and secrets.
    pub config: Arc<HttpConfig>,
    /// Governance command orchestrator.
    pub engine: Arc<GovernanceEngine<SqliteStore>>,
    /// External-access authorization-and-dispatch broker.
    pub broker: Arc<ExtBroker<SqliteStore>>,
    /// Typed publish/subscribe event bus.
    pub bus: Arc<EventBus>,
    /// Raw store handle, used directly by reads that fall outside
    /// `GovernanceStore`/`BrokerStore` (topics, messages, notifications,
    /// product/capability administration).
    pub store: SqliteStore,
}

impl AppState {
    /// Opens the embedded store, wires the engine/broker/bus/alert-engine
    /// stack, and returns the resulting state plus the still-running
    /// [`AlertEngine`] (kept alive by the caller for the server's
    /// lifetime).
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if the store cannot be opened at
    /// `config.db_path()` or the configured Telegram sink cannot be built.
    pub fn bootstrap(config: HttpConfig) -> Result<(Self, Arc<AlertEngine>), BootstrapError> {
        std::fs::create_dir_all(&config.store_dir).map_err(|err| BootstrapError::StoreDir(err.to_string()))?;
        let store_config = SqliteStoreConfig::new(config.db_path());
        let store = SqliteStore::open(&store_config)?;

        let engine = GovernanceEngine::new(store.clone(), config.strict);
        let broker = ExtBroker::new(
            store.clone(),
            gov_broker::ProviderActionLevels::new(),
            config.broker_config,
            config.ext_call_hmac_secret.clone(),
            Arc::new(NoopExecutor),
        );

        let bus = EventBus::new();
        let alert_engine = match (&config.alert_telegram_bot_token, &config.alert_telegram_chat_id) {
            (Some(token), Some(chat_id)) => {
                let sink = TelegramAlertSink::new(token.clone(), chat_id.clone())
                    .map_err(|err| BootstrapError::Telegram(err.to_string()))?;
                Arc::new(AlertEngine::new(config.alert_config, Arc::new(sink)))
            }
            _ => Arc::new(AlertEngine::new(config.alert_config, Arc::new(RecordingSink::default()))),
        };
        alert_engine.attach(&bus);

        let state = Self { config: Arc::new(config), engine: Arc::new(engine), broker: Arc::new(broker), bus: Arc::new(bus), store };
        Ok((state, alert_engine))
    }
}
