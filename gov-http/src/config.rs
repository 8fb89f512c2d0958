// gov-http/src/config.rs
// ============================================================================
// Module: HTTP Server Configuration
// Description: Environment-driven configuration for the governance HTTP
//              surface: secrets, strict mode, alert tuning, broker limits,
//              and the store/bind-address operational knobs.
// Purpose: Fail-closed config loading (§6 "missing OS_HTTP_SECRET aborts
//          startup"), grounded in the teacher's `ServeCommand` /
//          `decision-gate-config` env-override shape.
// Dependencies: std::env
// ============================================================================

//! ## Overview
//! [`HttpConfig::from_env`] is the single place every `GOV_*`/`OS_*`/
//! `COCKPIT_*`/`ALERT_*`/`EXT_*`/`BREAKER_*` environment variable named in §6
//! is read. A missing `OS_HTTP_SECRET` or `COCKPIT_WRITE_SECRET_CURRENT`
//! fails closed with [`ConfigError`]; a too-short `OS_HTTP_SECRET` is
//! accepted with a recorded warning rather than refused outright (§1.I
//! preflight: "warned if shorter", not rejected).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use gov_broker::BrokerConfig;
use gov_events::AlertConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum `OS_HTTP_SECRET` length before a warning is recorded (§1.I).
pub const MIN_SECRET_LEN: usize = 16;
/// Default bind address when `GOV_HTTP_ADDR` is unset.
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8787";
/// Default store directory when `GOV_STORE_DIR` is unset.
const DEFAULT_STORE_DIR: &str = "./gov-data";
/// Database filename inside the store directory.
pub const DB_FILE_NAME: &str = "governance.sqlite3";

// ============================================================================
// SECTION: Config Error
// ============================================================================

/// Failure loading [`HttpConfig`] from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable was missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    /// An environment variable had a value that could not be parsed.
    #[error("invalid value for {var}: {value}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending raw value.
        value: String,
    },
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Fully resolved runtime configuration for `gov-http`.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Read-auth secret, required on every request (`X-OS-SECRET`).
    pub os_http_secret: String,
    /// Whether `os_http_secret` was shorter than [`MIN_SECRET_LEN`]; the
    /// caller logs a warning but still starts.
    pub secret_below_minimum_length: bool,
    /// Current write-auth secret (`X-WRITE-SECRET`).
    pub write_secret_current: String,
    /// Previously-rotated write-auth secret, still accepted if set.
    pub write_secret_previous: Option<String>,
    /// Engages strict-mode policy validators.
    pub strict: bool,
    /// Telegram bot token; absence disables alert delivery.
    pub alert_telegram_bot_token: Option<String>,
    /// Telegram chat id; absence disables alert delivery.
    pub alert_telegram_chat_id: Option<String>,
    /// Alert-rule tuning (offline grace, dispatch-fail window/threshold,
    /// shared dedup window).
    pub alert_config: AlertConfig,
    /// HMAC secret for `ExtCall.params_hmac`.
    pub ext_call_hmac_secret: Vec<u8>,
    /// Broker backpressure/rate-limit/daily-quota tuning.
    pub broker_config: BrokerConfig,
    /// Directory the embedded store lives in (`GOV_STORE_DIR`).
    pub store_dir: PathBuf,
    /// Address the HTTP server binds to (`GOV_HTTP_ADDR`).
    pub http_addr: SocketAddr,
}

impl HttpConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when `OS_HTTP_SECRET` or
    /// `COCKPIT_WRITE_SECRET_CURRENT` is absent or empty, or
    /// [`ConfigError::InvalidValue`] when a numeric/boolean/address variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let os_http_secret = required_var("OS_HTTP_SECRET")?;
        let secret_below_minimum_length = os_http_secret.len() < MIN_SECRET_LEN;
        let write_secret_current = required_var("COCKPIT_WRITE_SECRET_CURRENT")?;
        let write_secret_previous = optional_var("COCKPIT_WRITE_SECRET_PREVIOUS");

        let strict = parse_bool_flag("GOV_STRICT")?;

        let alert_telegram_bot_token = optional_var("ALERT_TELEGRAM_BOT_TOKEN");
        let alert_telegram_chat_id = optional_var("ALERT_TELEGRAM_CHAT_ID");

        let mut alert_config = AlertConfig::default();
        if let Some(ms) = optional_var("WORKER_OFFLINE_GRACE_MS") {
            alert_config.offline_grace = parse_millis("WORKER_OFFLINE_GRACE_MS", &ms)?;
        }
        if let Some(count) = optional_var("DISPATCH_FAIL_THRESHOLD") {
            alert_config.dispatch_fail_threshold = parse_usize("DISPATCH_FAIL_THRESHOLD", &count)?;
        }
        if let Some(ms) = optional_var("BREAKER_DEDUP_WINDOW_MS") {
            alert_config.dedup_window = parse_millis("BREAKER_DEDUP_WINDOW_MS", &ms)?;
        }

        let ext_call_hmac_secret = required_var("EXT_CALL_HMAC_SECRET")?.into_bytes();

        let mut broker_config = BrokerConfig::default();
        if let Some(max) = optional_var("EXT_RATE_LIMIT_MAX") {
            broker_config.rate_limit_max = parse_usize("EXT_RATE_LIMIT_MAX", &max)?;
        }
        if let Some(secs) = optional_var("EXT_RATE_LIMIT_WINDOW_SECS") {
            broker_config.rate_limit_window_secs = parse_i64("EXT_RATE_LIMIT_WINDOW_SECS", &secs)?;
        }
        if let Some(max) = optional_var("EXT_DAILY_QUOTA_MAX") {
            broker_config.daily_quota_max = parse_usize("EXT_DAILY_QUOTA_MAX", &max)?;
        }

        let store_dir = optional_var("GOV_STORE_DIR").map_or_else(|| PathBuf::from(DEFAULT_STORE_DIR), PathBuf::from);

        let http_addr = optional_var("GOV_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = http_addr
            .parse::<SocketAddr>()
            .map_err(|_err| ConfigError::InvalidValue { var: "GOV_HTTP_ADDR", value: http_addr })?;

        Ok(Self {
            os_http_secret,
            secret_below_minimum_length,
            write_secret_current,
            write_secret_previous,
            strict,
            alert_telegram_bot_token,
            alert_telegram_chat_id,
            alert_config,
            ext_call_hmac_secret,
            broker_config,
            store_dir,
            http_addr,
        })
    }

    /// Path to the embedded `SQLite` database file inside [`Self::store_dir`].
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.store_dir.join(DB_FILE_NAME)
    }
}

// ============================================================================
// SECTION: Env Helpers
// ============================================================================

/// Reads a required, non-empty environment variable.
fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Reads an optional environment variable, treating an empty value as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// Parses a `"0"`/`"1"` boolean flag, defaulting to `false` when unset.
fn parse_bool_flag(name: &'static str) -> Result<bool, ConfigError> {
    match optional_var(name).as_deref() {
        None | Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(other) => Err(ConfigError::InvalidValue { var: name, value: other.to_string() }),
    }
}

/// Parses a `usize` environment variable.
fn parse_usize(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.parse().map_err(|_err| ConfigError::InvalidValue { var: name, value: raw.to_string() })
}

/// Parses an `i64` environment variable.
fn parse_i64(name: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.parse().map_err(|_err| ConfigError::InvalidValue { var: name, value: raw.to_string() })
}

/// Parses a millisecond-count environment variable into a [`Duration`].
fn parse_millis(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let millis: u64 = raw.parse().map_err(|_err| ConfigError::InvalidValue { var: name, value: raw.to_string() })?;
    Ok(Duration::from_millis(millis))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_flag_defaults_false_when_unset() {
        assert_eq!(parse_bool_flag("GOV_STRICT_TEST_UNSET_VAR"), Ok(false));
    }

    #[test]
    fn default_http_addr_parses() {
        assert!(DEFAULT_HTTP_ADDR.parse::<SocketAddr>().is_ok());
    }
}
