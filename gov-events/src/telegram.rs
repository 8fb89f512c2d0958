// gov-events/src/telegram.rs
// ============================================================================
// Module: Telegram Alert Sink
// Description: `AlertSink` implementation that posts to the Telegram Bot
//              API `sendMessage` method over a blocking HTTP client.
// Purpose: Give `gov-http` a real alert transport to wire up when
//          `ALERT_TELEGRAM_BOT_TOKEN`/`ALERT_TELEGRAM_CHAT_ID` are set,
//          without pulling an async runtime into this crate.
// Dependencies: reqwest (blocking), serde_json
// ============================================================================

//! ## Overview
//! [`TelegramAlertSink`] mirrors the blocking-client idiom
//! `decision-gate-broker::source::http::HttpSource` uses for outbound
//! requests: a short-timeout `reqwest::blocking::Client` built once and
//! reused, with non-success responses failing closed rather than panicking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::blocking::Client;

use crate::alerts::Alert;
use crate::alerts::AlertSendError;
use crate::alerts::AlertSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Request timeout for the Telegram `sendMessage` call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Telegram Sink
// ============================================================================

/// Delivers alerts to a Telegram chat via the Bot API.
pub struct TelegramAlertSink {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramAlertSink {
    /// Builds a sink posting to `chat_id` using `bot_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed
    /// (TLS backend initialization failure).
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, AlertSendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AlertSendError(err.to_string()))?;
        Ok(Self { client, bot_token: bot_token.into(), chat_id: chat_id.into() })
    }
}

impl AlertSink for TelegramAlertSink {
    fn send(&self, alert: &Alert) -> Result<(), AlertSendError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let text = format!("[{}] {}: {}", alert.rule_name, alert.subject, alert.body);
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({"chat_id": self.chat_id, "text": text}))
            .send()
            .map_err(|err| AlertSendError(err.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AlertSendError(format!("telegram responded with status {}", response.status())))
        }
    }
}
