//! # Telegram Streak Alerts
//!
//! Posts a chat message through the Telegram Bot API for every completed
//! streak. Each message is sent from its own task; failures are logged and
//! never reach the attendance request.

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::json;
use tracing::{debug, warn};

use crate::core::model::StreakReached;
use crate::core::notifier::StreakSink;

/// Public Bot API endpoint.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends streak alerts to one chat.
#[derive(Clone)]
pub struct TelegramSink {
    client: Client,
    // Holds the bot token, keep it out of logs
    endpoint: String,
    chat_id: String,
}

impl TelegramSink {
    /// Builds a sink posting to `{api_url}/bot{bot_token}/sendMessage`.
    pub fn new(api_url: &str, bot_token: &str, chat_id: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), bot_token),
            chat_id: chat_id.into(),
        })
    }

    /// The chat text for `event`.
    pub fn message_for(event: &StreakReached) -> String {
        format!("Student {} ({}) has a streak of four!", event.student_name, event.student_id)
    }

    /// Sends `text` and waits for the API to accept it. Errors carry no URL.
    pub async fn send(&self, text: &str) -> Result<(), reqwest::Error> {
        let payload = json!({ "chat_id": self.chat_id, "text": text });
        self.client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map(|_| ())
            .map_err(reqwest::Error::without_url)
    }
}

impl StreakSink for TelegramSink {
    fn deliver(&self, event: &StreakReached) {
        let sink = self.clone();
        let text = Self::message_for(event);
        let student_id = event.student_id;
        tokio::spawn(async move {
            match sink.send(&text).await {
                Ok(()) => debug!(student_id, "Telegram alert sent"),
                Err(e) => warn!(student_id, "Telegram alert failed: {}", e),
            }
        });
    }
}
