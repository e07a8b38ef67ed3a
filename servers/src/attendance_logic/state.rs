use anyhow::{Context, Result};
use lib_common::connections::{RedisStore, TelegramSink};
use lib_common::core::{
    Accumulator, MemoryStore, PushChannel, SettingsStore, StreakNotifier, StreakSink, StudentStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::attendance_logic::auth::{AccessGate, SharedSecretGate};
use crate::attendance_logic::config::Settings;

/// Shared handles injected into every route.
#[derive(Clone)]
pub struct AppState {
    pub students: Arc<dyn StudentStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub accumulator: Arc<Accumulator>,
    pub notifier: StreakNotifier,
    pub channel: Arc<PushChannel>,
    pub gate: Arc<dyn AccessGate>,
    // Serializes read-modify-write of the dropdown options
    pub settings_lock: Arc<Mutex<()>>,
    // Interval between keep-alive comments on event streams
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(
        students: Arc<dyn StudentStore>,
        settings: Arc<dyn SettingsStore>,
        gate: Arc<dyn AccessGate>,
        backlog_capacity: usize,
        keep_alive: Duration,
    ) -> Self {
        let channel = Arc::new(PushChannel::new(backlog_capacity));
        Self {
            accumulator: Arc::new(Accumulator::new(Arc::clone(&students))),
            notifier: StreakNotifier::new(Arc::clone(&channel)),
            students,
            settings,
            channel,
            gate,
            settings_lock: Arc::new(Mutex::new(())),
            keep_alive,
        }
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(access_token: &str, backlog_capacity: usize, keep_alive: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            store.clone(),
            store,
            Arc::new(SharedSecretGate::new(access_token)),
            backlog_capacity,
            keep_alive,
        )
    }

    /// Also sends every dispatched streak event to `sink`.
    pub fn with_streak_sink(mut self, sink: Arc<dyn StreakSink>) -> Self {
        self.notifier = self.notifier.with_sink(sink);
        self
    }

    /// Builds the state from resolved settings, connecting to Redis when a
    /// URL is configured and adding Telegram alerts when a chat is.
    pub async fn build(settings: &Settings) -> Result<Self> {
        let mut state = match settings.redis_url.as_deref() {
            None => {
                info!("No redis url configured, using in-memory store");
                Self::in_memory(&settings.access_token, settings.backlog_capacity, settings.keep_alive)
            }
            Some(url) => {
                let store = Arc::new(
                    RedisStore::connect(url)
                        .await
                        .with_context(|| format!("connecting to redis at {url}"))?,
                );
                Self::new(
                    store.clone(),
                    store,
                    Arc::new(SharedSecretGate::new(settings.access_token.clone())),
                    settings.backlog_capacity,
                    settings.keep_alive,
                )
            }
        };

        if let Some(telegram) = &settings.telegram {
            let sink = TelegramSink::new(&telegram.api_url, &telegram.bot_token, telegram.chat_id.clone())
                .context("building the Telegram client")?;
            state = state.with_streak_sink(Arc::new(sink));
            info!(chat_id = %telegram.chat_id, "Telegram streak alerts enabled");
        }
        Ok(state)
    }
}
