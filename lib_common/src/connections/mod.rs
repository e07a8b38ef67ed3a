//! # Connections Module
//!
//! This module handles connections to external services: the Redis server
//! backing the engine's store traits and the Telegram Bot API used for
//! streak alerts.

/// Module for the Redis-backed student and settings store.
pub mod cache_redis;
/// Module for the Telegram streak alert sink.
pub mod telegram;

pub use cache_redis::RedisStore;
pub use telegram::{TelegramSink, TELEGRAM_API_URL};
