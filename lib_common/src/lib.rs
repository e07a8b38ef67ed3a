//! # lib_common
//!
//! Shared building blocks for the attendance streak service. Each top-level
//! module sits behind the cargo feature of the same name so binaries only pull
//! in the dependencies they use.

/// Attendance model, accumulator, streak notifier and push channel.
#[cfg(feature = "core")]
pub mod core;

/// External services: the Redis store backend and Telegram alerts.
#[cfg(feature = "connections")]
pub mod connections;

/// Structured logging setup.
#[cfg(feature = "loggers")]
pub mod loggers;
