//! # Core Engine Module
//!
//! This module forms the heart of the attendance streak service. It aggregates
//! the components that turn a marked attendance sheet into counter updates and
//! live milestone notifications.
//!
//! ## Core Components:
//!
//! - **`model`**: The student document with its derived attendance counters,
//!   the `StreakReached` domain event and the `Notification` payload.
//!
//! - **`store`**: The object-safe store traits the engine consumes, plus the
//!   in-memory backend used when no external store is configured.
//!
//! - **`accumulator`**: Applies one attendance event per student id, persists
//!   the document and reports the streak events it produced. It never talks to
//!   the push channel directly.
//!
//! - **`notifier`**: Turns `StreakReached` events into notifications and hands
//!   them to the push channel and any extra sinks, fire-and-forget.
//!
//! - **`dispatcher`**: The push channel. A subscriber registry with a bounded
//!   backlog that is replayed to every new subscriber and cleared by a global
//!   acknowledgement.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Applies attendance events and derives streak milestones.
pub mod accumulator;
/// The push channel: subscriber registry, broadcast and backlog.
pub mod dispatcher;
/// Error taxonomy of the engine.
pub mod error;
/// Student documents, domain events and notification payloads.
pub mod model;
/// Builds streak notifications and hands them to the push channel.
pub mod notifier;
/// Store traits and the in-memory backend.
pub mod store;

// --- Public API Re-exports ---
pub use accumulator::{Accumulator, AttendanceOutcome};
pub use dispatcher::{PushChannel, SubscriberId, SubscriberStream, Subscription, DEFAULT_BACKLOG_CAPACITY};
pub use error::{AttendanceError, DeliveryFailure, StoreError};
pub use model::{Notification, StreakReached, Student, StudentId, STREAK_LENGTH};
pub use notifier::{StreakNotifier, StreakSink};
pub use store::{MemoryStore, SettingsStore, StoreFuture, StudentStore};
