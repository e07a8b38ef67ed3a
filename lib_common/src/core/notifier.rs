//! # Streak Notifier
//!
//! Sits between the accumulator and the push channel: every `StreakReached`
//! event becomes one [`Notification`] broadcast to live subscribers and kept
//! in the backlog. Extra [`StreakSink`]s (a chat alert, for instance) see the
//! same events. Dispatch is fire-and-forget; the caller never waits on, or
//! fails because of, a subscriber or a sink.

use std::sync::Arc;

use tracing::debug;

use crate::core::dispatcher::PushChannel;
use crate::core::model::{Notification, StreakReached};

/// Additional destination for streak events besides the push channel.
///
/// `deliver` is called on the request path and must not block; sinks that do
/// I/O spawn it.
pub trait StreakSink: Send + Sync {
    /// Hands one event to the sink.
    fn deliver(&self, event: &StreakReached);
}

/// Turns streak events into notifications on a shared [`PushChannel`].
#[derive(Clone)]
pub struct StreakNotifier {
    channel: Arc<PushChannel>,
    sinks: Vec<Arc<dyn StreakSink>>,
}

impl StreakNotifier {
    /// Creates a notifier publishing to `channel`.
    pub fn new(channel: Arc<PushChannel>) -> Self {
        Self {
            channel,
            sinks: Vec::new(),
        }
    }

    /// Adds a sink that receives every dispatched event after the broadcast.
    pub fn with_sink(mut self, sink: Arc<dyn StreakSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// The notification pushed for `event`.
    pub fn notification_for(event: &StreakReached) -> Notification {
        Notification::streak(event.student_id, &event.student_name)
    }

    /// Broadcasts one notification per event, in order, and passes each event
    /// to the sinks. Returns the total number of subscriber deliveries.
    pub fn dispatch(&self, events: &[StreakReached]) -> usize {
        let mut delivered = 0;
        for event in events {
            delivered += self.channel.broadcast(Self::notification_for(event));
            for sink in &self.sinks {
                sink.deliver(event);
            }
        }
        if !events.is_empty() {
            debug!(events = events.len(), delivered, "streak notifications dispatched");
        }
        delivered
    }
}
