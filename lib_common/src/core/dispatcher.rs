//! # Push Channel
//!
//! The `PushChannel` fans streak notifications out to every live subscriber
//! (one per open event-stream connection) and keeps a backlog of everything it
//! broadcast so that a client connecting later still sees the milestones it
//! missed.
//!
//! ## Core Design Principles:
//!
//! 1.  **Shared Fan-out**: A broadcast notification is wrapped in an `Arc` once.
//!     Each subscriber and the backlog receive a pointer to the same value.
//!
//! 2.  **One Lock, Three Operations**: Registration, broadcast and
//!     acknowledgement all take the same mutex. A new subscriber is therefore
//!     either replayed a notification from the backlog or receives it live,
//!     never both and never neither.
//!
//! 3.  **Bounded Backlog**: The backlog is a ring of `backlog_capacity` entries.
//!     When it is full the oldest notification is evicted. Only an explicit
//!     acknowledgement clears it.
//!
//! 4.  **Self-Healing Registry**: A subscriber whose receiving side is gone is
//!     detected on the next broadcast, logged as a `DeliveryFailure` and
//!     removed. Broadcast never fails because of one subscriber.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::error::DeliveryFailure;
use crate::core::model::Notification;

/// Process-unique identifier of one subscriber.
pub type SubscriberId = u64;

/// Backlog size used when none is configured.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 256;

/// # Subscriber Handle
///
/// The channel's side of one connected client.
struct SubscriberHandle {
    id: SubscriberId,
    /// The channel is unbounded: a send only fails once the receiver is dropped.
    sender: mpsc::UnboundedSender<Arc<Notification>>,
}

impl SubscriberHandle {
    fn deliver(&self, notification: &Arc<Notification>) -> Result<(), DeliveryFailure> {
        self.sender
            .send(Arc::clone(notification))
            .map_err(|_| DeliveryFailure { subscriber: self.id })
    }
}

#[derive(Default)]
struct ChannelState {
    subscribers: Vec<SubscriberHandle>,
    backlog: VecDeque<Arc<Notification>>,
    closed: bool,
}

/// # Subscription
///
/// Returned by [`PushChannel::register`]. The receiver yields the replayed
/// backlog first, then live notifications.
pub struct Subscription {
    /// Identifier to pass to [`PushChannel::unregister`].
    pub id: SubscriberId,
    /// Queue of notifications for this subscriber.
    pub receiver: mpsc::UnboundedReceiver<Arc<Notification>>,
}

/// # Push Channel
///
/// Subscriber registry, broadcast and acknowledgeable backlog.
pub struct PushChannel {
    state: Mutex<ChannelState>,
    next_id: AtomicU64,
    backlog_capacity: usize,
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG_CAPACITY)
    }
}

impl PushChannel {
    /// Creates a channel whose backlog holds at most `backlog_capacity`
    /// notifications. A capacity of zero is raised to one.
    pub fn new(backlog_capacity: usize) -> Self {
        Self {
            state: Mutex::new(ChannelState::default()),
            next_id: AtomicU64::new(1),
            backlog_capacity: backlog_capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// # Register
    ///
    /// Adds a subscriber and replays the current backlog to it, oldest first,
    /// before any live notification can reach it.
    ///
    /// After [`close`](Self::close) the subscriber still receives the replay,
    /// then its receiver ends.
    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock();

        let handle = SubscriberHandle { id, sender: tx };
        for notification in &state.backlog {
            // The receiver is still in our hands, this cannot fail.
            let _ = handle.deliver(notification);
        }
        let replayed = state.backlog.len();

        if !state.closed {
            state.subscribers.push(handle);
        }
        info!(subscriber = id, replayed, "subscriber registered");
        Subscription { id, receiver: rx }
    }

    /// Removes a subscriber. Unknown or already removed ids are ignored.
    /// Returns whether a subscriber was removed.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut state = self.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id != id);
        let removed = state.subscribers.len() != before;
        if removed {
            info!(subscriber = id, "subscriber unregistered");
        }
        removed
    }

    /// # Broadcast
    ///
    /// Appends the notification to the backlog and delivers it to every
    /// registered subscriber. Subscribers whose receiver is gone are removed.
    ///
    /// # Returns
    /// The number of subscribers the notification was delivered to.
    pub fn broadcast(&self, notification: Notification) -> usize {
        let notification = Arc::new(notification);
        let mut state = self.lock();

        if state.backlog.len() >= self.backlog_capacity {
            if let Some(evicted) = state.backlog.pop_front() {
                warn!(
                    capacity = self.backlog_capacity,
                    student_id = evicted.student_id,
                    "notification backlog full, oldest entry evicted"
                );
            }
        }
        state.backlog.push_back(Arc::clone(&notification));

        let mut delivered = 0;
        state.subscribers.retain(|subscriber| match subscriber.deliver(&notification) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(failure) => {
                warn!("{failure}; removing subscriber");
                false
            }
        });

        debug!(
            student_id = notification.student_id,
            delivered,
            backlog = state.backlog.len(),
            "notification broadcast"
        );
        delivered
    }

    /// Clears the backlog for everyone. Returns how many entries were cleared.
    pub fn acknowledge(&self) -> usize {
        let mut state = self.lock();
        let cleared = state.backlog.len();
        state.backlog.clear();
        info!(cleared, "notifications acknowledged");
        cleared
    }

    /// Snapshot of the backlog, oldest first.
    pub fn backlog(&self) -> Vec<Notification> {
        self.lock().backlog.iter().map(|n| Notification::clone(n)).collect()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Drops every subscriber so their streams end. Later broadcasts still fill
    /// the backlog but reach no one.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let dropped = state.subscribers.len();
        state.subscribers.clear();
        info!(dropped, "push channel closed");
    }

    /// Registers a subscriber and wraps it in a [`Stream`] that unregisters
    /// itself when dropped.
    pub fn subscribe(self: &Arc<Self>) -> SubscriberStream {
        let Subscription { id, receiver } = self.register();
        SubscriberStream {
            id,
            receiver,
            channel: Arc::clone(self),
        }
    }
}

/// # Subscriber Stream
///
/// A registered subscriber as a `Stream` of notifications. Dropping it, for
/// example when the client disconnects, removes it from the channel.
pub struct SubscriberStream {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<Arc<Notification>>,
    channel: Arc<PushChannel>,
}

impl SubscriberStream {
    /// The subscriber's identifier.
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Stream for SubscriberStream {
    type Item = Arc<Notification>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for SubscriberStream {
    fn drop(&mut self) {
        self.channel.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn note(id: u64) -> Notification {
        Notification::streak(id, &format!("S{id}"))
    }

    fn drain(sub: &mut Subscription) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Ok(n) = sub.receiver.try_recv() {
            ids.push(n.student_id);
        }
        ids
    }

    #[test]
    fn late_subscriber_gets_backlog_replay_in_order() {
        let channel = PushChannel::default();
        assert_eq!(channel.broadcast(note(1)), 0);
        assert_eq!(channel.broadcast(note(2)), 0);

        let mut late = channel.register();
        assert_eq!(drain(&mut late), vec![1, 2]);

        assert_eq!(channel.broadcast(note(3)), 1);
        assert_eq!(drain(&mut late), vec![3]);
    }

    #[test]
    fn live_subscribers_each_receive_once() {
        let channel = PushChannel::default();
        let mut a = channel.register();
        let mut b = channel.register();

        assert_eq!(channel.broadcast(note(10)), 2);

        assert_eq!(drain(&mut a), vec![10]);
        assert_eq!(drain(&mut b), vec![10]);
    }

    #[test]
    fn acknowledge_clears_backlog_for_future_subscribers() {
        let channel = PushChannel::default();
        channel.broadcast(note(1));
        channel.broadcast(note(2));

        assert_eq!(channel.acknowledge(), 2);
        assert!(channel.backlog().is_empty());

        let mut fresh = channel.register();
        assert!(drain(&mut fresh).is_empty());
        assert_eq!(channel.acknowledge(), 0);
    }

    #[test]
    fn dropped_receiver_is_removed_on_next_broadcast() {
        let channel = PushChannel::default();
        let gone = channel.register();
        let mut alive = channel.register();
        drop(gone.receiver);

        assert_eq!(channel.broadcast(note(4)), 1);
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(drain(&mut alive), vec![4]);
    }

    #[test]
    fn unregister_is_idempotent() {
        let channel = PushChannel::default();
        let sub = channel.register();
        assert!(channel.unregister(sub.id));
        assert!(!channel.unregister(sub.id));
        assert!(!channel.unregister(9999));
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn full_backlog_evicts_oldest() {
        let channel = PushChannel::new(2);
        for id in 1..=3 {
            channel.broadcast(note(id));
        }
        let ids: Vec<_> = channel.backlog().iter().map(|n| n.student_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn stream_replays_then_unregisters_on_drop() {
        let channel = Arc::new(PushChannel::default());
        channel.broadcast(note(7));

        let mut stream = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);
        let first = stream.next().await.unwrap();
        assert_eq!(first.student_id, 7);

        channel.broadcast(note(8));
        assert_eq!(stream.next().await.unwrap().student_id, 8);

        drop(stream);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_ends_open_streams() {
        let channel = Arc::new(PushChannel::default());
        let mut stream = channel.subscribe();

        channel.close();

        assert!(stream.next().await.is_none());
        assert_eq!(channel.broadcast(note(1)), 0);
        assert_eq!(channel.backlog().len(), 1);
    }
}
