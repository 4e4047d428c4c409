//! Realtime click notifier
//!
//! Pushes link changes to connected dashboard clients. All local subscribers
//! of one link id share a single underlying channel; the channel only goes
//! away when the last subscriber detaches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::analytics::AnalyticsEvent;
use crate::links::Link;

/// Buffered changes per link channel before slow subscribers start lagging
const CHANNEL_CAPACITY: usize = 64;

/// A change on one link, pushed to its subscribers
#[derive(Clone, Debug)]
pub enum ChangeEvent {
    /// The link row changed: click counter write or a dashboard edit
    LinkUpdated(Link),

    /// One analytics event was recorded for the link
    ClickRecorded(AnalyticsEvent),
}

/// The shared channel of one link id
struct Channel {
    /// Broadcast side, shared by all subscribers of the link
    sender: broadcast::Sender<ChangeEvent>,

    /// Attached subscriber count; the channel is removed at zero
    subscribers: usize,
}

/// Hub of per-link change channels
#[derive(Clone, Default)]
pub struct Hub {
    /// Active channels by link id
    channels: Arc<Mutex<HashMap<Uuid, Channel>>>,
}

impl Hub {
    /// Create a hub without any active channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the change feed of one link
    ///
    /// Subscribers of the same link id share one underlying channel; every
    /// subscriber receives every change published while it is attached
    pub fn subscribe(&self, link_id: Uuid) -> Subscription {
        let mut channels = self.channels.lock().expect("Hub lock is never poisoned");

        let channel = channels.entry(link_id).or_insert_with(|| Channel {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
            subscribers: 0,
        });

        channel.subscribers += 1;

        Subscription {
            receiver: channel.sender.subscribe(),
            _guard: SubscriptionGuard {
                channels: Arc::clone(&self.channels),
                link_id,
            },
        }
    }

    /// Publish a change to the subscribers of one link
    ///
    /// A no-op when nobody is subscribed
    pub fn publish(&self, link_id: &Uuid, event: ChangeEvent) {
        let channels = self.channels.lock().expect("Hub lock is never poisoned");

        if let Some(channel) = channels.get(link_id) {
            // only errors when all receivers detached in the meantime
            let _ = channel.sender.send(event);
        }
    }

    /// Number of active channels
    #[cfg(test)]
    fn active_channels(&self) -> usize {
        self.channels.lock().expect("Hub lock is never poisoned").len()
    }
}

/// A live subscription to one link's change feed
///
/// Detaches on drop; detaching never tears down the channel while other
/// subscribers remain attached
pub struct Subscription {
    /// Receiving side of the shared channel
    receiver: broadcast::Receiver<ChangeEvent>,

    /// Reference-count guard, detaches on drop
    _guard: SubscriptionGuard,
}

impl Subscription {
    /// Receive the next change
    ///
    /// Skips over lag markers of slow consumption; `None` once the channel
    /// is gone
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Realtime subscriber lagged, skipped {skipped} changes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Adapt the subscription into a stream of changes
    ///
    /// The reference count is held by the stream and released when the
    /// stream is dropped
    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send {
        let Subscription { receiver, _guard } = self;
        let guard = _guard;

        BroadcastStream::new(receiver).filter_map(move |result| {
            let _ = &guard;

            result.ok()
        })
    }
}

/// Reference-count guard of one subscription
struct SubscriptionGuard {
    /// Channel map of the owning hub
    channels: Arc<Mutex<HashMap<Uuid, Channel>>>,

    /// The subscribed link id
    link_id: Uuid,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Ok(mut channels) = self.channels.lock() {
            if let Some(channel) = channels.get_mut(&self.link_id) {
                channel.subscribers -= 1;

                if channel.subscribers == 0 {
                    channels.remove(&self.link_id);
                }
            }
        }
    }
}
