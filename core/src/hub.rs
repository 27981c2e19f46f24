// Subscriber broadcast hub
//
// Holds the transient set of connected viewers and fans every applied event
// out to each of them. One bad subscriber must never block or fail delivery
// to the rest: a full queue (slow consumer) or a closed channel gets the
// subscriber removed, nothing more.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::event::StreamMessage;

/// Delivery statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubStats {
    pub total_published: u64,
    pub total_delivered: u64,
    pub dropped_subscribers: u64,
    pub active_subscribers: usize,
}

pub struct BroadcastHub {
    // Subscriber id -> bounded outgoing queue
    subscribers: DashMap<u64, mpsc::Sender<String>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            queue_capacity,
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Registers a subscriber and returns its id plus the receiving end of
    /// its bounded queue.
    pub fn subscribe(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.subscribers.insert(id, tx);
        debug!(subscriber = id, "subscriber registered");
        (id, rx)
    }

    /// Removes a subscriber. Safe to call multiple times.
    pub fn unsubscribe(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            debug!(subscriber = id, "subscriber removed");
        }
    }

    /// Enqueues a payload for one subscriber, ahead of any later publish.
    /// Used for the `initial_data` message.
    pub fn push_to(&self, id: u64, payload: String) {
        if let Some(sender) = self.subscribers.get(&id) {
            if sender.try_send(payload).is_err() {
                drop(sender);
                warn!(subscriber = id, "could not queue initial payload, dropping subscriber");
                self.remove_dropped(id);
            }
        }
    }

    /// Serializes the message once and hands it to every subscriber's
    /// delivery queue. Returns the number of successful deliveries.
    ///
    /// Called under the store's write lock, which is what gives every
    /// subscriber the exact apply order.
    pub fn publish(&self, message: &StreamMessage) -> usize {
        let payload = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, kind = %message.kind, "failed to serialize event");
                return 0;
            }
        };

        self.published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber = entry.key(),
                        "subscriber queue full, dropping slow subscriber"
                    );
                    dead.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = entry.key(), "subscriber channel closed");
                    dead.push(*entry.key());
                }
            }
        }
        for id in dead {
            self.remove_dropped(id);
        }

        self.delivered.fetch_add(delivered, Ordering::Relaxed);
        delivered as usize
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            total_published: self.published.load(Ordering::Relaxed),
            total_delivered: self.delivered.load(Ordering::Relaxed),
            dropped_subscribers: self.dropped.load(Ordering::Relaxed),
            active_subscribers: self.subscribers.len(),
        }
    }

    fn remove_dropped(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
