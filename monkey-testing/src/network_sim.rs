//! In-memory network between simulated replicas.
//!
//! Every address owns a bounded inbox. An envelope that finds its inbox full
//! is dropped, the way a real receive queue sheds load.

use dashmap::DashMap;
use monkey_core::{MessageBatch, MonkeyError, Result, StreamChunk};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Batch(MessageBatch),
    Chunk(StreamChunk),
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub payload: Payload,
    /// Earliest instant the receiver may see the payload
    pub deliver_at: Instant,
}

#[derive(Debug)]
struct Inbox {
    queue: Mutex<VecDeque<Envelope>>,
    capacity: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NetworkStats {
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
}

impl NetworkStats {
    pub fn drop_rate(&self) -> f64 {
        if self.messages_sent == 0 {
            0.0
        } else {
            self.messages_dropped as f64 / self.messages_sent as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct SimNetwork {
    inboxes: DashMap<String, Arc<Inbox>>,
    stats: Mutex<NetworkStats>,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the inbox of `address`, holding at most `capacity` envelopes.
    pub fn register(&self, address: impl Into<String>, capacity: usize) {
        let address = address.into();
        info!("network: {} joined with receive queue length {}", address, capacity);
        self.inboxes.insert(
            address,
            Arc::new(Inbox {
                queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
                capacity,
            }),
        );
    }

    pub fn unregister(&self, address: &str) {
        if self.inboxes.remove(address).is_some() {
            info!("network: {} left", address);
        }
    }

    /// Queues `envelope` for `address`. A dropped envelope is counted and
    /// reported as the error.
    pub fn deliver(&self, address: &str, envelope: Envelope) -> Result<()> {
        self.stats.lock().messages_sent += 1;

        let inbox = match self.inboxes.get(address) {
            Some(inbox) => inbox.value().clone(),
            None => {
                self.record_dropped(1);
                return Err(MonkeyError::network(format!("no inbox at {}", address)));
            }
        };

        let mut queue = inbox.queue.lock();
        if queue.len() >= inbox.capacity {
            drop(queue);
            self.record_dropped(1);
            return Err(MonkeyError::QueueFull {
                queue: "receive",
                capacity: inbox.capacity,
            });
        }
        queue.push_back(envelope);
        Ok(())
    }

    /// Removes and returns every envelope for `address` that is due at `now`,
    /// keeping later ones queued in order.
    pub fn take_ready(&self, address: &str, now: Instant) -> Vec<Envelope> {
        let inbox = match self.inboxes.get(address) {
            Some(inbox) => inbox.value().clone(),
            None => return Vec::new(),
        };
        let mut queue = inbox.queue.lock();
        let mut ready = Vec::new();
        let mut waiting = VecDeque::with_capacity(queue.len());
        for envelope in queue.drain(..) {
            if envelope.deliver_at <= now {
                ready.push(envelope);
            } else {
                waiting.push_back(envelope);
            }
        }
        *queue = waiting;
        ready
    }

    pub fn pending(&self, address: &str) -> usize {
        self.inboxes
            .get(address)
            .map(|inbox| inbox.queue.lock().len())
            .unwrap_or(0)
    }

    pub fn record_delivered(&self, count: usize) {
        self.stats.lock().messages_delivered += count as u64;
    }

    pub fn record_dropped(&self, count: usize) {
        self.stats.lock().messages_dropped += count as u64;
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn envelope(deliver_at: Instant) -> Envelope {
        Envelope {
            payload: Payload::Batch(MessageBatch::new("src", Vec::new())),
            deliver_at,
        }
    }

    #[test]
    fn test_bounded_inbox_drops_overflow() {
        let network = SimNetwork::new();
        network.register("b", 2);
        let now = Instant::now();

        assert!(network.deliver("b", envelope(now)).is_ok());
        assert!(network.deliver("b", envelope(now)).is_ok());
        assert!(matches!(
            network.deliver("b", envelope(now)),
            Err(MonkeyError::QueueFull { queue: "receive", capacity: 2 })
        ));
        assert_eq!(network.pending("b"), 2);

        let stats = network.stats();
        assert_eq!(stats.messages_sent, 3);
        assert_eq!(stats.messages_dropped, 1);
    }

    #[test]
    fn test_unknown_address_drops() {
        let network = SimNetwork::new();
        let err = network.deliver("nowhere", envelope(Instant::now())).unwrap_err();
        assert!(matches!(err, MonkeyError::Network { .. }));
        assert!(err.is_retryable());
        assert_eq!(network.stats().messages_dropped, 1);
    }

    #[test]
    fn test_take_ready_holds_back_future_envelopes() {
        let network = SimNetwork::new();
        network.register("b", 8);
        let now = Instant::now();

        network.deliver("b", envelope(now)).unwrap();
        network.deliver("b", envelope(now + Duration::from_secs(60))).unwrap();
        network.deliver("b", envelope(now)).unwrap();

        assert_eq!(network.take_ready("b", now).len(), 2);
        assert_eq!(network.pending("b"), 1);
        assert_eq!(network.take_ready("b", now + Duration::from_secs(61)).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_inbox_never_exceeds_capacity(capacity in 0usize..16, sends in 0usize..64) {
            let network = SimNetwork::new();
            network.register("b", capacity);
            let now = Instant::now();

            let accepted = (0..sends)
                .filter(|_| network.deliver("b", envelope(now)).is_ok())
                .count();

            prop_assert_eq!(accepted, sends.min(capacity));
            prop_assert_eq!(network.pending("b"), accepted);
            let stats = network.stats();
            prop_assert_eq!(stats.messages_sent, sends as u64);
            prop_assert_eq!(stats.messages_dropped, (sends - accepted) as u64);
        }
    }
}
