//! Per-replica transport over [`SimNetwork`].
//!
//! Send path: fault policy, then traffic hooks, then address resolution.
//! Receive path: the fault policy is consulted for every envelope, so a
//! partitioned replica drains and discards its inbox instead of processing it.

use crate::network_sim::{Envelope, Payload, SimNetwork};
use monkey_core::{AddressResolver, GroupId, MessageBatch, ReplicaId, StreamChunk};
use monkey_harness::{IoDecision, PartitionController, TrafficHooks};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    pub sends_blocked: u64,
    pub sends_hook_dropped: u64,
    pub sends_unresolved: u64,
    pub receives_discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sends_blocked: AtomicU64,
    sends_hook_dropped: AtomicU64,
    sends_unresolved: AtomicU64,
    receives_discarded: AtomicU64,
}

pub struct SimTransport {
    group_id: GroupId,
    replica_id: ReplicaId,
    address: String,
    network: Arc<SimNetwork>,
    resolver: Arc<dyn AddressResolver>,
    partition: Arc<PartitionController>,
    hooks: Arc<TrafficHooks>,
    rng: Mutex<StdRng>,
    counters: Counters,
}

impl SimTransport {
    pub fn new(
        group_id: GroupId,
        replica_id: ReplicaId,
        address: impl Into<String>,
        network: Arc<SimNetwork>,
        resolver: Arc<dyn AddressResolver>,
        seed: Option<u64>,
    ) -> Self {
        let address = address.into();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            group_id,
            replica_id,
            partition: Arc::new(PartitionController::with_label(address.clone())),
            address,
            network,
            resolver,
            hooks: Arc::new(TrafficHooks::new()),
            rng: Mutex::new(rng),
            counters: Counters::default(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn partition(&self) -> &Arc<PartitionController> {
        &self.partition
    }

    pub fn hooks(&self) -> &Arc<TrafficHooks> {
        &self.hooks
    }

    pub fn network(&self) -> &Arc<SimNetwork> {
        &self.network
    }

    /// Sends one batch to `to`. Returns false if the batch never reached the
    /// target's inbox.
    pub fn send_batch(&self, to: ReplicaId, batch: MessageBatch) -> bool {
        let Some(deliver_at) = self.admit_send() else {
            return false;
        };
        let Some(batch) = self.hooks.apply_message_batch(batch) else {
            self.counters.sends_hook_dropped.fetch_add(1, Ordering::Relaxed);
            trace!("{}: batch to {} dropped by hook", self.address, to);
            return false;
        };
        self.dispatch(to, Payload::Batch(batch), deliver_at)
    }

    pub fn send_chunk(&self, chunk: StreamChunk) -> bool {
        let Some(deliver_at) = self.admit_send() else {
            return false;
        };
        let to = chunk.to;
        let Some(chunk) = self.hooks.apply_stream_chunk(chunk) else {
            self.counters.sends_hook_dropped.fetch_add(1, Ordering::Relaxed);
            trace!("{}: snapshot chunk to {} dropped by hook", self.address, to);
            return false;
        };
        self.dispatch(to, Payload::Chunk(chunk), deliver_at)
    }

    /// Everything due in this replica's inbox that the fault policy lets
    /// through.
    pub fn receive(&self) -> Vec<Payload> {
        let ready = self.network.take_ready(&self.address, Instant::now());
        if ready.is_empty() {
            return Vec::new();
        }

        let mut accepted = Vec::with_capacity(ready.len());
        let mut discarded = 0;
        for envelope in ready {
            match self.decide() {
                IoDecision::Block => discarded += 1,
                IoDecision::Proceed | IoDecision::Delay(_) => accepted.push(envelope.payload),
            }
        }

        if discarded > 0 {
            debug!("{}: discarded {} inbound envelopes", self.address, discarded);
            self.counters
                .receives_discarded
                .fetch_add(discarded as u64, Ordering::Relaxed);
            self.network.record_dropped(discarded);
        }
        self.network.record_delivered(accepted.len());
        accepted
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            sends_blocked: self.counters.sends_blocked.load(Ordering::Relaxed),
            sends_hook_dropped: self.counters.sends_hook_dropped.load(Ordering::Relaxed),
            sends_unresolved: self.counters.sends_unresolved.load(Ordering::Relaxed),
            receives_discarded: self.counters.receives_discarded.load(Ordering::Relaxed),
        }
    }

    /// One policy load; the RNG is locked only for lossy links.
    fn decide(&self) -> IoDecision {
        let policy = self.partition.policy();
        match policy.fixed_decision() {
            Some(decision) => decision,
            None => policy.decide_with(&mut *self.rng.lock()),
        }
    }

    fn admit_send(&self) -> Option<Instant> {
        match self.decide() {
            IoDecision::Proceed => Some(Instant::now()),
            IoDecision::Delay(delay) => Some(Instant::now() + delay),
            IoDecision::Block => {
                self.counters.sends_blocked.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn dispatch(&self, to: ReplicaId, payload: Payload, deliver_at: Instant) -> bool {
        let address = match self.resolver.resolve(self.group_id, to) {
            Ok(address) => address,
            Err(e) => {
                self.counters.sends_unresolved.fetch_add(1, Ordering::Relaxed);
                warn!("{}: replica {} -> {}: {}", self.address, self.replica_id, to, e);
                return false;
            }
        };
        match self.network.deliver(&address, Envelope { payload, deliver_at }) {
            Ok(()) => true,
            Err(e) => {
                debug!("{}: envelope to {} lost: {}", self.address, to, e);
                false
            }
        }
    }
}
