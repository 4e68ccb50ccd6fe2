//! A deliberately simple primary/backup replica.
//!
//! Roles are static: the leader orders proposals, commits them locally and
//! streams them to every peer; followers append what they receive. There is
//! no election and no quorum. The replica exists to drive the harness
//! through realistic send, receive, apply and snapshot paths.

use crate::config::ReplicaConfig;
use crate::network_sim::{Payload, SimNetwork};
use crate::registry::NodeRegistry;
use crate::transport::SimTransport;
use bytes::Bytes;
use monkey_core::messages::split_snapshot;
use monkey_core::state_machine::StateMachine;
use monkey_core::vfs::FileSystem;
use monkey_core::{
    ClientId, Entry, GroupId, Membership, Message, MessageBatch, MessageKind, MonkeyError,
    ProtocolState, ReplicaHandle, ReplicaId, ReplicaState, Result, Role, SessionTable,
    StreamChunk,
};
use monkey_harness::{PartitionController, TrafficHooks, TunableStore, Tunables};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

const BOOTSTRAP_FILE: &str = "bootstrap";
const SNAPSHOT_PREFIX: &str = "snapshot-";

/// Shared plumbing a set of replicas runs on.
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    pub network: Arc<SimNetwork>,
    pub registry: Arc<NodeRegistry>,
    pub fs: Arc<dyn FileSystem>,
}

impl SimEnvironment {
    pub fn new() -> Self {
        Self::with_fs(monkey_vfs::get_test_fs())
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            network: Arc::new(SimNetwork::new()),
            registry: Arc::new(NodeRegistry::new()),
            fs,
        }
    }
}

impl Default for SimEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// A client proposal waiting in a proposal shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub client_id: ClientId,
    pub series_id: u64,
    pub responded_to: u64,
    pub cmd: Bytes,
}

impl Proposal {
    pub fn new(client_id: ClientId, series_id: u64, cmd: impl Into<Bytes>) -> Self {
        Self {
            client_id,
            series_id,
            responded_to: 0,
            cmd: cmd.into(),
        }
    }

    pub fn with_responded_to(mut self, responded_to: u64) -> Self {
        self.responded_to = responded_to;
        self
    }
}

#[derive(Debug)]
struct ReadRequest {
    ticket: u64,
    query: Bytes,
}

/// What one processing cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub received: usize,
    pub appended: usize,
    pub applied: usize,
    /// Apply workers that received a share of this cycle's entries
    pub apply_workers_used: usize,
    pub reads_served: usize,
    pub batches_sent: usize,
    pub chunks_sent: usize,
}

/// Written once at construction through the injected file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapRecord {
    pub group_id: GroupId,
    pub replica_id: ReplicaId,
    pub address: String,
    pub role: Role,
    pub membership: Membership,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotImage {
    index: u64,
    term: u64,
    state_machine: Vec<u8>,
    sessions: SessionTable,
    membership: Membership,
}

#[derive(Debug, Default, Clone, Copy)]
struct PeerProgress {
    match_index: u64,
    snapshot_sent_at: Option<u64>,
}

#[derive(Debug)]
struct SnapshotAssembly {
    index: u64,
    chunk_count: u64,
    chunks: Vec<Bytes>,
}

#[derive(Default)]
struct Outbound {
    messages: BTreeMap<ReplicaId, Vec<Message>>,
    chunks: Vec<StreamChunk>,
}

impl Outbound {
    fn push(&mut self, message: Message) {
        self.messages.entry(message.to).or_default().push(message);
    }
}

/// Replica state guarded by the processing lock.
pub struct ReplicaCore<S: StateMachine> {
    group_id: GroupId,
    replica_id: ReplicaId,
    role: Role,
    term: u64,
    state_machine: S,
    sessions: SessionTable,
    membership: Membership,
    log: VecDeque<Entry>,
    snapshot_index: u64,
    snapshot_term: u64,
    snapshot: Option<Bytes>,
    commit_index: u64,
    applied_index: u64,
    peers: BTreeMap<ReplicaId, PeerProgress>,
    incoming: Option<SnapshotAssembly>,
    pending_reads: Vec<(u64, u64, Bytes)>,
    read_results: HashMap<u64, Bytes>,
    cycle: u64,
}

impl<S: StateMachine> ReplicaState for ReplicaCore<S> {
    fn state_machine_digest(&self) -> Result<u64> {
        self.state_machine.digest()
    }

    fn session_table(&self) -> &SessionTable {
        &self.sessions
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    fn protocol_state(&self) -> ProtocolState {
        ProtocolState {
            role: self.role,
            term: self.term,
            commit_index: self.commit_index,
            applied_index: self.applied_index,
            first_index: self.first_index(),
            last_index: self.last_index(),
            in_mem_log_size: self.log.iter().map(Entry::size_bytes).sum(),
        }
    }
}

impl<S: StateMachine> ReplicaCore<S> {
    fn first_index(&self) -> u64 {
        self.snapshot_index + 1
    }

    fn last_index(&self) -> u64 {
        self.snapshot_index + self.log.len() as u64
    }

    fn entry(&self, index: u64) -> Option<&Entry> {
        if index <= self.snapshot_index {
            return None;
        }
        self.log.get((index - self.first_index()) as usize)
    }

    fn term_at(&self, index: u64) -> u64 {
        if index == self.snapshot_index {
            return self.snapshot_term;
        }
        self.entry(index).map(|e| e.term).unwrap_or(0)
    }

    fn peer_ids(&self) -> Vec<ReplicaId> {
        let mut peers: Vec<ReplicaId> = self
            .membership
            .addresses
            .keys()
            .chain(self.membership.non_voting.keys())
            .copied()
            .filter(|id| *id != self.replica_id)
            .collect();
        peers.sort();
        peers.dedup();
        peers
    }

    fn reply(&self, kind: MessageKind, to: ReplicaId, index: u64) -> Message {
        Message {
            term: self.term,
            log_index: index,
            commit: self.commit_index,
            ..Message::new(kind, self.group_id, self.replica_id, to)
        }
    }

    fn handle(&mut self, payload: Payload, out: &mut Outbound) {
        match payload {
            Payload::Batch(batch) => {
                for message in batch.messages {
                    if message.group_id != self.group_id || message.to != self.replica_id {
                        debug!("replica {} ignoring misrouted message", self.replica_id);
                        continue;
                    }
                    self.handle_message(message, out);
                }
            }
            Payload::Chunk(chunk) => self.handle_chunk(chunk, out),
        }
    }

    fn handle_message(&mut self, message: Message, out: &mut Outbound) {
        match message.kind {
            MessageKind::Replicate => self.handle_replicate(message, out),
            MessageKind::Heartbeat => {
                self.advance_commit(message.commit);
                out.push(self.reply(MessageKind::HeartbeatAck, message.from, self.last_index()));
            }
            MessageKind::ReplicateAck | MessageKind::HeartbeatAck => {
                let last = self.last_index();
                let progress = self.peers.entry(message.from).or_default();
                progress.match_index = progress.match_index.max(message.log_index.min(last));
            }
            MessageKind::SnapshotReceived => {
                let progress = self.peers.entry(message.from).or_default();
                progress.match_index = progress.match_index.max(message.log_index);
                progress.snapshot_sent_at = None;
                debug!(
                    "replica {} installed snapshot {} on replica {}",
                    message.from, message.log_index, self.replica_id
                );
            }
        }
    }

    fn handle_replicate(&mut self, message: Message, out: &mut Outbound) {
        let last = self.last_index();
        if message.log_index > last {
            // gap: tell the leader where this log ends
            out.push(self.reply(MessageKind::ReplicateAck, message.from, last));
            return;
        }
        for entry in message.entries {
            if entry.index == self.last_index() + 1 {
                self.log.push_back(entry);
            }
        }
        self.advance_commit(message.commit);
        out.push(self.reply(MessageKind::ReplicateAck, message.from, self.last_index()));
    }

    fn advance_commit(&mut self, leader_commit: u64) {
        let commit = leader_commit.min(self.last_index());
        if commit > self.commit_index {
            self.commit_index = commit;
        }
    }

    fn handle_chunk(&mut self, chunk: StreamChunk, out: &mut Outbound) {
        if !chunk.verify_checksum() {
            warn!(
                "replica {} rejecting corrupted snapshot chunk {}/{} of index {}",
                self.replica_id, chunk.chunk_id, chunk.chunk_count, chunk.index
            );
            self.incoming = None;
            return;
        }
        if chunk.index <= self.applied_index {
            out.push(self.reply(MessageKind::SnapshotReceived, chunk.from, self.applied_index));
            return;
        }

        let restart = match &self.incoming {
            Some(assembly) => assembly.index != chunk.index,
            None => true,
        };
        if restart {
            if chunk.chunk_id != 0 {
                debug!("replica {} waiting for the first chunk of a stream", self.replica_id);
                self.incoming = None;
                return;
            }
            self.incoming = Some(SnapshotAssembly {
                index: chunk.index,
                chunk_count: chunk.chunk_count,
                chunks: Vec::new(),
            });
        }

        let Some(assembly) = self.incoming.as_mut() else {
            return;
        };
        if chunk.chunk_id != assembly.chunks.len() as u64 {
            warn!(
                "replica {} got chunk {} out of order, dropping stream",
                self.replica_id, chunk.chunk_id
            );
            self.incoming = None;
            return;
        }
        assembly.chunks.push(chunk.data);
        if (assembly.chunks.len() as u64) < assembly.chunk_count {
            return;
        }

        let Some(assembly) = self.incoming.take() else {
            return;
        };
        let data: Vec<u8> = assembly.chunks.concat();
        match self.install_snapshot(&data) {
            Ok(index) => {
                info!("replica {} installed snapshot at index {}", self.replica_id, index);
                out.push(self.reply(MessageKind::SnapshotReceived, chunk.from, index));
            }
            Err(e) => error!("replica {} failed to install snapshot: {}", self.replica_id, e),
        }
    }

    fn install_snapshot(&mut self, data: &[u8]) -> Result<u64> {
        let image: SnapshotImage = bincode::deserialize(data)?;
        self.state_machine.recover_from_snapshot(&image.state_machine)?;
        self.sessions = image.sessions;
        self.membership = image.membership;

        self.log.retain(|e| e.index > image.index);
        if self.log.front().map_or(false, |e| e.index != image.index + 1) {
            self.log.clear();
        }
        self.snapshot_index = image.index;
        self.snapshot_term = image.term;
        self.commit_index = self.commit_index.max(image.index);
        self.applied_index = image.index;
        Ok(image.index)
    }

    fn append(&mut self, proposals: Vec<Proposal>) -> usize {
        let count = proposals.len();
        for proposal in proposals {
            let index = self.last_index() + 1;
            self.log.push_back(Entry {
                index,
                term: self.term,
                client_id: proposal.client_id,
                series_id: proposal.series_id,
                responded_to: proposal.responded_to,
                cmd: proposal.cmd,
            });
        }
        // single-copy commit: the leader does not wait for followers
        self.commit_index = self.last_index();
        count
    }

    /// Applies at most `limit` committed entries, split into contiguous runs
    /// across `workers` apply workers. Runs are applied in log order. With
    /// zero workers nothing is applied.
    fn apply_committed(&mut self, limit: u64, workers: u64) -> Result<(usize, usize)> {
        let budget = limit.min(self.commit_index.saturating_sub(self.applied_index));
        if budget == 0 || workers == 0 {
            return Ok((0, 0));
        }
        let run_len = budget.div_ceil(workers);
        let mut applied = 0;
        let mut workers_used = 0;
        while applied < budget {
            let run = run_len.min(budget - applied);
            for _ in 0..run {
                let index = self.applied_index + 1;
                let entry = self.entry(index).cloned().ok_or_else(|| {
                    MonkeyError::internal(format!("committed entry {} missing from log", index))
                })?;
                self.apply_entry(&entry)?;
                self.applied_index = index;
            }
            applied += run;
            workers_used += 1;
        }
        trace!(
            "replica {} applied {} entries on {} workers",
            self.replica_id,
            applied,
            workers_used
        );
        Ok((applied as usize, workers_used))
    }

    fn apply_entry(&mut self, entry: &Entry) -> Result<()> {
        if entry.client_id.is_noop() {
            self.state_machine.apply(&entry.cmd)?;
            return Ok(());
        }
        if self
            .sessions
            .applied_result(entry.client_id, entry.series_id)
            .is_some()
        {
            debug!(
                "replica {} skipping duplicate proposal {} of client {}",
                self.replica_id, entry.series_id, entry.client_id
            );
            return Ok(());
        }
        let result = self.state_machine.apply(&entry.cmd)?;
        self.sessions
            .register(entry.client_id)
            .clear_to(entry.responded_to);
        self.sessions.record(entry.client_id, entry.series_id, result);
        Ok(())
    }

    fn serve_reads(&mut self) -> Result<usize> {
        let pending = std::mem::take(&mut self.pending_reads);
        let mut served = 0;
        for (ticket, read_index, query) in pending {
            if self.applied_index < read_index {
                self.pending_reads.push((ticket, read_index, query));
                continue;
            }
            let result = self.state_machine.lookup(&query)?;
            self.read_results.insert(ticket, result);
            served += 1;
        }
        Ok(served)
    }

    fn replicate(&mut self, config: &ReplicaConfig, stream_limit: u64, out: &mut Outbound) {
        let last = self.last_index();
        let mut streams_started = 0;
        for peer in self.peer_ids() {
            let progress = self.peers.get(&peer).copied().unwrap_or_default();
            if progress.match_index >= last {
                let heartbeat = Message {
                    term: self.term,
                    commit: self.commit_index,
                    ..Message::new(MessageKind::Heartbeat, self.group_id, self.replica_id, peer)
                };
                out.push(heartbeat);
                continue;
            }

            let next = progress.match_index + 1;
            if next < self.first_index() {
                let Some(image) = self.snapshot.clone() else {
                    continue;
                };
                if let Some(sent_at) = progress.snapshot_sent_at {
                    if self.cycle - sent_at < config.snapshot_resend_cycles {
                        continue;
                    }
                }
                if streams_started >= stream_limit {
                    continue;
                }
                streams_started += 1;
                self.peers.entry(peer).or_default().snapshot_sent_at = Some(self.cycle);
                debug!(
                    "replica {} streaming snapshot {} to replica {}",
                    self.replica_id, self.snapshot_index, peer
                );
                out.chunks.extend(split_snapshot(
                    self.group_id,
                    self.replica_id,
                    peer,
                    self.snapshot_index,
                    self.snapshot_term,
                    &image,
                    config.snapshot_chunk_size,
                ));
                continue;
            }

            let max = config.max_entries_per_message.max(1) as u64;
            let upto = last.min(next + max - 1);
            let entries: Vec<Entry> = (next..=upto)
                .filter_map(|index| self.entry(index).cloned())
                .collect();
            let prev = (next - 1, self.term_at(next - 1));
            out.push(Message::replicate(
                self.group_id,
                self.replica_id,
                peer,
                self.term,
                prev,
                self.commit_index,
                entries,
            ));
        }
    }
}

/// One simulated consensus participant.
pub struct SimReplica<S: StateMachine> {
    config: ReplicaConfig,
    tunables: Tunables,
    transport: SimTransport,
    fs: Arc<dyn FileSystem>,
    core: Mutex<ReplicaCore<S>>,
    proposal_shards: Vec<Mutex<VecDeque<Proposal>>>,
    read_queue: Mutex<VecDeque<ReadRequest>>,
    next_ticket: AtomicU64,
    shutdown: Notify,
}

impl<S: StateMachine> SimReplica<S> {
    /// Builds a replica, capturing (and freezing) `tunables`.
    pub fn new(
        config: ReplicaConfig,
        state_machine: S,
        tunables: &TunableStore,
        env: &SimEnvironment,
    ) -> Result<Self> {
        let captured = tunables.freeze();
        env.registry
            .add(config.group_id, config.replica_id, config.address.clone());
        env.network
            .register(config.address.clone(), captured.receive_queue_len as usize);

        let transport = SimTransport::new(
            config.group_id,
            config.replica_id,
            config.address.clone(),
            env.network.clone(),
            env.registry.clone(),
            config.seed,
        );

        write_bootstrap(env.fs.as_ref(), &config)?;

        let core = ReplicaCore {
            group_id: config.group_id,
            replica_id: config.replica_id,
            role: config.role,
            term: config.term,
            state_machine,
            sessions: SessionTable::new(),
            membership: config.membership.clone(),
            log: VecDeque::new(),
            snapshot_index: 0,
            snapshot_term: 0,
            snapshot: None,
            commit_index: 0,
            applied_index: 0,
            peers: BTreeMap::new(),
            incoming: None,
            pending_reads: Vec::new(),
            read_results: HashMap::new(),
            cycle: 0,
        };

        let proposal_shards = (0..captured.pending_proposal_shards)
            .map(|_| Mutex::new(VecDeque::new()))
            .collect();

        info!(
            "replica {} of group {} started at {} as {}",
            config.replica_id, config.group_id, config.address, config.role
        );

        Ok(Self {
            config,
            tunables: captured,
            transport,
            fs: env.fs.clone(),
            core: Mutex::new(core),
            proposal_shards,
            read_queue: Mutex::new(VecDeque::new()),
            next_ticket: AtomicU64::new(1),
            shutdown: Notify::new(),
        })
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// The tunables this replica captured at construction.
    pub fn tunables(&self) -> Tunables {
        self.tunables
    }

    pub fn partition(&self) -> &Arc<PartitionController> {
        self.transport.partition()
    }

    pub fn hooks(&self) -> &Arc<TrafficHooks> {
        self.transport.hooks()
    }

    pub fn transport(&self) -> &SimTransport {
        &self.transport
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.core.lock().protocol_state()
    }

    pub fn committed_index(&self) -> u64 {
        self.core.lock().commit_index
    }

    pub fn applied_index(&self) -> u64 {
        self.core.lock().applied_index
    }

    /// Queues a proposal. Only the leader accepts proposals.
    pub fn propose(&self, proposal: Proposal) -> Result<()> {
        if self.config.role != Role::Leader {
            return Err(MonkeyError::internal(format!(
                "replica {} is not the leader",
                self.config.replica_id
            )));
        }
        let capacity = self.tunables.incoming_proposals_max_len as usize;
        if self.proposal_shards.is_empty() {
            return Err(MonkeyError::QueueFull {
                queue: "proposals",
                capacity: 0,
            });
        }
        let shard = (proposal.client_id.value() % self.proposal_shards.len() as u64) as usize;
        let mut queue = self.proposal_shards[shard].lock();
        if queue.len() >= capacity {
            return Err(MonkeyError::QueueFull {
                queue: "proposals",
                capacity,
            });
        }
        queue.push_back(proposal);
        Ok(())
    }

    /// Queues a read-index request and returns its ticket.
    pub fn read_index(&self, query: impl Into<Bytes>) -> Result<u64> {
        let capacity = self.tunables.incoming_read_index_max_len as usize;
        let mut queue = self.read_queue.lock();
        if queue.len() >= capacity {
            return Err(MonkeyError::QueueFull {
                queue: "read_index",
                capacity,
            });
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        queue.push_back(ReadRequest {
            ticket,
            query: query.into(),
        });
        Ok(ticket)
    }

    /// Takes the result of a served read-index request.
    pub fn take_read_result(&self, ticket: u64) -> Option<Bytes> {
        self.core.lock().read_results.remove(&ticket)
    }

    /// Runs one processing cycle. Network I/O happens outside the processing
    /// lock.
    pub fn step(&self) -> Result<StepReport> {
        let inbound = self.transport.receive();
        let proposals = self.drain_proposals();
        let reads: Vec<ReadRequest> = self.read_queue.lock().drain(..).collect();

        let mut out = Outbound::default();
        let mut report = StepReport {
            received: inbound.len(),
            ..StepReport::default()
        };
        {
            let mut core = self.core.lock();
            core.cycle += 1;
            for payload in inbound {
                core.handle(payload, &mut out);
            }
            if core.role == Role::Leader {
                report.appended = core.append(proposals);
            }
            let read_index = core.commit_index;
            for read in reads {
                core.pending_reads.push((read.ticket, read_index, read.query));
            }
            let (applied, workers_used) = core.apply_committed(
                self.tunables.task_batch_size,
                self.tunables.apply_worker_count,
            )?;
            report.applied = applied;
            report.apply_workers_used = workers_used;
            report.reads_served = core.serve_reads()?;
            if core.role == Role::Leader {
                core.replicate(&self.config, self.tunables.snapshot_worker_count, &mut out);
            }
        }

        for (to, messages) in out.messages {
            let batch = MessageBatch::new(self.config.address.clone(), messages);
            if self.transport.send_batch(to, batch) {
                report.batches_sent += 1;
            }
        }
        for chunk in out.chunks {
            if self.transport.send_chunk(chunk) {
                report.chunks_sent += 1;
            }
        }
        Ok(report)
    }

    /// Snapshots the state machine and session table at the applied index
    /// and truncates the log. Returns the snapshot index, or `None` if
    /// nothing was applied since the last compaction.
    pub fn compact(&self) -> Result<Option<u64>> {
        let (index, data) = {
            let mut core = self.core.lock();
            let index = core.applied_index;
            if index <= core.snapshot_index {
                return Ok(None);
            }
            let term = core.term_at(index);
            let image = SnapshotImage {
                index,
                term,
                state_machine: core.state_machine.save_snapshot()?,
                sessions: core.sessions.clone(),
                membership: core.membership.clone(),
            };
            let data = Bytes::from(bincode::serialize(&image)?);
            core.log.retain(|e| e.index > index);
            core.snapshot_index = index;
            core.snapshot_term = term;
            core.snapshot = Some(data.clone());
            (index, data)
        };

        self.persist_snapshot(index, &data)?;
        info!(
            "replica {} compacted log up to index {} ({} bytes)",
            self.config.replica_id,
            index,
            data.len()
        );
        Ok(Some(index))
    }

    fn persist_snapshot(&self, index: u64, data: &[u8]) -> Result<()> {
        let dir = &self.config.data_dir;
        let name = format!("{}{:020}", SNAPSHOT_PREFIX, index);
        let tmp = dir.join(format!("{}.tmp", name));
        let mut file = self.fs.create(&tmp)?;
        file.write_all(data)?;
        file.sync()?;
        self.fs.rename(&tmp, &dir.join(&name))?;

        for old in self.fs.list(dir)? {
            if old.starts_with(SNAPSHOT_PREFIX) && old != name {
                self.fs.remove(&dir.join(&old))?;
            }
        }
        Ok(())
    }

    fn drain_proposals(&self) -> Vec<Proposal> {
        let mut drained = Vec::new();
        for shard in &self.proposal_shards {
            drained.extend(shard.lock().drain(..));
        }
        drained
    }

    /// Signals the task started by [`spawn`](Self::spawn) to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl<S: StateMachine> SimReplica<S> {
    /// Runs [`step`](Self::step) every tick on a tokio task until
    /// [`shutdown`](Self::shutdown).
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let replica = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(replica.config.tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = replica.step() {
                            error!("replica {} step failed: {}", replica.config.replica_id, e);
                        }
                    }
                    _ = replica.shutdown.notified() => break,
                }
            }
            info!("replica {} stopped", replica.config.replica_id);
        })
    }
}

impl<S: StateMachine> ReplicaHandle for SimReplica<S> {
    type State = ReplicaCore<S>;

    fn group_id(&self) -> GroupId {
        self.config.group_id
    }

    fn replica_id(&self) -> ReplicaId {
        self.config.replica_id
    }

    fn address(&self) -> &str {
        &self.config.address
    }

    fn with_state<R>(&self, f: impl FnOnce(&Self::State) -> R) -> R {
        let core = self.core.lock();
        f(&core)
    }
}

fn write_bootstrap(fs: &dyn FileSystem, config: &ReplicaConfig) -> Result<()> {
    fs.mkdir_all(&config.data_dir)?;
    let record = BootstrapRecord {
        group_id: config.group_id,
        replica_id: config.replica_id,
        address: config.address.clone(),
        role: config.role,
        membership: config.membership.clone(),
    };
    let mut file = fs.create(&config.data_dir.join(BOOTSTRAP_FILE))?;
    file.write_all(&bincode::serialize(&record)?)?;
    file.sync()?;
    Ok(())
}

/// Reads back the record a replica wrote into `data_dir` at construction.
pub fn load_bootstrap(fs: &dyn FileSystem, data_dir: &Path) -> Result<BootstrapRecord> {
    let mut file = fs.open(&data_dir.join(BOOTSTRAP_FILE))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(bincode::deserialize(&data)?)
}
