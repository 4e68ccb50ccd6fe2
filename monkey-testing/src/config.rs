use monkey_core::{GroupId, Membership, ReplicaId, Role};
use std::path::PathBuf;
use std::time::Duration;

/// Static configuration of one simulated replica.
///
/// Capacity limits do not live here; they come from the frozen
/// [`Tunables`](monkey_harness::Tunables) captured at construction.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    pub group_id: GroupId,
    pub replica_id: ReplicaId,
    pub address: String,
    pub role: Role,
    pub term: u64,
    pub membership: Membership,
    pub data_dir: PathBuf,
    pub max_entries_per_message: usize,
    pub snapshot_chunk_size: usize,
    /// Cycles to wait for a snapshot acknowledgement before streaming again
    pub snapshot_resend_cycles: u64,
    pub tick_interval: Duration,
    /// Seed for the transport's fault RNG
    pub seed: Option<u64>,
}

impl ReplicaConfig {
    pub fn new(group_id: GroupId, replica_id: ReplicaId, address: impl Into<String>) -> Self {
        Self {
            group_id,
            replica_id,
            address: address.into(),
            role: Role::Follower,
            term: 1,
            membership: Membership::new(),
            data_dir: PathBuf::from(format!("/monkey/{}/{}", group_id, replica_id)),
            max_entries_per_message: 64,
            snapshot_chunk_size: 1024,
            snapshot_resend_cycles: 50,
            tick_interval: Duration::from_millis(2),
            seed: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_term(mut self, term: u64) -> Self {
        self.term = term;
        self
    }

    pub fn with_membership(mut self, membership: Membership) -> Self {
        self.membership = membership;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_max_entries_per_message(mut self, max: usize) -> Self {
        self.max_entries_per_message = max;
        self
    }

    pub fn with_snapshot_chunk_size(mut self, size: usize) -> Self {
        self.snapshot_chunk_size = size;
        self
    }

    pub fn with_snapshot_resend_cycles(mut self, cycles: u64) -> Self {
        self.snapshot_resend_cycles = cycles;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
