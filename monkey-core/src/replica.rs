//! Interfaces the harness consumes from a replica of the system under test.

use crate::{GroupId, Membership, ReplicaId, Result, Role, SessionTable};
use serde::{Deserialize, Serialize};

/// Protocol-level introspection of a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolState {
    pub role: Role,
    pub term: u64,
    pub commit_index: u64,
    pub applied_index: u64,
    pub first_index: u64,
    pub last_index: u64,
    pub in_mem_log_size: u64,
}

impl ProtocolState {
    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    pub fn is_follower(&self) -> bool {
        self.role == Role::Follower
    }

    pub fn last_applied(&self) -> u64 {
        self.applied_index
    }

    pub fn in_mem_log_size(&self) -> u64 {
        self.in_mem_log_size
    }
}

/// State of a replica visible while its processing lock is held.
pub trait ReplicaState {
    /// Delegates to the state machine's own digest function.
    fn state_machine_digest(&self) -> Result<u64>;

    fn session_table(&self) -> &SessionTable;

    fn membership(&self) -> &Membership;

    fn protocol_state(&self) -> ProtocolState;
}

/// A consensus participant owned by the system under test.
///
/// The harness only borrows handles. `with_state` must run the closure while
/// serialized with the replica's own processing loop and must hold that
/// exclusion for no longer than the closure runs.
pub trait ReplicaHandle: Send + Sync {
    type State: ReplicaState;

    fn group_id(&self) -> GroupId;

    fn replica_id(&self) -> ReplicaId;

    /// Address the replica serves consensus traffic on.
    fn address(&self) -> &str;

    fn with_state<R>(&self, f: impl FnOnce(&Self::State) -> R) -> R;
}

/// Maps `(group, replica)` to a network address. May fail per peer.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, group_id: GroupId, replica_id: ReplicaId) -> Result<String>;
}
