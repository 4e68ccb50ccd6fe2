//! Deterministic digests of a replica's replicated state.
//!
//! Equal digests are necessary but not sufficient evidence that two replicas
//! hold equivalent state. Mismatched digests prove divergence. Nothing here
//! asserts; callers compare and decide.
//!
//! The replica's processing lock is held only to copy the session table or
//! membership (or to run the state machine's own digest). Hashing happens
//! after the lock is released.

use monkey_core::hashing::Hasher64;
use monkey_core::{Membership, MonkeyError, ReplicaHandle, ReplicaState, Result, SessionTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};

// Domain tags keep a membership stream from ever hashing like a session stream.
const MEMBERSHIP_TAG: &str = "monkey/membership/v1";
const SESSIONS_TAG: &str = "monkey/sessions/v1";

/// The three digests of one replica, taken one after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigestTriple {
    pub state_machine: u64,
    pub session: u64,
    pub membership: u64,
}

impl DigestTriple {
    /// Names the components that differ from `other`. Empty when all match.
    pub fn mismatches(&self, other: &DigestTriple) -> Vec<&'static str> {
        let mut differing = Vec::new();
        if self.state_machine != other.state_machine {
            differing.push("state_machine");
        }
        if self.session != other.session {
            differing.push("session");
        }
        if self.membership != other.membership {
            differing.push("membership");
        }
        differing
    }
}

impl fmt::Display for DigestTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sm={:016x} session={:016x} membership={:016x}",
            self.state_machine, self.session, self.membership
        )
    }
}

/// Returns the state machine's own digest.
///
/// Fails with [`MonkeyError::Computation`] if the state machine cannot hash
/// itself. That failure is fatal to the calling test.
pub fn state_machine_digest<H: ReplicaHandle>(handle: &H) -> Result<u64> {
    let result = handle.with_state(|state| state.state_machine_digest());
    result.map_err(|e| computation_failure(handle, e))
}

/// Digest of the replica's client session table.
pub fn session_digest<H: ReplicaHandle>(handle: &H) -> u64 {
    let sessions = handle.with_state(|state| state.session_table().clone());
    hash_sessions(&sessions)
}

/// Digest of the replica's membership, independent of internal ordering.
pub fn membership_digest<H: ReplicaHandle>(handle: &H) -> u64 {
    let membership = handle.with_state(|state| state.membership().clone());
    hash_membership(&membership)
}

/// All three digests of a replica, taken from one view of its state.
/// Hashing happens after the state has been released.
pub fn digests<H: ReplicaHandle>(handle: &H) -> Result<DigestTriple> {
    let (state_machine, sessions, membership) = handle.with_state(|state| {
        (
            state.state_machine_digest(),
            state.session_table().clone(),
            state.membership().clone(),
        )
    });
    let triple = DigestTriple {
        state_machine: state_machine.map_err(|e| computation_failure(handle, e))?,
        session: hash_sessions(&sessions),
        membership: hash_membership(&membership),
    };
    debug!(
        "group {} replica {} digests {}",
        handle.group_id(),
        handle.replica_id(),
        triple
    );
    Ok(triple)
}

fn computation_failure<H: ReplicaHandle>(handle: &H, e: MonkeyError) -> MonkeyError {
    let (group_id, replica_id) = (handle.group_id(), handle.replica_id());
    error!(
        "group {} replica {} failed to compute state machine digest: {}",
        group_id, replica_id, e
    );
    match e {
        already @ MonkeyError::Computation { .. } => already,
        other => MonkeyError::computation(group_id, replica_id, other.to_string()),
    }
}

pub fn hash_membership(membership: &Membership) -> u64 {
    let mut hasher = Hasher64::new();
    hasher.write_str(MEMBERSHIP_TAG);
    hasher.write_u64(membership.config_change_id);

    let mut voters: Vec<_> = membership.addresses.iter().collect();
    voters.sort();
    hasher.write_u64(voters.len() as u64);
    for (replica_id, address) in voters {
        hasher.write_u64(replica_id.value());
        hasher.write_str(address);
    }

    let mut non_voting: Vec<_> = membership.non_voting.iter().collect();
    non_voting.sort();
    hasher.write_u64(non_voting.len() as u64);
    for (replica_id, address) in non_voting {
        hasher.write_u64(replica_id.value());
        hasher.write_str(address);
    }

    let mut removed: Vec<_> = membership.removed.iter().collect();
    removed.sort();
    hasher.write_u64(removed.len() as u64);
    for replica_id in removed {
        hasher.write_u64(replica_id.value());
    }

    hasher.finish()
}

pub fn hash_sessions(table: &SessionTable) -> u64 {
    let mut hasher = Hasher64::new();
    hasher.write_str(SESSIONS_TAG);

    let mut sessions: Vec<_> = table.sessions.values().collect();
    sessions.sort_by_key(|session| session.client_id);
    hasher.write_u64(sessions.len() as u64);
    for session in sessions {
        hasher.write_u64(session.client_id.value());
        hasher.write_u64(session.responded_up_to);
        hasher.write_u64(session.history.len() as u64);
        // BTreeMap keeps the history series-ordered
        for (series_id, result) in &session.history {
            hasher.write_u64(*series_id);
            hasher.write_bytes(result);
        }
    }

    hasher.finish()
}
