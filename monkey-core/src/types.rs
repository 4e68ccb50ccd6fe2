//! # Core Types
//!
//! Identifiers and small value types used throughout the harness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a consensus group.
///
/// A group is a set of replicas maintaining one replicated log and state
/// machine. A single process may host replicas of many groups.
///
/// # Examples
///
/// ```rust
/// use monkey_core::GroupId;
///
/// let group = GroupId::new(100);
/// assert_eq!(group.value(), 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl GroupId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a replica within its consensus group.
///
/// Replica ids are ordered; the ordering is what canonical digests sort by.
///
/// # Examples
///
/// ```rust
/// use monkey_core::ReplicaId;
///
/// assert!(ReplicaId::new(1) < ReplicaId::new(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub u64);

impl ReplicaId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a client session.
///
/// [`ClientId::NOOP`] marks proposals made without a session; those are never
/// deduplicated.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ClientId(pub u64);

impl ClientId {
    pub const NOOP: ClientId = ClientId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::NOOP
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol role of a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
    Candidate,
    NonVoting,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => write!(f, "Leader"),
            Role::Follower => write!(f, "Follower"),
            Role::Candidate => write!(f, "Candidate"),
            Role::NonVoting => write!(f, "NonVoting"),
        }
    }
}

/// A replicated log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub index: u64,
    pub term: u64,
    pub client_id: ClientId,
    pub series_id: u64,
    pub responded_to: u64,
    pub cmd: bytes::Bytes,
}

impl Entry {
    /// Approximate in-memory footprint, used for log size introspection.
    pub fn size_bytes(&self) -> u64 {
        // index, term, client, series, responded_to
        (8 * 5 + self.cmd.len()) as u64
    }
}
