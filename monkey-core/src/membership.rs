use crate::ReplicaId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Membership configuration of a consensus group.
///
/// Members are kept in hash containers, so iteration order differs between
/// replicas holding the same logical configuration. Anything that needs a
/// stable view must sort, see [`Membership::sorted_members`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub config_change_id: u64,
    pub addresses: HashMap<ReplicaId, String>,
    pub non_voting: HashMap<ReplicaId, String>,
    pub removed: HashSet<ReplicaId>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a membership of voting replicas.
    pub fn with_voters<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (ReplicaId, S)>,
        S: Into<String>,
    {
        let mut membership = Self::new();
        for (replica_id, address) in members {
            membership.add_voter(replica_id, address);
        }
        membership
    }

    pub fn add_voter(&mut self, replica_id: ReplicaId, address: impl Into<String>) {
        self.non_voting.remove(&replica_id);
        self.addresses.insert(replica_id, address.into());
    }

    pub fn add_non_voting(&mut self, replica_id: ReplicaId, address: impl Into<String>) {
        self.non_voting.insert(replica_id, address.into());
    }

    pub fn remove(&mut self, replica_id: ReplicaId) {
        self.addresses.remove(&replica_id);
        self.non_voting.remove(&replica_id);
        self.removed.insert(replica_id);
    }

    pub fn is_member(&self, replica_id: ReplicaId) -> bool {
        self.addresses.contains_key(&replica_id) || self.non_voting.contains_key(&replica_id)
    }

    pub fn address_of(&self, replica_id: ReplicaId) -> Option<&str> {
        self.addresses
            .get(&replica_id)
            .or_else(|| self.non_voting.get(&replica_id))
            .map(String::as_str)
    }

    /// All voting and non-voting members, sorted by id.
    pub fn sorted_members(&self) -> Vec<ReplicaId> {
        let mut ids: Vec<ReplicaId> = self
            .addresses
            .keys()
            .chain(self.non_voting.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.addresses.len() + self.non_voting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
