use dashmap::DashMap;
use monkey_core::{AddressResolver, GroupId, MonkeyError, ReplicaId, Result};
use tracing::debug;

/// Process-wide `(group, replica) -> address` directory.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    addresses: DashMap<(GroupId, ReplicaId), String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, group_id: GroupId, replica_id: ReplicaId, address: impl Into<String>) {
        let address = address.into();
        debug!("registry: group {} replica {} at {}", group_id, replica_id, address);
        self.addresses.insert((group_id, replica_id), address);
    }

    pub fn remove(&self, group_id: GroupId, replica_id: ReplicaId) -> Option<String> {
        self.addresses
            .remove(&(group_id, replica_id))
            .map(|(_, address)| address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl AddressResolver for NodeRegistry {
    fn resolve(&self, group_id: GroupId, replica_id: ReplicaId) -> Result<String> {
        self.addresses
            .get(&(group_id, replica_id))
            .map(|entry| entry.value().clone())
            .ok_or(MonkeyError::Resolution {
                group_id,
                replica_id,
            })
    }
}
