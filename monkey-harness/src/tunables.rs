//! Process-wide capacity and concurrency tunables of the system under test.
//!
//! A system instance reads the tunables exactly once, at construction, by
//! calling [`TunableStore::freeze`]. Overrides must therefore happen before
//! the first instance is built; afterwards every setter fails with
//! [`MonkeyError::TunablesFrozen`]. Values are never validated, so zero and
//! other degenerate settings are accepted as given.

use monkey_core::{MonkeyError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, error, info};

/// Immutable set of tunable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Number of independent proposal queues per replica
    pub pending_proposal_shards: u64,
    /// Maximum committed entries applied per processing cycle
    pub task_batch_size: u64,
    /// Capacity of each proposal queue
    pub incoming_proposals_max_len: u64,
    /// Capacity of the read-index request queue
    pub incoming_read_index_max_len: u64,
    /// Capacity of a replica's receive queue
    pub receive_queue_len: u64,
    /// Maximum concurrent outbound snapshot streams
    pub snapshot_worker_count: u64,
    /// Number of apply workers
    pub apply_worker_count: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            pending_proposal_shards: 16,
            task_batch_size: 512,
            incoming_proposals_max_len: 2048,
            incoming_read_index_max_len: 4096,
            receive_queue_len: 1024,
            snapshot_worker_count: 64,
            apply_worker_count: 16,
        }
    }
}

impl Tunables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses tunables from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_pending_proposal_shards(mut self, shards: u64) -> Self {
        self.pending_proposal_shards = shards;
        self
    }

    pub fn with_task_batch_size(mut self, size: u64) -> Self {
        self.task_batch_size = size;
        self
    }

    pub fn with_incoming_proposals_max_len(mut self, len: u64) -> Self {
        self.incoming_proposals_max_len = len;
        self
    }

    pub fn with_incoming_read_index_max_len(mut self, len: u64) -> Self {
        self.incoming_read_index_max_len = len;
        self
    }

    pub fn with_receive_queue_len(mut self, len: u64) -> Self {
        self.receive_queue_len = len;
        self
    }

    pub fn with_snapshot_worker_count(mut self, count: u64) -> Self {
        self.snapshot_worker_count = count;
        self
    }

    pub fn with_apply_worker_count(mut self, count: u64) -> Self {
        self.apply_worker_count = count;
        self
    }
}

#[derive(Debug, Default)]
struct StoreState {
    values: Tunables,
    frozen: bool,
}

/// Mutable holder of [`Tunables`] with a freeze lifecycle.
#[derive(Debug, Default)]
pub struct TunableStore {
    state: RwLock<StoreState>,
}

impl TunableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: Tunables) -> Self {
        Self {
            state: RwLock::new(StoreState {
                values,
                frozen: false,
            }),
        }
    }

    pub fn set_pending_proposal_shards(&self, shards: u64) -> Result<()> {
        self.update("pending_proposal_shards", shards, |t| {
            t.pending_proposal_shards = shards
        })
    }

    pub fn set_task_batch_size(&self, size: u64) -> Result<()> {
        self.update("task_batch_size", size, |t| t.task_batch_size = size)
    }

    pub fn set_incoming_proposals_max_len(&self, len: u64) -> Result<()> {
        self.update("incoming_proposals_max_len", len, |t| {
            t.incoming_proposals_max_len = len
        })
    }

    pub fn set_incoming_read_index_max_len(&self, len: u64) -> Result<()> {
        self.update("incoming_read_index_max_len", len, |t| {
            t.incoming_read_index_max_len = len
        })
    }

    pub fn set_receive_queue_len(&self, len: u64) -> Result<()> {
        self.update("receive_queue_len", len, |t| t.receive_queue_len = len)
    }

    pub fn set_snapshot_worker_count(&self, count: u64) -> Result<()> {
        self.update("snapshot_worker_count", count, |t| {
            t.snapshot_worker_count = count
        })
    }

    pub fn set_apply_worker_count(&self, count: u64) -> Result<()> {
        self.update("apply_worker_count", count, |t| t.apply_worker_count = count)
    }

    /// Replaces every value at once, for example with tunables loaded from
    /// JSON.
    pub fn load(&self, values: Tunables) -> Result<()> {
        let mut state = self.state.write();
        if state.frozen {
            error!("tunables already captured by a system instance, load rejected");
            return Err(MonkeyError::TunablesFrozen { name: "*" });
        }
        state.values = values;
        debug!("tunables loaded: {:?}", values);
        Ok(())
    }

    /// Current values, without freezing.
    pub fn snapshot(&self) -> Tunables {
        self.state.read().values
    }

    /// Marks the store as captured and returns the values in effect. Called by
    /// every system instance at construction.
    pub fn freeze(&self) -> Tunables {
        let mut state = self.state.write();
        if !state.frozen {
            info!("tunables frozen: {:?}", state.values);
            state.frozen = true;
        }
        state.values
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    /// Restores the defaults and unfreezes, for deterministic test runs.
    /// Instances already built keep the values they captured.
    pub fn reset(&self) {
        *self.state.write() = StoreState::default();
        debug!("tunables reset to defaults");
    }

    fn update(
        &self,
        name: &'static str,
        value: u64,
        apply: impl FnOnce(&mut Tunables),
    ) -> Result<()> {
        let mut state = self.state.write();
        if state.frozen {
            error!(
                "tunable {} set to {} after a system instance was constructed",
                name, value
            );
            return Err(MonkeyError::TunablesFrozen { name });
        }
        apply(&mut state.values);
        debug!("tunable {} set to {}", name, value);
        Ok(())
    }
}

/// The process-wide store.
pub fn global() -> &'static TunableStore {
    static GLOBAL: OnceLock<TunableStore> = OnceLock::new();
    GLOBAL.get_or_init(TunableStore::new)
}

pub fn set_pending_proposal_shards(shards: u64) -> Result<()> {
    global().set_pending_proposal_shards(shards)
}

pub fn set_task_batch_size(size: u64) -> Result<()> {
    global().set_task_batch_size(size)
}

pub fn set_incoming_proposals_max_len(len: u64) -> Result<()> {
    global().set_incoming_proposals_max_len(len)
}

pub fn set_incoming_read_index_max_len(len: u64) -> Result<()> {
    global().set_incoming_read_index_max_len(len)
}

pub fn set_receive_queue_len(len: u64) -> Result<()> {
    global().set_receive_queue_len(len)
}

pub fn set_snapshot_worker_count(count: u64) -> Result<()> {
    global().set_snapshot_worker_count(count)
}

pub fn set_apply_worker_count(count: u64) -> Result<()> {
    global().set_apply_worker_count(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_before_freeze() {
        let store = TunableStore::new();
        store.set_task_batch_size(8).unwrap();
        store.set_receive_queue_len(4).unwrap();
        store.set_pending_proposal_shards(2).unwrap();

        let values = store.freeze();
        assert_eq!(values.task_batch_size, 8);
        assert_eq!(values.receive_queue_len, 4);
        assert_eq!(values.pending_proposal_shards, 2);
        assert_eq!(values.snapshot_worker_count, Tunables::default().snapshot_worker_count);
    }

    #[test]
    fn test_setter_after_freeze_fails_loudly() {
        let store = TunableStore::new();
        let captured = store.freeze();
        assert!(store.is_frozen());

        let err = store.set_task_batch_size(1).unwrap_err();
        assert!(matches!(err, MonkeyError::TunablesFrozen { name: "task_batch_size" }));
        assert_eq!(store.snapshot(), captured);
        assert!(store.load(Tunables::default().with_apply_worker_count(1)).is_err());
    }

    #[test]
    fn test_degenerate_values_accepted() {
        let store = TunableStore::new();
        store.set_task_batch_size(0).unwrap();
        store.set_incoming_proposals_max_len(0).unwrap();
        store.set_apply_worker_count(u64::MAX).unwrap();

        let values = store.snapshot();
        assert_eq!(values.task_batch_size, 0);
        assert_eq!(values.incoming_proposals_max_len, 0);
        assert_eq!(values.apply_worker_count, u64::MAX);
        assert!(!store.is_frozen());
    }

    #[test]
    fn test_reset_restores_defaults_and_unfreezes() {
        let store = TunableStore::new();
        store.set_snapshot_worker_count(3).unwrap();
        store.freeze();

        store.reset();
        assert!(!store.is_frozen());
        assert_eq!(store.snapshot(), Tunables::default());
        store.set_snapshot_worker_count(5).unwrap();
    }

    #[test]
    fn test_from_json_keeps_defaults_for_missing_fields() {
        let tunables =
            Tunables::from_json(r#"{"receive_queue_len": 4, "task_batch_size": 32}"#).unwrap();
        assert_eq!(tunables.receive_queue_len, 4);
        assert_eq!(tunables.task_batch_size, 32);
        assert_eq!(tunables.apply_worker_count, 16);

        assert!(matches!(
            Tunables::from_json("{not json"),
            Err(MonkeyError::Config(_))
        ));
    }

    #[test]
    fn test_builder_and_load() {
        let store = TunableStore::new();
        let values = Tunables::new()
            .with_incoming_read_index_max_len(10)
            .with_snapshot_worker_count(1);
        store.load(values).unwrap();
        assert_eq!(store.freeze(), values);
    }
}
