//! Tunables are captured once, when a replica is constructed.

use monkey_core::state_machine::KvStateMachine;
use monkey_core::{ClientId, GroupId, Membership, MonkeyError, ReplicaId, Role};
use monkey_harness::tunables::{self, TunableStore, Tunables};
use monkey_testing::{init_test_logging, Proposal, ReplicaConfig, SimEnvironment, SimReplica};

fn leader(env: &SimEnvironment, store: &TunableStore, id: u64) -> SimReplica<KvStateMachine> {
    SimReplica::new(
        ReplicaConfig::new(GroupId(id), ReplicaId(id), format!("node-{}", id))
            .with_role(Role::Leader)
            .with_membership(Membership::with_voters([(ReplicaId(id), format!("node-{}", id))])),
        KvStateMachine::new(),
        store,
        env,
    )
    .unwrap()
}

fn propose_many(replica: &SimReplica<KvStateMachine>, count: u64) {
    for series in 1..=count {
        replica
            .propose(Proposal::new(ClientId(1), series, format!("SET k{} v", series)))
            .unwrap();
    }
}

#[test]
fn test_task_batch_size_bounds_apply_per_cycle() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();

    let before = leader(&env, &store, 1);
    assert!(matches!(
        store.set_task_batch_size(3),
        Err(MonkeyError::TunablesFrozen { name: "task_batch_size" })
    ));

    store.reset();
    store.set_task_batch_size(3).unwrap();
    let after = leader(&env, &store, 2);
    assert_eq!(after.tunables().task_batch_size, 3);
    assert_eq!(before.tunables(), Tunables::default());

    propose_many(&after, 10);
    let mut per_cycle = Vec::new();
    while after.applied_index() < 10 {
        per_cycle.push(after.step().unwrap().applied);
    }
    assert_eq!(per_cycle, vec![3, 3, 3, 1]);

    propose_many(&before, 10);
    assert_eq!(before.step().unwrap().applied, 10);
}

#[test]
fn test_apply_worker_count_splits_each_cycle() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();
    store.set_task_batch_size(8).unwrap();
    store.set_apply_worker_count(3).unwrap();
    let node = leader(&env, &store, 1);
    assert_eq!(node.tunables().apply_worker_count, 3);

    propose_many(&node, 10);
    let first = node.step().unwrap();
    assert_eq!((first.applied, first.apply_workers_used), (8, 3));
    let second = node.step().unwrap();
    assert_eq!((second.applied, second.apply_workers_used), (2, 2));
    assert_eq!(node.applied_index(), 10);
}

#[test]
fn test_zero_apply_workers_stalls_apply() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();
    store.set_apply_worker_count(0).unwrap();
    let node = leader(&env, &store, 1);

    propose_many(&node, 4);
    for _ in 0..5 {
        let report = node.step().unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.apply_workers_used, 0);
    }
    assert_eq!(node.committed_index(), 4);
    assert_eq!(node.applied_index(), 0);
}

#[test]
fn test_receive_queue_len_bounds_inbox() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();
    store.set_receive_queue_len(2).unwrap();

    let members = Membership::with_voters([(ReplicaId(1), "a"), (ReplicaId(2), "b")]);
    let leader = SimReplica::new(
        ReplicaConfig::new(GroupId(1), ReplicaId(1), "a")
            .with_role(Role::Leader)
            .with_membership(members.clone()),
        KvStateMachine::new(),
        &store,
        &env,
    )
    .unwrap();
    let _follower = SimReplica::new(
        ReplicaConfig::new(GroupId(1), ReplicaId(2), "b").with_membership(members),
        KvStateMachine::new(),
        &store,
        &env,
    )
    .unwrap();

    for _ in 0..5 {
        leader.step().unwrap();
    }
    assert_eq!(env.network.pending("b"), 2);
    assert_eq!(env.network.stats().messages_dropped, 3);
}

#[test]
fn test_degenerate_proposal_capacity_rejects_everything() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();
    store.set_incoming_proposals_max_len(0).unwrap();
    let node = leader(&env, &store, 1);

    let err = node
        .propose(Proposal::new(ClientId(1), 1, "SET k v"))
        .unwrap_err();
    assert!(matches!(err, MonkeyError::QueueFull { capacity: 0, .. }));
}

#[test]
fn test_read_index_queue_is_bounded() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();
    store.set_incoming_read_index_max_len(1).unwrap();
    let node = leader(&env, &store, 1);

    node.read_index("k").unwrap();
    assert!(matches!(
        node.read_index("k"),
        Err(MonkeyError::QueueFull { queue: "read_index", .. })
    ));
    node.step().unwrap();
    node.read_index("k").unwrap();
}

#[test]
fn test_snapshot_worker_count_limits_streams() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();
    store.set_snapshot_worker_count(1).unwrap();

    let members = Membership::with_voters([
        (ReplicaId(1), "a"),
        (ReplicaId(2), "b"),
        (ReplicaId(3), "c"),
    ]);
    let leader = SimReplica::new(
        ReplicaConfig::new(GroupId(1), ReplicaId(1), "a")
            .with_role(Role::Leader)
            .with_membership(members.clone())
            .with_snapshot_chunk_size(1 << 20),
        KvStateMachine::new(),
        &store,
        &env,
    )
    .unwrap();
    let followers: Vec<_> = [(2u64, "b"), (3, "c")]
        .into_iter()
        .map(|(id, address)| {
            SimReplica::new(
                ReplicaConfig::new(GroupId(1), ReplicaId(id), address)
                    .with_membership(members.clone()),
                KvStateMachine::new(),
                &store,
                &env,
            )
            .unwrap()
        })
        .collect();

    for follower in &followers {
        follower.partition().partition_node();
    }
    propose_many(&leader, 3);
    leader.step().unwrap();
    for follower in &followers {
        follower.step().unwrap();
        follower.partition().restore_partitioned_node();
    }
    leader.compact().unwrap();

    // one stream per cycle: a single chunk each
    assert_eq!(leader.step().unwrap().chunks_sent, 1);
    assert_eq!(leader.step().unwrap().chunks_sent, 1);
}

#[test]
fn test_process_wide_setters() {
    init_test_logging();
    tunables::global().reset();
    tunables::set_apply_worker_count(2).unwrap();
    tunables::set_pending_proposal_shards(4).unwrap();
    assert_eq!(tunables::global().snapshot().apply_worker_count, 2);

    let env = SimEnvironment::new();
    let node = leader(&env, tunables::global(), 1);
    assert_eq!(node.tunables().pending_proposal_shards, 4);
    assert!(tunables::set_receive_queue_len(1).is_err());

    tunables::global().reset();
}
