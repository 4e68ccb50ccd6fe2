//! Partition a follower, commit on the leader, heal, and watch it catch up.

use monkey_core::state_machine::KvStateMachine;
use monkey_core::{ClientId, GroupId, Membership, ReplicaId, Role};
use monkey_harness::digest::{digests, session_digest};
use monkey_harness::TunableStore;
use monkey_testing::{
    init_test_logging, partition_catch_up, CatchUpConfig, Proposal, ReplicaConfig, SimEnvironment,
    SimReplica,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

#[test]
fn test_partition_catch_up_scenario() {
    init_test_logging();
    let store = TunableStore::new();
    let outcome = partition_catch_up(&store, &CatchUpConfig::default()).unwrap();

    assert_eq!(outcome.leader_committed_while_partitioned, 10);
    assert_eq!(outcome.follower_applied_while_partitioned, 0);
    assert!(outcome.cycles_to_converge.is_some());
    assert_eq!(outcome.leader.session, outcome.follower.session);
    assert!(outcome.mismatches().is_empty());
    assert_eq!(store.snapshot().receive_queue_len, 4);
}

#[test]
fn test_scenario_rejects_late_tunables() {
    init_test_logging();
    let store = TunableStore::new();
    store.freeze();
    assert!(partition_catch_up(&store, &CatchUpConfig::default()).is_err());
}

#[tokio::test]
async fn test_catch_up_with_running_replicas() {
    init_test_logging();
    let env = SimEnvironment::new();
    let store = TunableStore::new();
    store.set_receive_queue_len(4).unwrap();

    let members = Membership::with_voters([(ReplicaId(1), "node-a"), (ReplicaId(2), "node-b")]);
    let leader = Arc::new(
        SimReplica::new(
            ReplicaConfig::new(GroupId(1), ReplicaId(1), "node-a")
                .with_role(Role::Leader)
                .with_membership(members.clone())
                .with_tick_interval(Duration::from_millis(1)),
            KvStateMachine::new(),
            &store,
            &env,
        )
        .unwrap(),
    );
    let follower = Arc::new(
        SimReplica::new(
            ReplicaConfig::new(GroupId(1), ReplicaId(2), "node-b")
                .with_membership(members)
                .with_tick_interval(Duration::from_millis(1)),
            KvStateMachine::new(),
            &store,
            &env,
        )
        .unwrap(),
    );

    follower.partition().partition_node();
    let leader_task = leader.spawn();
    let follower_task = follower.spawn();

    for series in 1..=10 {
        leader
            .propose(Proposal::new(ClientId(1), series, format!("SET k{} v{}", series, series)))
            .unwrap();
    }

    let committed = timeout(Duration::from_secs(5), async {
        while leader.committed_index() < 10 {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(committed.is_ok());
    assert_eq!(follower.applied_index(), 0);

    follower.partition().restore_partitioned_node();
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut converged = false;
    while Instant::now() < deadline {
        if session_digest(follower.as_ref()) == session_digest(leader.as_ref()) {
            converged = true;
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert!(converged, "follower never caught up");

    leader.shutdown();
    follower.shutdown();
    leader_task.await.unwrap();
    follower_task.await.unwrap();

    let l = digests(leader.as_ref()).unwrap();
    let f = digests(follower.as_ref()).unwrap();
    assert!(l.mismatches(&f).is_empty());
}
