//! Scripted fault scenarios built from the harness primitives.

use crate::config::ReplicaConfig;
use crate::replica::{Proposal, SimEnvironment, SimReplica};
use anyhow::{ensure, Context};
use monkey_core::state_machine::KvStateMachine;
use monkey_core::{ClientId, GroupId, Membership, ReplicaId, Role};
use monkey_harness::digest::{digests, session_digest};
use monkey_harness::{dump_info, DigestTriple, TunableStore};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CatchUpConfig {
    pub receive_queue_len: u64,
    pub proposals: u64,
    /// Cycles both replicas run while the follower is partitioned
    pub partitioned_cycles: usize,
    /// Upper bound on cycles after the partition heals
    pub max_recovery_cycles: usize,
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            receive_queue_len: 4,
            proposals: 10,
            partitioned_cycles: 5,
            max_recovery_cycles: 200,
        }
    }
}

/// Measurements taken during [`partition_catch_up`]. Nothing here is
/// asserted; the caller decides what counts as a failure.
#[derive(Debug, Clone)]
pub struct CatchUpOutcome {
    pub leader_committed_while_partitioned: u64,
    pub follower_applied_while_partitioned: u64,
    /// Recovery cycles until the session digests matched, if they did
    pub cycles_to_converge: Option<usize>,
    pub leader: DigestTriple,
    pub follower: DigestTriple,
}

impl CatchUpOutcome {
    pub fn mismatches(&self) -> Vec<&'static str> {
        self.leader.mismatches(&self.follower)
    }
}

/// Leader A and follower B; B is partitioned while A commits a run of
/// proposals, then restored and given time to catch up.
pub fn partition_catch_up(
    store: &TunableStore,
    config: &CatchUpConfig,
) -> anyhow::Result<CatchUpOutcome> {
    store
        .set_receive_queue_len(config.receive_queue_len)
        .context("receive queue length must be set before replicas start")?;

    let env = SimEnvironment::new();
    let group = GroupId(1);
    let membership = Membership::with_voters([(ReplicaId(1), "node-a"), (ReplicaId(2), "node-b")]);

    let leader = SimReplica::new(
        ReplicaConfig::new(group, ReplicaId(1), "node-a")
            .with_role(Role::Leader)
            .with_membership(membership.clone()),
        KvStateMachine::new(),
        store,
        &env,
    )?;
    let follower = SimReplica::new(
        ReplicaConfig::new(group, ReplicaId(2), "node-b").with_membership(membership),
        KvStateMachine::new(),
        store,
        &env,
    )?;

    follower.partition().partition_node();
    for series in 1..=config.proposals {
        leader.propose(Proposal::new(
            ClientId(series % 3 + 1),
            series,
            format!("SET key{} value{}", series, series),
        ))?;
    }

    for _ in 0..config.partitioned_cycles {
        leader.step()?;
        follower.step()?;
    }
    let leader_committed = leader.committed_index();
    let follower_applied = follower.applied_index();
    info!(
        "while partitioned: leader committed {}, follower applied {}",
        leader_committed, follower_applied
    );
    ensure!(
        follower_applied == 0,
        "partitioned follower applied {} entries",
        follower_applied
    );

    follower.partition().restore_partitioned_node();
    let mut cycles_to_converge = None;
    for cycle in 1..=config.max_recovery_cycles {
        leader.step()?;
        follower.step()?;
        if follower.applied_index() == leader.applied_index()
            && session_digest(&follower) == session_digest(&leader)
        {
            cycles_to_converge = Some(cycle);
            break;
        }
    }

    dump_info(&leader, env.registry.as_ref());
    dump_info(&follower, env.registry.as_ref());

    Ok(CatchUpOutcome {
        leader_committed_while_partitioned: leader_committed,
        follower_applied_while_partitioned: follower_applied,
        cycles_to_converge,
        leader: digests(&leader)?,
        follower: digests(&follower)?,
    })
}
