//! # Monkey Harness
//!
//! Chaos-testing control surface for a replicated state machine. A test
//! driver uses it to
//!
//! - isolate one replica from the network, or degrade its links
//!   ([`PartitionController`], [`FaultPolicy`])
//! - inspect, drop or rewrite outbound traffic before it is sent
//!   ([`TrafficHooks`])
//! - compute digests of a replica's state machine, session table and
//!   membership to detect divergence ([`digest`])
//! - override capacity and concurrency tunables before the system starts
//!   ([`tunables`])
//! - dump a replica's protocol state and peer addresses ([`diagnostics`])
//! - run the system on an in-memory file system ([`MemFs`], [`get_test_fs`])
//!
//! The harness measures; it never decides whether a measurement is a
//! failure. Everything is single-process and in-process.
//!
//! ## Example
//!
//! ```rust
//! use monkey_harness::{FaultPolicy, HookVerdict, PartitionController, TrafficHooks};
//!
//! let partition = PartitionController::with_label("node-2");
//! partition.partition_node();
//! assert!(partition.is_partitioned());
//! partition.restore_partitioned_node();
//! assert_eq!(partition.policy(), FaultPolicy::Connected);
//!
//! let hooks = TrafficHooks::new();
//! hooks.set_message_batch_hook(|batch| {
//!     if batch.entry_count() > 100 {
//!         HookVerdict::Drop
//!     } else {
//!         HookVerdict::Pass
//!     }
//! });
//! ```

pub mod diagnostics;
pub mod digest;
pub mod hooks;
pub mod partition;
pub mod tunables;

pub use diagnostics::{dump_info, dump_info_to, DiagnosticReport, DiagnosticSink, TracingSink};
pub use digest::{
    digests, hash_membership, hash_sessions, membership_digest, session_digest,
    state_machine_digest, DigestTriple,
};
pub use hooks::{HookStats, HookVerdict, MessageBatchHook, StreamChunkHook, TrafficHooks};
pub use partition::{FaultPolicy, IoDecision, PartitionController};
pub use tunables::{TunableStore, Tunables};

pub use monkey_vfs::{get_test_fs, MemFs};
