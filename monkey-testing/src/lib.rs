//! # Monkey Testing
//!
//! A simulated replicated system wired through the monkey harness, plus
//! scenarios and integration tests. Not a consensus implementation: roles
//! are static and the leader commits without a quorum.

pub mod config;
pub mod network_sim;
pub mod registry;
pub mod replica;
pub mod scenarios;
pub mod transport;

pub use config::ReplicaConfig;
pub use network_sim::{Envelope, NetworkStats, Payload, SimNetwork};
pub use registry::NodeRegistry;
pub use replica::{
    load_bootstrap, BootstrapRecord, Proposal, ReplicaCore, SimEnvironment, SimReplica,
    StepReport,
};
pub use scenarios::{partition_catch_up, CatchUpConfig, CatchUpOutcome};
pub use transport::{SimTransport, TransportStats};

use tracing_subscriber::EnvFilter;

/// Installs a test subscriber honouring `RUST_LOG` (default `warn`). Safe to
/// call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
