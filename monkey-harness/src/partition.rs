//! Per-replica network isolation.
//!
//! The transport of the system under test calls [`PartitionController::decide`]
//! (or [`PartitionController::is_partitioned`]) on every send and receive
//! attempt, so a change takes effect on the very next I/O call. The whole
//! policy lives in one `AtomicU64`: the tag in the high byte, the parameter in
//! the low 56 bits.

use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const TAG_SHIFT: u32 = 56;
const PAYLOAD_MASK: u64 = (1 << TAG_SHIFT) - 1;

const TAG_CONNECTED: u64 = 0;
const TAG_ISOLATED: u64 = 1;
const TAG_DELAYED: u64 = 2;
const TAG_LOSSY: u64 = 3;

/// Fault model applied to every I/O attempt of one replica.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultPolicy {
    /// Traffic flows normally
    Connected,
    /// No connectivity at all to the outside world
    Isolated,
    /// Every message is held back for the given duration (microsecond
    /// resolution)
    Delayed(Duration),
    /// Every I/O attempt fails with the given probability (clamped to
    /// `0.0..=1.0`, stored with 32-bit precision)
    Lossy(f64),
}

impl FaultPolicy {
    fn encode(self) -> u64 {
        match self {
            FaultPolicy::Connected => TAG_CONNECTED << TAG_SHIFT,
            FaultPolicy::Isolated => TAG_ISOLATED << TAG_SHIFT,
            FaultPolicy::Delayed(delay) => {
                let micros = (delay.as_micros() as u64).min(PAYLOAD_MASK);
                (TAG_DELAYED << TAG_SHIFT) | micros
            }
            FaultPolicy::Lossy(probability) => {
                let p = if probability.is_nan() {
                    0.0
                } else {
                    probability.clamp(0.0, 1.0)
                };
                let fixed = (p * u32::MAX as f64).round() as u64;
                (TAG_LOSSY << TAG_SHIFT) | fixed
            }
        }
    }

    fn decode(word: u64) -> Self {
        let payload = word & PAYLOAD_MASK;
        match word >> TAG_SHIFT {
            TAG_ISOLATED => FaultPolicy::Isolated,
            TAG_DELAYED => FaultPolicy::Delayed(Duration::from_micros(payload)),
            TAG_LOSSY => FaultPolicy::Lossy(payload as f64 / u32::MAX as f64),
            _ => FaultPolicy::Connected,
        }
    }
}

impl FaultPolicy {
    /// The decision for every policy except [`FaultPolicy::Lossy`], which
    /// needs randomness and yields `None`.
    pub fn fixed_decision(self) -> Option<IoDecision> {
        match self {
            FaultPolicy::Connected => Some(IoDecision::Proceed),
            FaultPolicy::Isolated => Some(IoDecision::Block),
            FaultPolicy::Delayed(delay) => Some(IoDecision::Delay(delay)),
            FaultPolicy::Lossy(_) => None,
        }
    }

    pub fn decide_with<R: Rng + ?Sized>(self, rng: &mut R) -> IoDecision {
        match self {
            FaultPolicy::Lossy(p) => {
                if rng.gen_bool(p) {
                    IoDecision::Block
                } else {
                    IoDecision::Proceed
                }
            }
            fixed => fixed.fixed_decision().unwrap_or(IoDecision::Proceed),
        }
    }
}

impl fmt::Display for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultPolicy::Connected => write!(f, "connected"),
            FaultPolicy::Isolated => write!(f, "isolated"),
            FaultPolicy::Delayed(delay) => write!(f, "delayed({:?})", delay),
            FaultPolicy::Lossy(p) => write!(f, "lossy({:.3})", p),
        }
    }
}

/// What the transport should do with the current I/O attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDecision {
    Proceed,
    Block,
    Delay(Duration),
}

/// Atomic isolation state of one replica. Defaults to connected.
#[derive(Debug)]
pub struct PartitionController {
    label: String,
    state: AtomicU64,
}

impl Default for PartitionController {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionController {
    pub fn new() -> Self {
        Self::with_label("local")
    }

    /// Creates a controller whose log lines name `label`, usually the
    /// replica's address.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: AtomicU64::new(FaultPolicy::Connected.encode()),
        }
    }

    /// Puts the node into partition mode. All connectivity to the outside
    /// world stops with the next I/O attempt.
    pub fn partition_node(&self) {
        let previous = self.swap(FaultPolicy::Isolated);
        if previous == FaultPolicy::Isolated {
            debug!("{} already in partition test mode", self.label);
        } else {
            info!("{} entered partition test mode", self.label);
        }
    }

    /// Takes the node out of partition mode. Nothing else changes on the local
    /// node; repairing replicated state is up to the replication engine.
    pub fn restore_partitioned_node(&self) {
        let previous = self.swap(FaultPolicy::Connected);
        if previous == FaultPolicy::Connected {
            debug!("{} was not partitioned", self.label);
        } else {
            info!("{} restored from partition test mode ({})", self.label, previous);
        }
    }

    pub fn is_partitioned(&self) -> bool {
        self.state.load(Ordering::Acquire) >> TAG_SHIFT == TAG_ISOLATED
    }

    pub fn set_policy(&self, policy: FaultPolicy) {
        let previous = self.swap(policy);
        if previous != policy {
            info!(
                "{} fault policy changed from {} to {}",
                self.label, previous, policy
            );
        }
    }

    pub fn policy(&self) -> FaultPolicy {
        FaultPolicy::decode(self.state.load(Ordering::Acquire))
    }

    /// Evaluates the policy for one I/O attempt.
    pub fn decide(&self) -> IoDecision {
        self.decide_with(&mut rand::thread_rng())
    }

    /// Like [`decide`](Self::decide) with a caller supplied RNG, for
    /// reproducible lossy runs.
    pub fn decide_with<R: Rng + ?Sized>(&self, rng: &mut R) -> IoDecision {
        self.policy().decide_with(rng)
    }

    fn swap(&self, policy: FaultPolicy) -> FaultPolicy {
        FaultPolicy::decode(self.state.swap(policy.encode(), Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_is_connected() {
        let controller = PartitionController::new();
        assert!(!controller.is_partitioned());
        assert_eq!(controller.decide(), IoDecision::Proceed);
    }

    #[test]
    fn test_partition_and_restore_are_idempotent() {
        let controller = PartitionController::new();

        controller.partition_node();
        controller.partition_node();
        assert!(controller.is_partitioned());
        assert_eq!(controller.decide(), IoDecision::Block);

        controller.restore_partitioned_node();
        controller.restore_partitioned_node();
        assert!(!controller.is_partitioned());
        assert_eq!(controller.decide(), IoDecision::Proceed);
    }

    #[test]
    fn test_policy_encoding_keeps_parameters() {
        let controller = PartitionController::new();

        controller.set_policy(FaultPolicy::Delayed(Duration::from_millis(25)));
        assert_eq!(
            controller.policy(),
            FaultPolicy::Delayed(Duration::from_millis(25))
        );
        assert!(!controller.is_partitioned());

        controller.set_policy(FaultPolicy::Lossy(0.25));
        match controller.policy() {
            FaultPolicy::Lossy(p) => assert!((p - 0.25).abs() < 1e-6),
            other => panic!("unexpected policy {:?}", other),
        }

        controller.set_policy(FaultPolicy::Lossy(7.0));
        assert_eq!(controller.policy(), FaultPolicy::Lossy(1.0));
    }

    #[test]
    fn test_fixed_decision_only_for_deterministic_policies() {
        assert_eq!(FaultPolicy::Connected.fixed_decision(), Some(IoDecision::Proceed));
        assert_eq!(FaultPolicy::Isolated.fixed_decision(), Some(IoDecision::Block));
        assert_eq!(
            FaultPolicy::Delayed(Duration::from_millis(3)).fixed_decision(),
            Some(IoDecision::Delay(Duration::from_millis(3)))
        );
        assert_eq!(FaultPolicy::Lossy(0.5).fixed_decision(), None);
    }

    #[test]
    fn test_restore_clears_any_fault() {
        let controller = PartitionController::new();
        controller.set_policy(FaultPolicy::Delayed(Duration::from_secs(1)));
        controller.restore_partitioned_node();
        assert_eq!(controller.policy(), FaultPolicy::Connected);
    }

    #[test]
    fn test_lossy_extremes() {
        let controller = PartitionController::new();
        let mut rng = StdRng::seed_from_u64(7);

        controller.set_policy(FaultPolicy::Lossy(1.0));
        assert!((0..100).all(|_| controller.decide_with(&mut rng) == IoDecision::Block));

        controller.set_policy(FaultPolicy::Lossy(0.0));
        assert!((0..100).all(|_| controller.decide_with(&mut rng) == IoDecision::Proceed));
    }

    #[test]
    fn test_lossy_drops_roughly_the_configured_share() {
        let controller = PartitionController::new();
        let mut rng = StdRng::seed_from_u64(42);
        controller.set_policy(FaultPolicy::Lossy(0.3));

        let blocked = (0..10_000)
            .filter(|_| controller.decide_with(&mut rng) == IoDecision::Block)
            .count();
        assert!((2_500..3_500).contains(&blocked), "blocked {}", blocked);
    }

    #[test]
    fn test_partition_visible_across_threads() {
        let controller = std::sync::Arc::new(PartitionController::new());
        controller.partition_node();

        let reader = controller.clone();
        let seen = std::thread::spawn(move || reader.is_partitioned())
            .join()
            .unwrap();
        assert!(seen);
    }
}
