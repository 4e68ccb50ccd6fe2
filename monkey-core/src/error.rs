//! # Error Types
//!
//! Error handling shared by the harness, the storage substitute and the
//! simulated system under test.

use crate::{GroupId, ReplicaId};
use thiserror::Error;

/// Error types that can occur while driving a chaos test.
///
/// The variants fall into the classes the harness distinguishes:
///
/// - **Fatal to the caller**: [`MonkeyError::Computation`], raised when a
///   state machine cannot produce a digest. Tests cannot meaningfully
///   continue and must not retry.
/// - **Swallowed**: [`MonkeyError::Resolution`], raised by address resolvers
///   for a single peer. The diagnostic dumper omits such peers.
/// - **Lifecycle**: [`MonkeyError::TunablesFrozen`], raised when a tunable is
///   overridden after a system instance already captured the values.
/// - **Simulated backpressure**: [`MonkeyError::QueueFull`].
///
/// # Examples
///
/// ```rust
/// use monkey_core::{GroupId, MonkeyError, ReplicaId};
///
/// let error = MonkeyError::computation(GroupId(1), ReplicaId(2), "no hash support");
/// assert!(!error.is_retryable());
/// ```
#[derive(Error, Debug)]
pub enum MonkeyError {
    /// A replica's state machine could not produce a digest
    #[error("Digest computation failed on group {group_id} replica {replica_id}: {message}")]
    Computation {
        group_id: GroupId,
        replica_id: ReplicaId,
        message: String,
    },

    /// A tunable was overridden after an instance had been constructed
    #[error("Tunable {name} cannot be changed after a system instance has been constructed")]
    TunablesFrozen { name: &'static str },

    /// The address of a peer could not be resolved
    #[error("Unable to resolve address of group {group_id} replica {replica_id}")]
    Resolution {
        group_id: GroupId,
        replica_id: ReplicaId,
    },

    /// A bounded queue rejected a request
    #[error("Queue {queue} is full (capacity {capacity})")]
    QueueFull { queue: &'static str, capacity: usize },

    /// Network communication failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// State machine execution failure
    #[error("State machine error: {message}")]
    StateMachine { message: String },

    /// Snapshot creation, transfer or recovery failure
    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    /// File system or other I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON configuration failure
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Unexpected internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results returned by the monkey crates.
pub type Result<T> = std::result::Result<T, MonkeyError>;

impl MonkeyError {
    /// Creates a digest computation error for the given replica.
    pub fn computation(
        group_id: GroupId,
        replica_id: ReplicaId,
        message: impl Into<String>,
    ) -> Self {
        Self::Computation {
            group_id,
            replica_id,
            message: message.into(),
        }
    }

    /// Creates a new network error with the given message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use monkey_core::MonkeyError;
    ///
    /// let error = MonkeyError::network("peer unreachable");
    /// assert!(error.is_retryable());
    /// ```
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new state machine error with the given message.
    pub fn state_machine(message: impl Into<String>) -> Self {
        Self::StateMachine {
            message: message.into(),
        }
    }

    /// Creates a new snapshot error with the given message.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Creates a new internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Determines if this error condition is potentially recoverable.
    ///
    /// Digest computation failures are never retryable: a test that cannot
    /// digest a replica's state cannot judge divergence.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::QueueFull { .. } | Self::Resolution { .. }
        )
    }
}
