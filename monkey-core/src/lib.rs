//! # Monkey Core
//!
//! Shared building blocks for the monkey chaos-testing harness.
//!
//! The harness never links against a concrete consensus engine. Everything it
//! needs from the system under test is expressed here as a small interface:
//!
//! - **ReplicaHandle / ReplicaState**: borrowed access to one participant's
//!   state machine, session table, membership and protocol state
//! - **AddressResolver**: `(group, replica) → address`, fallible per peer
//! - **FileSystem**: the storage abstraction, swappable for an in-memory one
//! - **MessageBatch / StreamChunk**: outbound payloads traffic hooks intercept
//! - **StateMachine**: the replicated state machine and its digest function
//!
//! Plus the common error type and identifiers.

pub mod error;
pub mod hashing;
pub mod membership;
pub mod messages;
pub mod replica;
pub mod session;
pub mod state_machine;
pub mod types;
pub mod vfs;

pub use error::*;
pub use membership::Membership;
pub use messages::{Message, MessageBatch, MessageKind, StreamChunk};
pub use replica::{AddressResolver, ProtocolState, ReplicaHandle, ReplicaState};
pub use session::{Session, SessionTable};
pub use types::*;
