//! Covault Core - Threshold Access Coordination Model
//!
//! This crate provides the pure model for threshold-gated document access:
//! a document becomes unlockable only once at least `t` of `n` registered
//! participants independently grant permission to a single requester.
//!
//! # Architecture
//!
//! - [`AccessSession`]: the single convergent entity — requester, grantor
//!   set, phase, and epoch for one access-request lifecycle.
//! - [`PermissionCoordinator`]: validates operations against the local
//!   session, mutates it exclusively through the merge function, and emits
//!   broadcastable domain events.
//! - [`SessionEvent`] / [`EventEnvelope`]: the domain events exchanged over
//!   the broadcast channel, each tagged with the epoch it was generated
//!   under.
//!
//! # Convergence
//!
//! Every participant applies the identical merge function
//! ([`PermissionCoordinator::apply`]) to both self-generated and received
//! events. Application is idempotent, phase transitions only move forward
//! within an epoch, and stale-epoch events are discarded, so replicas that
//! observe the same event multiset in any order (with duplicates) end up in
//! identical states.
//!
//! This crate is pure: no async, no I/O, no clocks. Timers and transport
//! live in `covault-agent` and `covault-sync`.

#![forbid(unsafe_code)]

/// Session configuration (threshold, participant count, timing windows)
pub mod config;

/// Coordinator state machine and merge function
pub mod coordinator;

/// Unified error handling
pub mod error;

/// Domain events and broadcast envelopes
pub mod event;

/// The convergent access-session state
pub mod session;

/// Identifier and token newtypes
pub mod types;

pub use config::SessionConfig;
pub use coordinator::{MergeOutcome, PermissionCoordinator};
pub use error::{AccessError, Result};
pub use event::{EventEnvelope, SessionEvent};
pub use session::{AccessSession, Phase};
pub use types::{EpochId, ParticipantId, ShareToken};
