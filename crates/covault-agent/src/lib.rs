//! Covault Agent - one actor per connected participant
//!
//! Each participant runs a [`ParticipantAgent`]: a single-threaded actor
//! owning one [`covault_core::PermissionCoordinator`] and its
//! [`covault_core::AccessSession`]. Local user actions and inbound channel
//! events are consumed one stimulus at a time, so the merge function is
//! applied serially and no locking is needed inside an agent. Concurrency
//! exists only across agents, coordinated entirely via the broadcast
//! channel.
//!
//! Self-generated events are applied locally through the same merge
//! function before being broadcast, guaranteeing that every replica —
//! including the originator — computes state the same way.

#![forbid(unsafe_code)]

/// The participant actor and its run loop
pub mod agent;

/// Clonable handle for driving an agent
pub mod handle;

pub use agent::ParticipantAgent;
pub use handle::{ActionOutcome, AgentError, AgentHandle, AgentSnapshot, UserAction};
