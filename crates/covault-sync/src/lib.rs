//! Covault Sync - broadcast channel plumbing
//!
//! The access protocol coordinates entirely through an unordered,
//! at-least-once broadcast channel: every event a participant emits is
//! delivered to all other live participants, possibly duplicated, with no
//! ordering guarantee across senders (per-sender order to a given receiver
//! is preserved). This crate provides the channel abstraction, the JSON
//! wire codec, and an in-memory hub for local clusters and tests.

#![forbid(unsafe_code)]

/// Channel trait and errors
pub mod channel;

/// In-memory broadcast hub
pub mod memory;

/// Wire codec for event envelopes
pub mod wire;

pub use channel::{SyncChannel, SyncError};
pub use memory::{MemoryChannel, MemoryHub};
pub use wire::{decode_envelope, encode_envelope};
