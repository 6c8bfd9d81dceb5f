//! Covault Shares - share resolution and key-material boundaries
//!
//! Supplies the opaque tokens the access protocol gates on, and the two
//! external-collaborator boundaries the coordinator only ever displays:
//! the share store and the blink-pattern key-derivation service.
//!
//! Shares here are opaque simulation tokens, not a cryptographically sound
//! secret-sharing scheme; this crate never participates in threshold
//! arithmetic.

#![forbid(unsafe_code)]

/// Error types for share resolution and key derivation
pub mod error;

/// Simulated per-participant share issuance
pub mod issue;

/// Blink-pattern key derivation boundary
pub mod keyderive;

/// Share resolution with deterministic local fallback
pub mod resolver;

/// External share-store collaborator
pub mod store;

pub use error::{Result, ShareError};
pub use issue::split_token_set;
pub use keyderive::{derive_key, BlinkSample, DerivedKey};
pub use resolver::ShareResolver;
pub use store::{FlakyShareStore, ShareStore, StaticShareStore, UnavailableShareStore};
