//! Broadcast channel abstraction

use async_trait::async_trait;
use covault_core::EventEnvelope;

/// Error type for channel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The local endpoint is no longer attached to a hub.
    #[error("channel closed")]
    Closed,

    /// An inbound payload could not be decoded.
    #[error("malformed event payload: {message}")]
    Codec {
        /// Decoder error description
        message: String,
    },
}

/// Standard Result type for channel operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Bidirectional event stream to all other live participants.
///
/// Delivery is at-least-once and unordered across senders; duplicates are
/// possible. Implementations never deliver a broadcast back to its sender
/// (the sender applies its own events locally before broadcasting).
#[async_trait]
pub trait SyncChannel: Send {
    /// Broadcast an envelope to all other participants. Unreachable peers
    /// are skipped, not an error.
    async fn broadcast(&self, envelope: EventEnvelope) -> Result<()>;

    /// Receive the next inbound envelope. `None` means the channel closed.
    async fn recv(&mut self) -> Option<EventEnvelope>;
}
