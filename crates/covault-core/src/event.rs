//! Domain events and broadcast envelopes
//!
//! Event names and payload shapes mirror the broadcast channel contract:
//! `request_permission`, `grant_permission`, `threshold_met`,
//! `document_opened`, `unauthorized_attempt`, `session_reset`. Grant
//! payload counts are denormalized for display; the authoritative state
//! transition is always recomputed locally from the merged grantor set,
//! never trusted from the payload.

use crate::types::{EpochId, ParticipantId};
use serde::{Deserialize, Serialize};

/// One domain event in the access-request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A participant opened a new request lifecycle.
    RequestPermission {
        /// The requesting participant
        user_id: ParticipantId,
    },
    /// A participant granted the active request. Counts and the grantor
    /// list are advisory display data.
    GrantPermission {
        /// Participant issuing the grant
        granting_user: ParticipantId,
        /// Participant whose request is being granted
        requesting_user: ParticipantId,
        /// Grants accumulated at the sender, for display
        current_count: u16,
        /// Threshold at the sender, for display
        needed_count: u16,
        /// Grantors at the sender, for display
        granted_users: Vec<ParticipantId>,
    },
    /// The sender observed the threshold being reached.
    ThresholdMet {
        /// Participant whose request met the threshold
        requesting_user: ParticipantId,
        /// Grantors at the sender, for display
        granted_users: Vec<ParticipantId>,
    },
    /// The requester opened the document.
    DocumentOpened {
        /// The opening participant
        user_id: ParticipantId,
    },
    /// A participant attempted access they were never granted.
    UnauthorizedAttempt {
        /// The offending participant
        user_id: ParticipantId,
        /// Human-readable description of the attempt
        message: String,
    },
    /// The session returned to idle.
    SessionReset,
}

impl SessionEvent {
    /// Short name used in logs, matching the wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestPermission { .. } => "request_permission",
            Self::GrantPermission { .. } => "grant_permission",
            Self::ThresholdMet { .. } => "threshold_met",
            Self::DocumentOpened { .. } => "document_opened",
            Self::UnauthorizedAttempt { .. } => "unauthorized_attempt",
            Self::SessionReset => "session_reset",
        }
    }
}

/// A domain event tagged with the epoch it was generated under and the
/// participant that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Epoch the event belongs to; mismatched epochs are discarded as stale.
    pub epoch: EpochId,
    /// Participant that emitted the event.
    pub origin: ParticipantId,
    /// The event itself.
    pub event: SessionEvent,
}

impl EventEnvelope {
    /// Wrap an event for broadcast.
    pub fn new(epoch: EpochId, origin: ParticipantId, event: SessionEvent) -> Self {
        Self {
            epoch,
            origin,
            event,
        }
    }

    /// Build an `unauthorized_attempt` envelope for a rejected open.
    pub fn unauthorized(epoch: EpochId, offender: ParticipantId, message: impl Into<String>) -> Self {
        Self::new(
            epoch,
            offender,
            SessionEvent::UnauthorizedAttempt {
                user_id: offender,
                message: message.into(),
            },
        )
    }
}
