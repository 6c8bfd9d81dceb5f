//! Unified error types for access coordination
//!
//! Protocol violations are reported to the initiating user only and never
//! broadcast. Authorization violations are security-relevant: the agent
//! reports them to the offending user AND broadcasts an
//! `unauthorized_attempt` event so every participant's observability counter
//! increments. No error mutates session state.

use crate::types::ParticipantId;
use serde::{Deserialize, Serialize};

/// Error type for all access-coordination operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AccessError {
    /// Another request is already active; only one lifecycle runs at a time.
    #[error("another request is already active (requester {requester})")]
    AlreadyRequested {
        /// Participant whose request is currently active
        requester: ParticipantId,
    },

    /// A grant or open arrived while no request lifecycle is active.
    #[error("no access request is active")]
    NoActiveRequest,

    /// The participant already granted the current request.
    #[error("{participant} has already granted this request")]
    DuplicateGrant {
        /// Participant that granted twice
        participant: ParticipantId,
    },

    /// Open attempted before enough grants accumulated.
    #[error("threshold not met: {granted} of {needed} grants")]
    ThresholdNotMet {
        /// Grants accumulated so far
        granted: u16,
        /// Grants required
        needed: u16,
    },

    /// Open attempted by a participant that was never granted access.
    #[error("{participant} is not authorized to open the document")]
    NotAuthorized {
        /// The offending participant
        participant: ParticipantId,
    },

    /// No share has been resolved for the participant yet.
    #[error("no share resolved for {participant}")]
    ShareUnavailable {
        /// Participant without a resolved share
        participant: ParticipantId,
    },

    /// The session configuration is rejected (e.g. threshold out of range).
    #[error("invalid session configuration: {message}")]
    InvalidConfig {
        /// What was wrong with the configuration
        message: String,
    },
}

impl AccessError {
    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error signals a party attempting access they were never
    /// granted. Such errors must be broadcast, not just reported locally.
    pub fn is_security_relevant(&self) -> bool {
        matches!(self, Self::NotAuthorized { .. })
    }
}

/// Standard Result type for access-coordination operations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authorization_violations_are_security_relevant() {
        let unauthorized = AccessError::NotAuthorized {
            participant: ParticipantId::new(3),
        };
        assert!(unauthorized.is_security_relevant());

        let protocol = AccessError::NoActiveRequest;
        assert!(!protocol.is_security_relevant());

        let duplicate = AccessError::DuplicateGrant {
            participant: ParticipantId::new(2),
        };
        assert!(!duplicate.is_security_relevant());
    }

    #[test]
    fn errors_render_participant_slots() {
        let err = AccessError::NotAuthorized {
            participant: ParticipantId::new(3),
        };
        assert_eq!(err.to_string(), "user-3 is not authorized to open the document");
    }
}
