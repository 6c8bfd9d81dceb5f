//! Error types for share resolution and key derivation

use covault_core::ParticipantId;

/// Error type for share-store access, issuance, and key derivation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    /// The external share store could not be reached or answered with an
    /// error.
    #[error("share store unavailable: {message}")]
    StoreUnavailable {
        /// What went wrong at the store
        message: String,
    },

    /// The store answered but holds no share for the participant, and
    /// fallback derivation is disabled.
    #[error("no share issued for {participant}")]
    NotIssued {
        /// Participant without an issued share
        participant: ParticipantId,
    },

    /// Share issuance was asked for an impossible split.
    #[error("invalid share split: {message}")]
    InvalidSplit {
        /// Why the split was rejected
        message: String,
    },

    /// Key derivation was given an empty blink sequence.
    #[error("no blink samples provided")]
    EmptyPattern,
}

impl ShareError {
    /// Create a store-unavailable error.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid-split error.
    pub fn invalid_split(message: impl Into<String>) -> Self {
        Self::InvalidSplit {
            message: message.into(),
        }
    }
}

/// Standard Result type for share operations.
pub type Result<T> = std::result::Result<T, ShareError>;
