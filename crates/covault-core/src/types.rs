//! Core identifier and token types for covault
//!
//! Participants are small dense integer slots (`user-1` through `user-n`),
//! matching how access sessions are configured. Epochs are compound keys so
//! that two participants who open competing requests concurrently still
//! converge on one winner everywhere.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Participant identifier, unique within one access session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ParticipantId(pub u16);

impl ParticipantId {
    /// Create a participant identifier from a 1-based slot number.
    pub fn new(slot: u16) -> Self {
        Self(slot)
    }

    /// Get the inner slot number.
    pub fn slot(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

impl From<u16> for ParticipantId {
    fn from(slot: u16) -> Self {
        Self(slot)
    }
}

impl From<ParticipantId> for u16 {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

/// Opaque share token bound to exactly one participant.
///
/// Immutable once issued. Never itself broadcast — only its presence or
/// absence is communicated; the raw value is used locally to simulate
/// reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareToken(String);

impl ShareToken {
    /// Wrap an issued token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value.
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compound epoch tag identifying one request lifecycle.
///
/// Epoch counters are local monotonic counters, not globally coordinated,
/// so two independently-incremented counters can collide in value. The
/// opener identity breaks the tie: between epochs with equal counters, the
/// one opened by the LOWER participant identifier wins. Every receiver
/// applies the same rule, so rival `Requested` events converge on the same
/// winner regardless of arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochId {
    /// Lifecycle counter, incremented on every transition out of `Idle`.
    pub counter: u64,
    /// Participant that opened this epoch.
    pub opener: ParticipantId,
}

impl EpochId {
    /// The pre-first-request epoch every session starts in.
    pub fn initial() -> Self {
        Self {
            counter: 0,
            opener: ParticipantId::default(),
        }
    }

    /// The epoch a request by `opener` would start from this one.
    pub fn next(&self, opener: ParticipantId) -> Self {
        Self {
            counter: self.counter + 1,
            opener,
        }
    }

    /// Whether this epoch wins against `other`.
    ///
    /// Higher counter wins; on a counter tie the lower opener identifier
    /// wins. Returns `false` for equal epochs.
    pub fn supersedes(&self, other: &Self) -> bool {
        match self.counter.cmp(&other.counter) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.opener < other.opener,
        }
    }
}

impl Default for EpochId {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch-{}/{}", self.counter, self.opener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_ordering_prefers_higher_counter() {
        let older = EpochId::initial().next(ParticipantId::new(3));
        let newer = older.next(ParticipantId::new(2));
        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));
    }

    #[test]
    fn epoch_tie_breaks_to_lower_opener() {
        let base = EpochId::initial();
        let by_one = base.next(ParticipantId::new(1));
        let by_two = base.next(ParticipantId::new(2));
        assert_eq!(by_one.counter, by_two.counter);
        assert!(by_one.supersedes(&by_two));
        assert!(!by_two.supersedes(&by_one));
    }

    #[test]
    fn epoch_never_supersedes_itself() {
        let epoch = EpochId::initial().next(ParticipantId::new(1));
        assert!(!epoch.supersedes(&epoch));
    }

    #[test]
    fn participant_display_uses_slot() {
        assert_eq!(ParticipantId::new(2).to_string(), "user-2");
    }
}
