//! The convergent access-session state
//!
//! `AccessSession` is the single mutable entity whose convergent state
//! matters. It is mutated exclusively through the coordinator's merge
//! function, never directly; replicas synchronize by exchanging events, not
//! state.

use crate::config::SessionConfig;
use crate::types::{EpochId, ParticipantId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of one access request.
///
/// Phases are linearly ordered and only ever move forward within an epoch;
/// the derived ordering is what the merge function compares against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Phase {
    /// No request in flight.
    #[default]
    Idle,
    /// A requester opened the lifecycle; grants are accumulating.
    Requested,
    /// Enough grants accumulated; the requester may open the document.
    ThresholdMet,
    /// The document is open; the epoch is terminal and auto-resets.
    Opened,
}

/// State of one in-flight (or idle) access-request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSession {
    requester: Option<ParticipantId>,
    grantors: IndexSet<ParticipantId>,
    threshold: u16,
    participants: u16,
    phase: Phase,
    epoch: EpochId,
}

impl AccessSession {
    /// Create an idle session at the initial epoch.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            requester: None,
            grantors: IndexSet::new(),
            threshold: config.threshold,
            participants: config.participants,
            phase: Phase::Idle,
            epoch: EpochId::initial(),
        }
    }

    /// The participant that opened the current request, if any.
    pub fn requester(&self) -> Option<ParticipantId> {
        self.requester
    }

    /// Participants that granted the current request, in grant order.
    ///
    /// The requester is a member from the moment the request opens.
    pub fn grantors(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.grantors.iter().copied()
    }

    /// Whether `participant` has granted the current request.
    pub fn has_granted(&self, participant: ParticipantId) -> bool {
        self.grantors.contains(&participant)
    }

    /// Number of grants accumulated for the current request.
    pub fn grant_count(&self) -> u16 {
        self.grantors.len() as u16
    }

    /// Configured threshold `t`.
    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// Configured participant count `n`.
    pub fn participants(&self) -> u16 {
        self.participants
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current epoch tag.
    pub fn epoch(&self) -> EpochId {
        self.epoch
    }

    /// Whether enough grants have accumulated to meet the threshold.
    pub fn threshold_met(&self) -> bool {
        self.grant_count() >= self.threshold
    }

    pub(crate) fn adopt_epoch(&mut self, epoch: EpochId, requester: ParticipantId) {
        self.epoch = epoch;
        self.requester = Some(requester);
        self.grantors.clear();
        self.grantors.insert(requester);
        self.phase = Phase::Requested;
    }

    pub(crate) fn insert_grantor(&mut self, participant: ParticipantId) -> bool {
        self.grantors.insert(participant)
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Clear back to `Idle` within the current epoch. The epoch counter is
    /// retained so the next request supersedes every event of this one.
    pub(crate) fn clear(&mut self) {
        self.requester = None;
        self.grantors.clear();
        self.phase = Phase::Idle;
    }

    /// Check the structural invariants. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.grantors.len() > usize::from(self.participants) {
            return Err(format!(
                "{} grantors exceed {} participants",
                self.grantors.len(),
                self.participants
            ));
        }
        match self.phase {
            Phase::Idle => {
                if self.requester.is_some() {
                    return Err("idle session has a requester".into());
                }
                if !self.grantors.is_empty() {
                    return Err("idle session has grantors".into());
                }
            }
            Phase::Requested | Phase::ThresholdMet | Phase::Opened => {
                let requester = self
                    .requester
                    .ok_or_else(|| "active session has no requester".to_string())?;
                if !self.grantors.contains(&requester) {
                    return Err(format!("requester {requester} is not a grantor"));
                }
                if self.phase >= Phase::ThresholdMet && !self.threshold_met() {
                    return Err(format!(
                        "phase {:?} with only {} of {} grants",
                        self.phase,
                        self.grant_count(),
                        self.threshold
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AccessSession {
        AccessSession::new(&SessionConfig::new(2, 3))
    }

    #[test]
    fn new_session_is_idle_at_initial_epoch() {
        let session = session();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.epoch(), EpochId::initial());
        assert_eq!(session.requester(), None);
        assert_eq!(session.grant_count(), 0);
        assert!(session.check_invariants().is_ok());
    }

    #[test]
    fn adopting_an_epoch_seeds_the_requester_as_grantor() {
        let mut session = session();
        let requester = ParticipantId::new(1);
        session.adopt_epoch(EpochId::initial().next(requester), requester);

        assert_eq!(session.phase(), Phase::Requested);
        assert_eq!(session.requester(), Some(requester));
        assert!(session.has_granted(requester));
        assert!(session.check_invariants().is_ok());
    }

    #[test]
    fn phases_order_linearly() {
        assert!(Phase::Idle < Phase::Requested);
        assert!(Phase::Requested < Phase::ThresholdMet);
        assert!(Phase::ThresholdMet < Phase::Opened);
    }

    #[test]
    fn grantor_order_is_preserved_for_display() {
        let mut session = session();
        let requester = ParticipantId::new(2);
        session.adopt_epoch(EpochId::initial().next(requester), requester);
        session.insert_grantor(ParticipantId::new(3));
        session.insert_grantor(ParticipantId::new(1));

        let order: Vec<u16> = session.grantors().map(|p| p.slot()).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn invariant_catches_phase_ahead_of_grants() {
        let mut session = session();
        let requester = ParticipantId::new(1);
        session.adopt_epoch(EpochId::initial().next(requester), requester);
        session.set_phase(Phase::ThresholdMet);
        assert!(session.check_invariants().is_err());
    }
}
