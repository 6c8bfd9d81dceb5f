//! Permission coordinator state machine
//!
//! Validates operations against the local [`AccessSession`], mutates it
//! exclusively through the merge function, and emits the canonical event
//! sequence for broadcast. The same merge function is applied to
//! self-generated events (before broadcasting) and to received events,
//! which is what guarantees convergence across participants despite
//! unordered, at-least-once delivery.

use crate::config::SessionConfig;
use crate::error::{AccessError, Result};
use crate::event::{EventEnvelope, SessionEvent};
use crate::session::{AccessSession, Phase};
use crate::types::ParticipantId;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Result of merging one event into the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The event changed local state.
    Applied,
    /// The event was a duplicate or is not justified by local state yet;
    /// nothing changed.
    NoOp,
    /// The event belongs to a superseded epoch (or to a newer lifecycle
    /// whose opening we have not seen) and was discarded.
    Stale,
}

impl MergeOutcome {
    /// Whether the event changed local state.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// The replicated state machine for one participant's view of the session.
pub struct PermissionCoordinator {
    local: ParticipantId,
    session: AccessSession,
    resolved: BTreeSet<ParticipantId>,
}

impl PermissionCoordinator {
    /// Create a coordinator for `local` with a validated configuration.
    pub fn new(local: ParticipantId, config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            local,
            session: AccessSession::new(config),
            resolved: BTreeSet::new(),
        })
    }

    /// The participant this coordinator belongs to.
    pub fn local(&self) -> ParticipantId {
        self.local
    }

    /// The current session state.
    pub fn session(&self) -> &AccessSession {
        &self.session
    }

    /// Record that a share has been resolved for `participant`.
    pub fn mark_share_resolved(&mut self, participant: ParticipantId) {
        self.resolved.insert(participant);
    }

    /// Whether a share has been resolved for `participant`.
    pub fn share_resolved(&self, participant: ParticipantId) -> bool {
        self.resolved.contains(&participant)
    }

    fn require_share(&self, participant: ParticipantId) -> Result<()> {
        if self.share_resolved(participant) {
            Ok(())
        } else {
            Err(AccessError::ShareUnavailable { participant })
        }
    }

    /// Open a new request lifecycle for `participant`.
    pub fn request_access(&mut self, participant: ParticipantId) -> Result<Vec<EventEnvelope>> {
        self.require_share(participant)?;
        if self.session.phase() != Phase::Idle {
            return Err(AccessError::AlreadyRequested {
                requester: self.session.requester().unwrap_or(participant),
            });
        }

        let epoch = self.session.epoch().next(participant);
        let envelope = EventEnvelope::new(
            epoch,
            participant,
            SessionEvent::RequestPermission {
                user_id: participant,
            },
        );
        let outcome = self.apply(&envelope);
        debug_assert!(outcome.is_applied());
        debug!(%participant, %epoch, "access requested");
        Ok(vec![envelope])
    }

    /// Grant the active request on behalf of `participant`.
    pub fn grant_access(&mut self, participant: ParticipantId) -> Result<Vec<EventEnvelope>> {
        self.require_share(participant)?;
        let requester = match self.session.phase() {
            Phase::Requested | Phase::ThresholdMet => self
                .session
                .requester()
                .ok_or(AccessError::NoActiveRequest)?,
            Phase::Idle | Phase::Opened => return Err(AccessError::NoActiveRequest),
        };
        if self.session.has_granted(participant) {
            return Err(AccessError::DuplicateGrant { participant });
        }

        // Counts are advisory display data; receivers recompute from their
        // own merged grantor set.
        let mut granted_users: Vec<ParticipantId> = self.session.grantors().collect();
        granted_users.push(participant);
        let envelope = EventEnvelope::new(
            self.session.epoch(),
            participant,
            SessionEvent::GrantPermission {
                granting_user: participant,
                requesting_user: requester,
                current_count: granted_users.len() as u16,
                needed_count: self.session.threshold(),
                granted_users: granted_users.clone(),
            },
        );
        let before = self.session.phase();
        let outcome = self.apply(&envelope);
        debug_assert!(outcome.is_applied());

        let mut envelopes = vec![envelope];
        if before < Phase::ThresholdMet && self.session.phase() == Phase::ThresholdMet {
            debug!(%requester, grants = granted_users.len(), "threshold met");
            envelopes.push(EventEnvelope::new(
                self.session.epoch(),
                participant,
                SessionEvent::ThresholdMet {
                    requesting_user: requester,
                    granted_users,
                },
            ));
        }
        Ok(envelopes)
    }

    /// Open the document as `participant`.
    ///
    /// Succeeds if and only if the threshold has been met and `participant`
    /// is the requester. A rejection of any other participant is
    /// security-relevant and must be broadcast by the caller (see
    /// [`AccessError::is_security_relevant`]).
    pub fn open_document(&mut self, participant: ParticipantId) -> Result<Vec<EventEnvelope>> {
        match self.session.phase() {
            Phase::Idle => Err(AccessError::NotAuthorized { participant }),
            _ if self.session.requester() != Some(participant) => {
                Err(AccessError::NotAuthorized { participant })
            }
            Phase::Requested => Err(AccessError::ThresholdNotMet {
                granted: self.session.grant_count(),
                needed: self.session.threshold(),
            }),
            Phase::Opened => Ok(Vec::new()),
            Phase::ThresholdMet => {
                let envelope = EventEnvelope::new(
                    self.session.epoch(),
                    participant,
                    SessionEvent::DocumentOpened {
                        user_id: participant,
                    },
                );
                let outcome = self.apply(&envelope);
                debug_assert!(outcome.is_applied());
                debug!(%participant, "document opened");
                Ok(vec![envelope])
            }
        }
    }

    /// Force the session back to idle. Always succeeds; returns the reset
    /// envelope when there was anything to clear.
    pub fn reset(&mut self) -> Vec<EventEnvelope> {
        let envelope = EventEnvelope::new(self.session.epoch(), self.local, SessionEvent::SessionReset);
        match self.apply(&envelope) {
            MergeOutcome::Applied => {
                debug!(epoch = %envelope.epoch, "session reset");
                vec![envelope]
            }
            _ => Vec::new(),
        }
    }

    /// Merge one event into the local session.
    ///
    /// Applied identically to self-generated and received events. All
    /// mutations are idempotent and phase only moves forward within an
    /// epoch; `session_reset` is the sanctioned return to idle.
    pub fn apply(&mut self, envelope: &EventEnvelope) -> MergeOutcome {
        let local_epoch = self.session.epoch();
        let outcome = if envelope.epoch == local_epoch {
            self.apply_in_epoch(envelope)
        } else if envelope.epoch.supersedes(&local_epoch) {
            match &envelope.event {
                SessionEvent::RequestPermission { user_id } => {
                    // The local replica missed (or lost) the opening of this
                    // lifecycle; adopt it wholesale.
                    self.session.adopt_epoch(envelope.epoch, *user_id);
                    if self.session.threshold_met() {
                        self.session.set_phase(Phase::ThresholdMet);
                    }
                    MergeOutcome::Applied
                }
                // A non-opening event from an unseen lifecycle cannot be
                // safely interpolated.
                _ => MergeOutcome::Stale,
            }
        } else {
            MergeOutcome::Stale
        };

        match outcome {
            MergeOutcome::Applied => {
                debug_assert!(self.session.check_invariants().is_ok());
            }
            MergeOutcome::NoOp | MergeOutcome::Stale => {
                trace!(
                    kind = envelope.event.kind(),
                    epoch = %envelope.epoch,
                    ?outcome,
                    "event discarded"
                );
            }
        }
        outcome
    }

    fn apply_in_epoch(&mut self, envelope: &EventEnvelope) -> MergeOutcome {
        match &envelope.event {
            // Already in this epoch; a duplicate opening changes nothing.
            SessionEvent::RequestPermission { .. } => MergeOutcome::NoOp,

            SessionEvent::GrantPermission { granting_user, .. } => match self.session.phase() {
                Phase::Requested | Phase::ThresholdMet => {
                    if self.session.insert_grantor(*granting_user) {
                        if self.session.phase() == Phase::Requested && self.session.threshold_met()
                        {
                            self.session.set_phase(Phase::ThresholdMet);
                        }
                        MergeOutcome::Applied
                    } else {
                        MergeOutcome::NoOp
                    }
                }
                // Post-reset straggler or grant after open.
                Phase::Idle | Phase::Opened => MergeOutcome::NoOp,
            },

            // Advisory: only advance when the local grantor set justifies it.
            SessionEvent::ThresholdMet { .. } => {
                if self.session.phase() == Phase::Requested && self.session.threshold_met() {
                    self.session.set_phase(Phase::ThresholdMet);
                    MergeOutcome::Applied
                } else {
                    MergeOutcome::NoOp
                }
            }

            SessionEvent::DocumentOpened { user_id } => {
                if self.session.phase() == Phase::ThresholdMet
                    && self.session.requester() == Some(*user_id)
                {
                    self.session.set_phase(Phase::Opened);
                    MergeOutcome::Applied
                } else {
                    MergeOutcome::NoOp
                }
            }

            // Observability only; counted by the agent, never state-bearing.
            SessionEvent::UnauthorizedAttempt { .. } => MergeOutcome::NoOp,

            SessionEvent::SessionReset => {
                if self.session.phase() == Phase::Idle {
                    MergeOutcome::NoOp
                } else {
                    self.session.clear();
                    MergeOutcome::Applied
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EpochId;

    fn coordinator(threshold: u16, participants: u16) -> PermissionCoordinator {
        let mut coordinator =
            PermissionCoordinator::new(ParticipantId::new(1), &SessionConfig::new(threshold, participants))
                .expect("valid config");
        for slot in 1..=participants {
            coordinator.mark_share_resolved(ParticipantId::new(slot));
        }
        coordinator
    }

    #[test]
    fn request_opens_a_new_epoch() {
        let mut c = coordinator(2, 3);
        let envelopes = c.request_access(ParticipantId::new(1)).expect("request");

        assert_eq!(envelopes.len(), 1);
        assert_eq!(c.session().phase(), Phase::Requested);
        assert_eq!(c.session().requester(), Some(ParticipantId::new(1)));
        assert_eq!(c.session().epoch().counter, 1);
        assert!(c.session().has_granted(ParticipantId::new(1)));
    }

    #[test]
    fn request_without_share_is_rejected() {
        let mut c = PermissionCoordinator::new(ParticipantId::new(1), &SessionConfig::new(2, 3))
            .expect("valid config");
        let err = c.request_access(ParticipantId::new(1)).unwrap_err();
        assert_eq!(
            err,
            AccessError::ShareUnavailable {
                participant: ParticipantId::new(1)
            }
        );
        assert_eq!(c.session().phase(), Phase::Idle);
    }

    #[test]
    fn second_request_is_rejected_while_active() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        let err = c.request_access(ParticipantId::new(2)).unwrap_err();
        assert_eq!(
            err,
            AccessError::AlreadyRequested {
                requester: ParticipantId::new(1)
            }
        );
    }

    #[test]
    fn grant_in_idle_fails_with_no_active_request() {
        let mut c = coordinator(2, 3);
        let err = c.grant_access(ParticipantId::new(2)).unwrap_err();
        assert_eq!(err, AccessError::NoActiveRequest);
        assert_eq!(c.session().phase(), Phase::Idle);
        assert_eq!(c.session().grant_count(), 0);
    }

    #[test]
    fn crossing_the_threshold_emits_threshold_met() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        let envelopes = c.grant_access(ParticipantId::new(2)).expect("grant");

        assert_eq!(envelopes.len(), 2);
        assert!(matches!(
            envelopes[1].event,
            SessionEvent::ThresholdMet { .. }
        ));
        assert_eq!(c.session().phase(), Phase::ThresholdMet);
    }

    #[test]
    fn duplicate_grant_is_rejected_without_mutation() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        let err = c.grant_access(ParticipantId::new(1)).unwrap_err();
        assert_eq!(
            err,
            AccessError::DuplicateGrant {
                participant: ParticipantId::new(1)
            }
        );
        assert_eq!(c.session().grant_count(), 1);
    }

    #[test]
    fn open_by_non_requester_is_not_authorized() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        c.grant_access(ParticipantId::new(2)).expect("grant");

        let err = c.open_document(ParticipantId::new(3)).unwrap_err();
        assert!(err.is_security_relevant());
        assert_eq!(c.session().phase(), Phase::ThresholdMet);
    }

    #[test]
    fn open_before_threshold_reports_pending_grants() {
        let mut c = coordinator(3, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        c.grant_access(ParticipantId::new(2)).expect("grant");

        let err = c.open_document(ParticipantId::new(1)).unwrap_err();
        assert_eq!(
            err,
            AccessError::ThresholdNotMet {
                granted: 2,
                needed: 3
            }
        );
    }

    #[test]
    fn open_in_idle_is_an_unauthorized_attempt() {
        let mut c = coordinator(2, 3);
        let err = c.open_document(ParticipantId::new(2)).unwrap_err();
        assert!(err.is_security_relevant());
    }

    #[test]
    fn full_lifecycle_then_reset_accepts_a_fresh_request() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        c.grant_access(ParticipantId::new(2)).expect("grant");
        c.open_document(ParticipantId::new(1)).expect("open");
        assert_eq!(c.session().phase(), Phase::Opened);

        let envelopes = c.reset();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(c.session().phase(), Phase::Idle);
        assert_eq!(c.session().requester(), None);
        assert_eq!(c.session().grant_count(), 0);

        c.request_access(ParticipantId::new(2)).expect("fresh request");
        assert_eq!(c.session().epoch().counter, 2);
        assert_eq!(c.session().requester(), Some(ParticipantId::new(2)));
    }

    #[test]
    fn reset_when_idle_emits_nothing() {
        let mut c = coordinator(2, 3);
        assert!(c.reset().is_empty());
    }

    #[test]
    fn threshold_of_one_is_met_at_request_time() {
        let mut c = coordinator(1, 3);
        c.request_access(ParticipantId::new(2)).expect("request");
        assert_eq!(c.session().phase(), Phase::ThresholdMet);
        c.open_document(ParticipantId::new(2)).expect("open");
        assert_eq!(c.session().phase(), Phase::Opened);
    }

    #[test]
    fn duplicate_grant_event_applies_once() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        let envelopes = c.grant_access(ParticipantId::new(2)).expect("grant");

        assert_eq!(c.apply(&envelopes[0]), MergeOutcome::NoOp);
        assert_eq!(c.session().grant_count(), 2);
    }

    #[test]
    fn stale_epoch_events_are_discarded() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        c.grant_access(ParticipantId::new(2)).expect("grant");
        c.open_document(ParticipantId::new(1)).expect("open");
        c.reset();
        c.request_access(ParticipantId::new(3)).expect("request");

        // A grant from the finished first lifecycle.
        let stale = EventEnvelope::new(
            EpochId::initial().next(ParticipantId::new(1)),
            ParticipantId::new(2),
            SessionEvent::GrantPermission {
                granting_user: ParticipantId::new(2),
                requesting_user: ParticipantId::new(1),
                current_count: 2,
                needed_count: 2,
                granted_users: vec![ParticipantId::new(1), ParticipantId::new(2)],
            },
        );
        assert_eq!(c.apply(&stale), MergeOutcome::Stale);
        assert_eq!(c.session().requester(), Some(ParticipantId::new(3)));
        assert_eq!(c.session().grant_count(), 1);
    }

    #[test]
    fn rival_requests_converge_on_the_lower_opener() {
        // Two replicas both open counter-1 epochs concurrently.
        let mut at_one = coordinator(2, 3);
        let by_one = at_one.request_access(ParticipantId::new(1)).expect("request");

        let mut at_two = coordinator(2, 3);
        let by_two = at_two.request_access(ParticipantId::new(2)).expect("request");

        // Each receives the rival's opening.
        assert_eq!(at_one.apply(&by_two[0]), MergeOutcome::Stale);
        assert_eq!(at_two.apply(&by_one[0]), MergeOutcome::Applied);

        assert_eq!(at_one.session().requester(), Some(ParticipantId::new(1)));
        assert_eq!(at_two.session().requester(), Some(ParticipantId::new(1)));
        assert_eq!(at_one.session().epoch(), at_two.session().epoch());
    }

    #[test]
    fn threshold_met_event_is_not_trusted_without_local_grants() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");

        // Claims the threshold was met, but the local set has one grantor.
        let premature = EventEnvelope::new(
            c.session().epoch(),
            ParticipantId::new(2),
            SessionEvent::ThresholdMet {
                requesting_user: ParticipantId::new(1),
                granted_users: vec![ParticipantId::new(1), ParticipantId::new(2)],
            },
        );
        assert_eq!(c.apply(&premature), MergeOutcome::NoOp);
        assert_eq!(c.session().phase(), Phase::Requested);
    }

    #[test]
    fn grant_after_reset_does_not_resurrect_the_epoch() {
        let mut c = coordinator(2, 3);
        c.request_access(ParticipantId::new(1)).expect("request");
        let granted = c.grant_access(ParticipantId::new(2)).expect("grant");
        c.reset();

        assert_eq!(c.apply(&granted[0]), MergeOutcome::NoOp);
        assert_eq!(c.session().phase(), Phase::Idle);
        assert_eq!(c.session().grant_count(), 0);
        assert!(c.session().check_invariants().is_ok());
    }
}
