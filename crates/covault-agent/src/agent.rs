//! The participant actor and its run loop
//!
//! The run loop consumes one stimulus at a time: a local user action, an
//! inbound broadcast envelope, or an elapsed deadline. Deadlines are local
//! timers, never broadcast themselves — every agent independently times out
//! its own `Opened` display window, which is safe because reset application
//! is idempotent and order-independent.

use crate::handle::{ActionOutcome, AgentHandle, AgentInput, AgentSnapshot, UserAction};
use covault_core::{
    AccessError, EpochId, EventEnvelope, ParticipantId, PermissionCoordinator, Phase, Result,
    SessionConfig, SessionEvent,
};
use covault_shares::{ShareResolver, ShareStore};
use covault_sync::SyncChannel;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeadlineKind {
    /// The request stayed below threshold too long; fail closed.
    RequestWindow,
    /// The opened document's display window elapsed.
    OpenWindow,
}

enum Stimulus {
    Local(Option<AgentInput>),
    Remote(Option<EventEnvelope>),
    Deadline,
}

/// One connected participant: coordinator, session replica, share
/// resolution, and channel endpoint, driven by a single queue.
pub struct ParticipantAgent<S> {
    id: ParticipantId,
    config: SessionConfig,
    coordinator: PermissionCoordinator,
    resolver: Arc<ShareResolver<S>>,
    channel: Box<dyn SyncChannel>,
    inbox: mpsc::UnboundedReceiver<AgentInput>,
    unauthorized_attempts: u64,
    channel_open: bool,
    deadline: Option<(DeadlineKind, Instant)>,
    observed_phase: Phase,
    observed_epoch: EpochId,
}

impl<S: ShareStore + 'static> ParticipantAgent<S> {
    /// Spawn the agent task. The returned handle feeds its queue; dropping
    /// every handle terminates the agent once its queue drains.
    pub fn spawn(
        id: ParticipantId,
        config: SessionConfig,
        resolver: Arc<ShareResolver<S>>,
        channel: Box<dyn SyncChannel>,
    ) -> Result<(AgentHandle, JoinHandle<()>)> {
        let coordinator = PermissionCoordinator::new(id, &config)?;
        let (sender, inbox) = mpsc::unbounded_channel();
        let agent = Self {
            id,
            observed_phase: coordinator.session().phase(),
            observed_epoch: coordinator.session().epoch(),
            config,
            coordinator,
            resolver,
            channel,
            inbox,
            unauthorized_attempts: 0,
            channel_open: true,
            deadline: None,
        };
        let task = tokio::spawn(agent.run());
        Ok((AgentHandle { id, sender }, task))
    }

    async fn run(mut self) {
        debug!(id = %self.id, "agent started");
        loop {
            let deadline = self.deadline.map(|(_, at)| at);
            let channel_open = self.channel_open;
            let stimulus = {
                let inbox = &mut self.inbox;
                let channel = &mut self.channel;
                tokio::select! {
                    input = inbox.recv() => Stimulus::Local(input),
                    envelope = channel.recv(), if channel_open => Stimulus::Remote(envelope),
                    () = sleep_until_opt(deadline) => Stimulus::Deadline,
                }
            };
            match stimulus {
                Stimulus::Local(Some(input)) => self.handle_input(input).await,
                Stimulus::Remote(Some(envelope)) => self.handle_remote(envelope),
                Stimulus::Deadline => self.handle_deadline().await,
                // A closed channel leaves the agent serving local state.
                Stimulus::Remote(None) => {
                    debug!(id = %self.id, "broadcast channel closed");
                    self.channel_open = false;
                }
                Stimulus::Local(None) => break,
            }
        }
        debug!(id = %self.id, "agent stopped");
    }

    async fn handle_input(&mut self, input: AgentInput) {
        match input {
            AgentInput::Action { action, reply } => {
                let outcome = self.perform(action).await;
                let _ = reply.send(outcome);
            }
            AgentInput::Remote(envelope) => self.handle_remote(envelope),
            AgentInput::Inspect { reply } => {
                let _ = reply.send(AgentSnapshot {
                    session: self.coordinator.session().clone(),
                    unauthorized_attempts: self.unauthorized_attempts,
                });
            }
        }
    }

    async fn perform(&mut self, action: UserAction) -> ActionOutcome {
        if matches!(action, UserAction::Request | UserAction::Grant)
            && !self.coordinator.share_resolved(self.id)
        {
            match self.resolver.resolve(self.id).await {
                Ok(_) => self.coordinator.mark_share_resolved(self.id),
                Err(error) => {
                    debug!(id = %self.id, %error, "share resolution failed");
                    return ActionOutcome::Rejected(AccessError::ShareUnavailable {
                        participant: self.id,
                    });
                }
            }
        }

        let result = match action {
            UserAction::Request => self.coordinator.request_access(self.id),
            UserAction::Grant => self.coordinator.grant_access(self.id),
            UserAction::Open => self.coordinator.open_document(self.id),
            UserAction::Reset => Ok(self.coordinator.reset()),
        };

        let outcome = match result {
            Ok(envelopes) => {
                self.broadcast_all(envelopes).await;
                ActionOutcome::Accepted
            }
            Err(AccessError::DuplicateGrant { .. }) => ActionOutcome::NoOp,
            Err(error) => {
                if error.is_security_relevant() {
                    self.unauthorized_attempts += 1;
                    warn!(id = %self.id, %error, "unauthorized open attempt");
                    let envelope = EventEnvelope::unauthorized(
                        self.coordinator.session().epoch(),
                        self.id,
                        format!("{} attempted to open the document without authorization", self.id),
                    );
                    self.broadcast_all(vec![envelope]).await;
                }
                ActionOutcome::Rejected(error)
            }
        };
        self.note_state_change();
        outcome
    }

    fn handle_remote(&mut self, envelope: EventEnvelope) {
        if let SessionEvent::UnauthorizedAttempt { user_id, message } = &envelope.event {
            self.unauthorized_attempts += 1;
            warn!(id = %self.id, offender = %user_id, %message, "unauthorized attempt reported");
            return;
        }
        if self.coordinator.apply(&envelope).is_applied() {
            debug!(
                id = %self.id,
                kind = envelope.event.kind(),
                phase = ?self.coordinator.session().phase(),
                "remote event applied"
            );
            self.note_state_change();
        }
    }

    async fn handle_deadline(&mut self) {
        let Some((kind, _)) = self.deadline.take() else {
            return;
        };
        match kind {
            DeadlineKind::RequestWindow => {
                warn!(id = %self.id, "request deadline exceeded, failing closed");
                let envelopes = self.coordinator.reset();
                self.broadcast_all(envelopes).await;
            }
            DeadlineKind::OpenWindow => {
                debug!(id = %self.id, "open window elapsed, resetting");
                // Local timer only: every agent times out its own Opened
                // state, so the reset is not broadcast.
                let _ = self.coordinator.reset();
            }
        }
        self.note_state_change();
    }

    async fn broadcast_all(&mut self, envelopes: Vec<EventEnvelope>) {
        for envelope in envelopes {
            if let Err(error) = self.channel.broadcast(envelope).await {
                warn!(id = %self.id, %error, "broadcast failed");
            }
        }
    }

    /// Recompute the local deadline whenever the (phase, epoch) pair moves.
    fn note_state_change(&mut self) {
        let session = self.coordinator.session();
        if session.phase() == self.observed_phase && session.epoch() == self.observed_epoch {
            return;
        }
        self.observed_phase = session.phase();
        self.observed_epoch = session.epoch();
        self.deadline = match self.observed_phase {
            Phase::Requested => Some((
                DeadlineKind::RequestWindow,
                Instant::now() + self.config.request_deadline,
            )),
            Phase::Opened => Some((
                DeadlineKind::OpenWindow,
                Instant::now() + self.config.open_window,
            )),
            Phase::Idle | Phase::ThresholdMet => None,
        };
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
