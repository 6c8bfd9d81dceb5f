//! Clonable handle for driving an agent

use covault_core::{AccessError, AccessSession, EventEnvelope, ParticipantId};
use tokio::sync::{mpsc, oneshot};

/// A user-facing action mapped onto a coordinator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Open a new request lifecycle.
    Request,
    /// Grant the active request.
    Grant,
    /// Open the document.
    Open,
    /// Force the session back to idle.
    Reset,
}

/// Terminal outcome of one user action. Actions are never retried
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action was applied and its events broadcast.
    Accepted,
    /// The action was benignly redundant (e.g. a repeated grant).
    NoOp,
    /// The action was rejected; the session is unchanged.
    Rejected(AccessError),
}

/// Point-in-time view of an agent's replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// The agent's session replica.
    pub session: AccessSession,
    /// Unauthorized attempts observed (own and broadcast), for
    /// observability only.
    pub unauthorized_attempts: u64,
}

/// Error talking to an agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// The agent task has terminated.
    #[error("agent terminated")]
    Terminated,
}

pub(crate) enum AgentInput {
    Action {
        action: UserAction,
        reply: oneshot::Sender<ActionOutcome>,
    },
    Remote(EventEnvelope),
    Inspect {
        reply: oneshot::Sender<AgentSnapshot>,
    },
}

/// Handle for sending stimuli into an agent's queue.
#[derive(Clone)]
pub struct AgentHandle {
    pub(crate) id: ParticipantId,
    pub(crate) sender: mpsc::UnboundedSender<AgentInput>,
}

impl AgentHandle {
    /// The participant this handle drives.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Perform a user action and wait for its terminal outcome.
    pub async fn action(&self, action: UserAction) -> Result<ActionOutcome, AgentError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(AgentInput::Action { action, reply })
            .map_err(|_| AgentError::Terminated)?;
        response.await.map_err(|_| AgentError::Terminated)
    }

    /// Open a new request lifecycle.
    pub async fn request(&self) -> Result<ActionOutcome, AgentError> {
        self.action(UserAction::Request).await
    }

    /// Grant the active request.
    pub async fn grant(&self) -> Result<ActionOutcome, AgentError> {
        self.action(UserAction::Grant).await
    }

    /// Open the document.
    pub async fn open(&self) -> Result<ActionOutcome, AgentError> {
        self.action(UserAction::Open).await
    }

    /// Force the session back to idle.
    pub async fn reset(&self) -> Result<ActionOutcome, AgentError> {
        self.action(UserAction::Reset).await
    }

    /// Inject an envelope into the agent's queue, as if it had arrived
    /// over the broadcast channel. Used by test harnesses to exercise
    /// duplicate and reordered delivery.
    pub fn deliver(&self, envelope: EventEnvelope) -> Result<(), AgentError> {
        self.sender
            .send(AgentInput::Remote(envelope))
            .map_err(|_| AgentError::Terminated)
    }

    /// Snapshot the agent's replica.
    pub async fn snapshot(&self) -> Result<AgentSnapshot, AgentError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(AgentInput::Inspect { reply })
            .map_err(|_| AgentError::Terminated)?;
        response.await.map_err(|_| AgentError::Terminated)
    }
}
