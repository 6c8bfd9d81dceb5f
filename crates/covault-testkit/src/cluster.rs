//! In-process agent cluster fixture

use covault_agent::{AgentHandle, AgentSnapshot, ParticipantAgent};
use covault_core::{AccessSession, ParticipantId, SessionConfig};
use covault_shares::{ShareResolver, UnavailableShareStore};
use covault_sync::MemoryHub;
use std::sync::Arc;

use crate::chaos::ChaosChannel;

/// A threshold session's worth of agents wired over one memory hub.
///
/// Shares come from fallback derivation (no store), so every participant
/// can act immediately.
pub struct TestCluster {
    hub: MemoryHub,
    handles: Vec<AgentHandle>,
}

impl TestCluster {
    /// Start `participants` agents with the given threshold.
    pub async fn start(threshold: u16, participants: u16) -> Self {
        Self::build(threshold, participants, None).await
    }

    /// Start a cluster whose channels duplicate a seeded fraction of
    /// broadcasts, exercising at-least-once delivery.
    pub async fn start_with_duplication(threshold: u16, participants: u16, seed: u64) -> Self {
        Self::build(threshold, participants, Some(seed)).await
    }

    async fn build(threshold: u16, participants: u16, duplication_seed: Option<u64>) -> Self {
        let config = SessionConfig::for_testing(threshold, participants);
        let hub = MemoryHub::new();
        let mut handles = Vec::new();
        for slot in 1..=participants {
            let id = ParticipantId::new(slot);
            let endpoint = hub.attach(id).await;
            let resolver = Arc::new(ShareResolver::new(UnavailableShareStore));
            let (handle, _task) = match duplication_seed {
                Some(seed) => ParticipantAgent::spawn(
                    id,
                    config.clone(),
                    resolver,
                    Box::new(ChaosChannel::new(endpoint, seed ^ u64::from(slot), 0.5)),
                ),
                None => ParticipantAgent::spawn(id, config.clone(), resolver, Box::new(endpoint)),
            }
            .expect("spawn agent");
            handles.push(handle);
        }
        Self { hub, handles }
    }

    /// Handle for the 1-based participant slot.
    pub fn agent(&self, slot: u16) -> &AgentHandle {
        &self.handles[usize::from(slot) - 1]
    }

    /// All agent handles in slot order.
    pub fn agents(&self) -> &[AgentHandle] {
        &self.handles
    }

    /// The underlying hub (for detaching peers mid-test).
    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }

    /// Let in-flight events drain through every agent's queue.
    pub async fn settle(&self) {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    /// Session replicas in slot order.
    pub async fn sessions(&self) -> Vec<AccessSession> {
        let mut sessions = Vec::new();
        for handle in &self.handles {
            sessions.push(handle.snapshot().await.expect("snapshot").session);
        }
        sessions
    }

    /// Full snapshots in slot order.
    pub async fn snapshots(&self) -> Vec<AgentSnapshot> {
        let mut snapshots = Vec::new();
        for handle in &self.handles {
            snapshots.push(handle.snapshot().await.expect("snapshot"));
        }
        snapshots
    }

    /// Assert every replica is identical and return the common session.
    pub async fn converged_session(&self) -> AccessSession {
        let sessions = self.sessions().await;
        let (first, rest) = sessions.split_first().expect("at least one agent");
        for (index, session) in rest.iter().enumerate() {
            assert_eq!(
                session,
                first,
                "agent {} diverged from agent 1",
                index + 2
            );
        }
        first.clone()
    }
}
