//! In-memory broadcast hub
//!
//! Connects participant endpoints in one process. Broadcast fans the
//! envelope out to every other registered endpoint; a disconnected peer is
//! skipped. Envelopes cross the hub through the wire codec so the memory
//! hub exercises the same encoding a remote transport would.

use crate::channel::{Result, SyncChannel, SyncError};
use crate::wire::{decode_envelope, encode_envelope};
use async_trait::async_trait;
use covault_core::{EventEnvelope, ParticipantId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::trace;

type Endpoints = HashMap<ParticipantId, mpsc::UnboundedSender<Vec<u8>>>;

/// Hub connecting all participants of one session in-process.
#[derive(Clone, Default)]
pub struct MemoryHub {
    endpoints: Arc<RwLock<Endpoints>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a participant endpoint to the hub.
    pub async fn attach(&self, participant: ParticipantId) -> MemoryChannel {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.endpoints.write().await.insert(participant, sender);
        MemoryChannel {
            participant,
            endpoints: Arc::clone(&self.endpoints),
            receiver,
        }
    }

    /// Detach a participant; subsequent broadcasts skip it.
    pub async fn detach(&self, participant: ParticipantId) {
        self.endpoints.write().await.remove(&participant);
    }
}

/// One participant's endpoint on a [`MemoryHub`].
pub struct MemoryChannel {
    participant: ParticipantId,
    endpoints: Arc<RwLock<Endpoints>>,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl SyncChannel for MemoryChannel {
    async fn broadcast(&self, envelope: EventEnvelope) -> Result<()> {
        let bytes = encode_envelope(&envelope)?;
        let endpoints = self.endpoints.read().await;
        for (peer, sender) in endpoints.iter() {
            if *peer == self.participant {
                continue;
            }
            // A closed endpoint means the peer went away; skip it.
            if sender.send(bytes.clone()).is_err() {
                trace!(%peer, "skipping disconnected peer");
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            let bytes = self.receiver.recv().await?;
            match decode_envelope(&bytes) {
                Ok(envelope) => return Some(envelope),
                Err(SyncError::Codec { message }) => {
                    trace!(%message, "dropping malformed inbound payload");
                }
                Err(SyncError::Closed) => return None,
            }
        }
    }
}
