//! Seeded at-least-once channel wrapper
//!
//! Re-broadcasts a configurable fraction of envelopes so receivers see
//! duplicate deliveries, the way a real at-least-once channel would.
//! Per-sender ordering is preserved (duplicates follow the original), so
//! the wrapper stays inside the delivery model the merge function assumes.

use async_trait::async_trait;
use covault_core::EventEnvelope;
use covault_sync::{channel, SyncChannel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;

/// Channel wrapper that duplicates a seeded fraction of broadcasts.
pub struct ChaosChannel<C> {
    inner: C,
    rng: Mutex<ChaCha8Rng>,
    duplicate_chance: f64,
}

impl<C: SyncChannel> ChaosChannel<C> {
    /// Wrap `inner`, duplicating roughly `duplicate_chance` of broadcasts.
    /// The same seed reproduces the same duplication pattern.
    pub fn new(inner: C, seed: u64, duplicate_chance: f64) -> Self {
        Self {
            inner,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            duplicate_chance,
        }
    }
}

#[async_trait]
impl<C: SyncChannel + Sync> SyncChannel for ChaosChannel<C> {
    async fn broadcast(&self, envelope: EventEnvelope) -> channel::Result<()> {
        let duplicate = {
            let mut rng = self.rng.lock().expect("rng lock");
            rng.gen_bool(self.duplicate_chance)
        };
        self.inner.broadcast(envelope.clone()).await?;
        if duplicate {
            self.inner.broadcast(envelope).await?;
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<EventEnvelope> {
        self.inner.recv().await
    }
}
