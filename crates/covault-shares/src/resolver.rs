//! Share resolution with deterministic local fallback
//!
//! Tries the external store first; when the store is absent, empty, or
//! failing, derives a fallback token from the participant identity and a
//! per-resolver freshness nonce. Fallback tokens are reproducible per
//! participant within one process lifetime and never collide between
//! participants (the identity is part of the digest input).

use crate::error::{Result, ShareError};
use crate::store::ShareStore;
use covault_core::{ParticipantId, ShareToken};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Resolves one opaque share token per participant.
pub struct ShareResolver<S> {
    store: S,
    freshness: String,
    fallback: bool,
    cache: RwLock<BTreeMap<ParticipantId, ShareToken>>,
}

impl<S: ShareStore> ShareResolver<S> {
    /// Create a resolver with fallback derivation enabled.
    pub fn new(store: S) -> Self {
        Self::with_fallback(store, true)
    }

    /// Create a resolver that surfaces `NotIssued` instead of deriving a
    /// fallback. A later identical resolve may succeed once the store
    /// becomes available.
    pub fn strict(store: S) -> Self {
        Self::with_fallback(store, false)
    }

    fn with_fallback(store: S, fallback: bool) -> Self {
        let mut nonce = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            store,
            freshness: hex::encode(nonce),
            fallback,
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    /// Resolve the share token for `participant`.
    pub async fn resolve(&self, participant: ParticipantId) -> Result<ShareToken> {
        if let Some(token) = self.cache.read().await.get(&participant) {
            return Ok(token.clone());
        }

        match self.store.fetch_shares().await {
            Ok(Some(issued)) => {
                let mut cache = self.cache.write().await;
                for (holder, token) in &issued {
                    cache.entry(*holder).or_insert_with(|| token.clone());
                }
                if let Some(token) = cache.get(&participant) {
                    return Ok(token.clone());
                }
            }
            Ok(None) => {
                debug!(%participant, "share store holds nothing for this session");
            }
            Err(error) => {
                debug!(%participant, %error, "share store unreachable");
                if !self.fallback {
                    return Err(error);
                }
            }
        }

        if !self.fallback {
            return Err(ShareError::NotIssued { participant });
        }

        let token = self.derive_fallback(participant);
        self.cache
            .write()
            .await
            .insert(participant, token.clone());
        Ok(token)
    }

    /// Derived fallback token: a digest of the participant identity and the
    /// per-resolver freshness nonce.
    fn derive_fallback(&self, participant: ParticipantId) -> ShareToken {
        let digest = Sha256::digest(format!("{participant}:{}", self.freshness).as_bytes());
        let short = hex::encode(&digest[..8]);
        ShareToken::new(format!("share-{participant}-{short}"))
    }
}
