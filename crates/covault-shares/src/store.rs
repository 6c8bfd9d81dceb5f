//! External share-store collaborator
//!
//! The store is asked for the whole session's participant→token mapping in
//! one call. An empty or absent answer is not an error; the resolver falls
//! back to local derivation in that case.

use crate::error::{Result, ShareError};
use async_trait::async_trait;
use covault_core::{ParticipantId, ShareToken};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of previously issued shares.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Fetch this session's per-participant shares. `Ok(None)` means the
    /// store holds nothing for this session.
    async fn fetch_shares(&self) -> Result<Option<BTreeMap<ParticipantId, ShareToken>>>;
}

#[async_trait]
impl<T: ShareStore + ?Sized> ShareStore for Arc<T> {
    async fn fetch_shares(&self) -> Result<Option<BTreeMap<ParticipantId, ShareToken>>> {
        (**self).fetch_shares().await
    }
}

/// Store backed by a fixed in-memory mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticShareStore {
    shares: BTreeMap<ParticipantId, ShareToken>,
}

impl StaticShareStore {
    /// Create a store holding the given mapping.
    pub fn new(shares: BTreeMap<ParticipantId, ShareToken>) -> Self {
        Self { shares }
    }
}

#[async_trait]
impl ShareStore for StaticShareStore {
    async fn fetch_shares(&self) -> Result<Option<BTreeMap<ParticipantId, ShareToken>>> {
        if self.shares.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.shares.clone()))
        }
    }
}

/// Store that always fails, for exercising the fallback path.
#[derive(Debug, Default)]
pub struct UnavailableShareStore;

#[async_trait]
impl ShareStore for UnavailableShareStore {
    async fn fetch_shares(&self) -> Result<Option<BTreeMap<ParticipantId, ShareToken>>> {
        Err(ShareError::store_unavailable("store offline"))
    }
}

/// Store whose availability can be flipped at runtime, for retry tests.
#[derive(Debug, Default)]
pub struct FlakyShareStore {
    shares: BTreeMap<ParticipantId, ShareToken>,
    available: AtomicBool,
}

impl FlakyShareStore {
    /// Create a store that starts unavailable.
    pub fn new(shares: BTreeMap<ParticipantId, ShareToken>) -> Self {
        Self {
            shares,
            available: AtomicBool::new(false),
        }
    }

    /// Flip availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShareStore for FlakyShareStore {
    async fn fetch_shares(&self) -> Result<Option<BTreeMap<ParticipantId, ShareToken>>> {
        if self.available.load(Ordering::SeqCst) {
            Ok(Some(self.shares.clone()))
        } else {
            Err(ShareError::store_unavailable("store offline"))
        }
    }
}
