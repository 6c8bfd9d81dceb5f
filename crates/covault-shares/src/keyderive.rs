//! Blink-pattern key derivation boundary
//!
//! Consumes a finite ordered sequence of blink events and returns a derived
//! key. The access coordinator only displays the result; it never
//! interprets the key material.

use crate::error::{Result, ShareError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const STRETCH_ROUNDS: usize = 1000;

/// One observed blink event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkSample {
    /// When the blink was observed, in milliseconds.
    pub timestamp_ms: u64,
    /// How long the eye stayed closed, in milliseconds.
    pub duration_ms: u64,
    /// Relative blink strength in `0.0..=1.0`.
    pub intensity: f64,
    /// Time the eye was open before this blink, in milliseconds.
    pub eye_open_interval_ms: u64,
}

/// A derived 256-bit key.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey {
    bytes: [u8; 32],
}

impl DerivedKey {
    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the key is empty (never true for a derived key).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex rendering for display.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for DerivedKey {
    // Keep key material out of logs; show only a prefix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey({}..)", &self.to_hex()[..8])
    }
}

/// Derive a key from an ordered blink sequence.
///
/// The timing pattern (timestamp, duration, intensity per blink) is joined
/// into one pattern string, then stretched through repeated hashing.
pub fn derive_key(samples: &[BlinkSample]) -> Result<DerivedKey> {
    if samples.is_empty() {
        return Err(ShareError::EmptyPattern);
    }

    let pattern = samples
        .iter()
        .map(|blink| {
            format!(
                "{}_{}_{}",
                blink.timestamp_ms, blink.duration_ms, blink.intensity
            )
        })
        .collect::<Vec<_>>()
        .join("|");

    let mut material: Vec<u8> = pattern.into_bytes();
    for _ in 0..STRETCH_ROUNDS {
        material = Sha256::digest(&material).to_vec();
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&material[..32]);
    Ok(DerivedKey { bytes })
}
