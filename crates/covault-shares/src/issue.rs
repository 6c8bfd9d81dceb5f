//! Simulated per-participant share issuance
//!
//! Tokens are digests over the participant index, the secret, and the
//! threshold, formatted `<index>-<digest>-<threshold>`. Opaque by design:
//! nothing downstream ever reconstructs the secret from them.

use crate::error::{Result, ShareError};
use covault_core::{ParticipantId, ShareToken};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Issue one opaque token per participant for a `threshold`-of-`count`
/// session keyed on `secret`.
pub fn split_token_set(
    secret: &str,
    threshold: u16,
    count: u16,
) -> Result<BTreeMap<ParticipantId, ShareToken>> {
    if threshold == 0 {
        return Err(ShareError::invalid_split("threshold must be at least 1"));
    }
    if threshold > count {
        return Err(ShareError::invalid_split(format!(
            "threshold {threshold} exceeds participant count {count}"
        )));
    }

    let mut shares = BTreeMap::new();
    for index in 1..=count {
        let digest = Sha256::digest(format!("share_{index}_{secret}_{threshold}").as_bytes());
        let body = &hex::encode(digest)[..32];
        shares.insert(
            ParticipantId::new(index),
            ShareToken::new(format!("{index}-{body}-{threshold}")),
        );
    }
    Ok(shares)
}
