//! Wire codec for event envelopes
//!
//! Envelopes travel as JSON with the event under a `type` tag
//! (`request_permission`, `grant_permission`, `threshold_met`,
//! `document_opened`, `unauthorized_attempt`, `session_reset`). Payload
//! counts in grant events are advisory display data; receivers recompute
//! state transitions from their own merged grantor set.

use crate::channel::SyncError;
use covault_core::EventEnvelope;

/// Encode an envelope for the wire.
pub fn encode_envelope(envelope: &EventEnvelope) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(envelope).map_err(|error| SyncError::Codec {
        message: error.to_string(),
    })
}

/// Decode an envelope received from the wire.
pub fn decode_envelope(bytes: &[u8]) -> Result<EventEnvelope, SyncError> {
    serde_json::from_slice(bytes).map_err(|error| SyncError::Codec {
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use covault_core::{EpochId, ParticipantId, SessionEvent};

    #[test]
    fn envelope_wire_shape_matches_the_channel_contract() {
        let envelope = EventEnvelope::new(
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

        let bytes = encode_envelope(&envelope).expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value["event"]["type"], "grant_permission");
        assert_eq!(value["event"]["granting_user"], 2);
        assert_eq!(value["epoch"]["counter"], 1);

        assert_eq!(decode_envelope(&bytes).expect("decode"), envelope);
    }

    #[test]
    fn malformed_payloads_surface_a_codec_error() {
        let err = decode_envelope(b"{\"epoch\":").unwrap_err();
        assert!(matches!(err, SyncError::Codec { .. }));
    }
}
