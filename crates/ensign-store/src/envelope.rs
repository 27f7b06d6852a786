// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tamper-evident envelope: keyed MAC over serialized data and timestamp.
//!
//! Every stored value is wrapped in `{version, timestamp, data, signature}`.
//! The signature is HMAC-SHA256 over `serialized(data) || "|" || timestamp`.
//! Verification recomputes the MAC from the embedded fields and compares in
//! constant time via [`Mac::verify_slice`].

use ensign_core::EnsignError;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Current envelope format version. Readers reject anything else.
pub const ENVELOPE_VERSION: u32 = 1;

/// The wire form every stored value takes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    /// Signing time, ms since epoch.
    pub timestamp: i64,
    pub data: serde_json::Value,
    /// Hex-encoded HMAC-SHA256. Absent when the store runs unsigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Canonical serialization of the payload that gets signed.
///
/// Both the write and the verify path go through `serde_json::Value`, whose
/// object keys are ordered, so the bytes are stable across a round trip.
pub fn canonical_payload(data: &serde_json::Value) -> String {
    data.to_string()
}

/// Computes the hex HMAC-SHA256 signature for a payload and timestamp.
pub fn sign(secret: &[u8], payload: &str, timestamp: i64) -> Result<String, EnsignError> {
    let mut mac = mac_for(secret)?;
    feed(&mut mac, payload, timestamp);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a hex signature in constant time.
///
/// Returns false on any mismatch, including undecodable hex.
pub fn verify(secret: &[u8], payload: &str, timestamp: i64, signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = mac_for(secret) else {
        return false;
    };
    feed(&mut mac, payload, timestamp);
    mac.verify_slice(&expected).is_ok()
}

fn mac_for(secret: &[u8]) -> Result<HmacSha256, EnsignError> {
    // HMAC accepts keys of any length; the error arm is unreachable in
    // practice but propagated rather than asserted.
    HmacSha256::new_from_slice(secret)
        .map_err(|_| EnsignError::Internal("failed to initialize HMAC".into()))
}

fn feed(mac: &mut HmacSha256, payload: &str, timestamp: i64) {
    mac.update(payload.as_bytes());
    mac.update(b"|");
    mac.update(timestamp.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";

    #[test]
    fn sign_verify_roundtrip() {
        let data = serde_json::json!({"name": "alice.eth", "price": "0xde0b6b3a7640000"});
        let payload = canonical_payload(&data);
        let ts = 1_700_000_000_000i64;

        let sig = sign(SECRET, &payload, ts).unwrap();
        assert!(verify(SECRET, &payload, ts, &sig));
    }

    #[test]
    fn tampered_payload_fails() {
        let payload = r#"{"amount":"100"}"#;
        let ts = 1_700_000_000_000i64;
        let sig = sign(SECRET, payload, ts).unwrap();

        let tampered = r#"{"amount":"101"}"#;
        assert!(!verify(SECRET, tampered, ts, &sig));
    }

    #[test]
    fn tampered_timestamp_fails() {
        let payload = r#"{"amount":"100"}"#;
        let sig = sign(SECRET, payload, 1_700_000_000_000).unwrap();
        assert!(!verify(SECRET, payload, 1_700_000_000_001, &sig));
    }

    #[test]
    fn single_bit_flip_in_signature_fails() {
        let payload = r#"{"amount":"100"}"#;
        let ts = 1_700_000_000_000i64;
        let sig = sign(SECRET, payload, ts).unwrap();

        let mut bytes = hex::decode(&sig).unwrap();
        bytes[0] ^= 0x01;
        let flipped = hex::encode(bytes);
        assert!(!verify(SECRET, payload, ts, &flipped));
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = r#"{"amount":"100"}"#;
        let ts = 1_700_000_000_000i64;
        let sig = sign(SECRET, payload, ts).unwrap();
        assert!(!verify(b"another-secret", payload, ts, &sig));
    }

    #[test]
    fn non_hex_signature_fails_not_panics() {
        assert!(!verify(SECRET, "payload", 0, "not-hex-at-all"));
    }

    #[test]
    fn canonical_payload_is_stable_across_reparse() {
        let data = serde_json::json!({"b": 2, "a": 1, "nested": {"z": true, "y": false}});
        let first = canonical_payload(&data);
        let reparsed: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(first, canonical_payload(&reparsed));
    }

    #[test]
    fn envelope_serde_roundtrip() {
        let env = Envelope {
            version: ENVELOPE_VERSION,
            timestamp: 42,
            data: serde_json::json!({"k": "v"}),
            signature: Some("aabb".into()),
        };
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, ENVELOPE_VERSION);
        assert_eq!(back.timestamp, 42);
        assert_eq!(back.signature.as_deref(), Some("aabb"));
    }

    #[test]
    fn unsigned_envelope_omits_signature_field() {
        let env = Envelope {
            version: ENVELOPE_VERSION,
            timestamp: 42,
            data: serde_json::json!({}),
            signature: None,
        };
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("signature").is_none());
    }
}
