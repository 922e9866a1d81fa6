//! HMAC-SHA256 payload signing and verification.
//!
//! The signed bytes are the canonical JSON encoding of the full delivery
//! body: serde_json's `Map` is BTreeMap-backed, so object keys serialize in
//! lexicographic order at every nesting level. The exact signed bytes are
//! also the bytes sent as the POST body, so receivers can verify against
//! the body as received.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by the `X-Signature-256` header.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Canonical JSON bytes of a payload value (sorted object keys).
pub fn canonical_json(payload: &Value) -> Vec<u8> {
    // serde_json cannot fail on a Value that contains no non-string map
    // keys, which Value guarantees.
    serde_json::to_vec(payload).unwrap_or_default()
}

/// Lowercase hex HMAC-SHA256 of `payload` under `secret`.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Full `X-Signature-256` header value: `sha256=<64 hex chars>`.
pub fn signature_header(payload: &[u8], secret: &str) -> String {
    format!("{}{}", SIGNATURE_PREFIX, sign(payload, secret))
}

/// Verify a `sha256=<hex>` signature header against a payload.
///
/// Comparison is constant-time via `Mac::verify_slice`. Returns false for
/// malformed headers rather than erroring.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &str) -> bool {
    let Some(hex_digest) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_verify_roundtrip() {
        let payload = canonical_json(&json!({
            "event": "anomaly.detected",
            "tenant_id": "t1",
            "data": {"score": 0.9}
        }));
        let header = signature_header(&payload, "s3cret");

        assert!(header.starts_with("sha256="));
        assert_eq!(header.len(), 7 + 64);
        assert!(verify_signature(&payload, &header, "s3cret"));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let payload = canonical_json(&json!({"a": 1}));
        let header = signature_header(&payload, "k");

        let mut tampered = payload.clone();
        tampered[2] ^= 0x01;
        assert!(!verify_signature(&tampered, &header, "k"));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let payload = canonical_json(&json!({"a": 1}));
        let mut header = signature_header(&payload, "k");
        // Flip the last hex char to a different valid hex char.
        let last = header.pop().unwrap();
        header.push(if last == '0' { '1' } else { '0' });
        assert!(!verify_signature(&payload, &header, "k"));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let payload = canonical_json(&json!({"a": 1}));
        let header = signature_header(&payload, "k1");
        assert!(!verify_signature(&payload, &header, "k2"));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let payload = canonical_json(&json!({"a": 1}));
        assert!(!verify_signature(&payload, "md5=abcdef", "k"));
        assert!(!verify_signature(&payload, "sha256=nothex!", "k"));
        assert!(!verify_signature(&payload, "", "k"));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let bytes = canonical_json(&json!({"zebra": 1, "alpha": {"z": 1, "a": 2}}));
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"alpha":{"a":2,"z":1},"zebra":1}"#);
    }
}
