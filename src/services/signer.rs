//! HMAC-SHA256 signatures for calls to the llmgeo plugin.
//!
//! The plugin rebuilds `METHOD\nPATH\nTIMESTAMP\nBODY` from the request it
//! receives and compares signatures, so `path` must never include the query
//! string and `body` must be the exact bytes put on the wire.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "X-LLMGEO-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-LLMGEO-Signature";

pub fn canonical_message(method: &str, path: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(method.len() + path.len() + timestamp.len() + body.len() + 3);
    message.extend_from_slice(method.to_ascii_uppercase().as_bytes());
    message.push(b'\n');
    message.extend_from_slice(path.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(body);
    message
}

/// Lower-case hex signature of the canonical message.
pub fn sign(secret: &str, method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(&canonical_message(method, path, timestamp, body));
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check, mirroring what the plugin does on its side.
#[cfg(test)]
pub fn verify(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(&canonical_message(method, path, timestamp, body));
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "shared-secret";
    const PATH: &str = "/wp-json/llmgeo/v1/draft";
    const TS: &str = "1700000000";
    const BODY: &[u8] = br#"{"title":"A"}"#;

    #[test]
    fn signature_is_deterministic() {
        let a = sign(SECRET, "POST", PATH, TS, BODY);
        let b = sign(SECRET, "POST", PATH, TS, BODY);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn every_field_changes_the_signature() {
        let base = sign(SECRET, "POST", PATH, TS, BODY);
        assert_ne!(base, sign(SECRET, "GET", PATH, TS, BODY));
        assert_ne!(base, sign(SECRET, "POST", "/wp-json/llmgeo/v1/drafts", TS, BODY));
        assert_ne!(base, sign(SECRET, "POST", PATH, "1700000001", BODY));
        assert_ne!(base, sign(SECRET, "POST", PATH, TS, br#"{"title":"B"}"#));
        assert_ne!(base, sign("other-secret", "POST", PATH, TS, BODY));
    }

    #[test]
    fn canonical_message_joins_fields_with_newlines() {
        let message = canonical_message("get", "/media", TS, b"");
        assert_eq!(message, b"GET\n/media\n1700000000\n".to_vec());
    }

    #[test]
    fn verify_accepts_only_matching_signature() {
        let signature = sign(SECRET, "GET", "/media", TS, b"");
        assert!(verify(SECRET, "GET", "/media", TS, b"", &signature));
        assert!(!verify(SECRET, "GET", "/media?per_page=20", TS, b"", &signature));
        assert!(!verify(SECRET, "GET", "/media", TS, b"", "not-hex"));
    }
}
