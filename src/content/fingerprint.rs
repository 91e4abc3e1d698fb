use sha2::{Digest, Sha256};

/// Hex SHA-256 of the base article HTML. Computed before enrichment so that
/// related links and injected images never affect duplicate detection.
pub fn fingerprint(content_html: &str) -> String {
    hex::encode(Sha256::digest(content_html.as_bytes()))
}
