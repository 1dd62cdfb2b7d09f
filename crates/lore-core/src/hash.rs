use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `text`, used for change detection of chunks and
/// content units.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
