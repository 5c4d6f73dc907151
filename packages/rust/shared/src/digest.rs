//! Content digests used as cache keys.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of `text`.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Digest of the first `max_chars` characters of `text`.
///
/// Long documents that differ only past the prefix share a key.
pub fn prefix_digest(text: &str, max_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    content_digest(&text[..end])
}
