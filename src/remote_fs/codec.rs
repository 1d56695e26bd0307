//! Base64 text form of file contents
//!
//! File bytes cross the command line as standard base64 (RFC 4648 alphabet,
//! `=` padding). The remote `base64` tool wraps its output, so decoding
//! ignores ASCII whitespace anywhere in the input.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Default upload chunk, in encoded characters
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 48 * 1024;

/// Encode bytes as a single unwrapped base64 string.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text, ignoring any ASCII whitespace (line wraps included).
pub fn decode(text: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact)
}

/// Split an encoded string into chunks that each decode on their own.
///
/// The chunk size is rounded down to a multiple of 4 (minimum 4), so only
/// the last chunk can carry padding. Empty input yields one empty chunk.
pub fn split_encoded(encoded: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = (chunk_size / 4).max(1) * 4;
    if encoded.is_empty() {
        return vec![""];
    }
    // base64 text is ASCII, any byte offset is a char boundary
    encoded
        .as_bytes()
        .chunks(chunk_size)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect()
}
