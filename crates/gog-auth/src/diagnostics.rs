//! Log-safe summaries of HTTP bodies.
//!
//! OAuth error bodies may echo codes or tokens, so they are reduced to a
//! SHA-256 fingerprint of a bounded prefix before reaching logs or errors.

use std::io::Read;

use sha2::{Digest, Sha256};

/// Bytes of a response body considered for the fingerprint.
pub const BODY_SNIPPET_LIMIT: u64 = 4096;

/// Summarizes at most `limit` bytes of `reader` as `response_sha256=<hex>`.
///
/// The digest covers exactly the bytes read. An empty body (or one that
/// fails before yielding a byte) produces an empty string.
pub fn read_http_body_snippet<R: Read>(reader: R, limit: u64) -> String {
    let mut buf = Vec::new();
    // a partial read still gets fingerprinted
    let _ = reader.take(limit).read_to_end(&mut buf);
    if buf.is_empty() {
        return String::new();
    }
    format!("response_sha256={:x}", Sha256::digest(&buf))
}

/// [`read_http_body_snippet`] over an in-memory body with the default limit.
pub fn summarize_body(body: &[u8]) -> String {
    read_http_body_snippet(body, BODY_SNIPPET_LIMIT)
}
