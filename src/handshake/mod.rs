//! The HTTP/1.1 upgrade handshake (RFC 6455 section 4).
//!
//! The two sides share the line reader and the helpers here; the driving
//! logic lives in [`client`] and [`server`] as free functions over a
//! [`Connection`](crate::Connection), since both roles run the same state
//! machine afterwards.

mod client;
mod server;

pub(crate) use client::client_handshake;
pub(crate) use server::server_handshake;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The GUID appended to the client key when computing the accept key
/// (RFC 6455 section 1.3).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the `Sec-WebSocket-Accept` value for a `Sec-WebSocket-Key`:
/// `base64(sha1(key + GUID))`.
///
/// # Example
///
/// ```
/// use wscore::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Split a header line at the first colon: lowercased name, trimmed value.
pub(crate) fn split_header(line: &str) -> Result<(String, String)> {
    let (name, value) = line
        .split_once(':')
        .ok_or(Error::HttpViolation("header line without colon"))?;
    Ok((name.trim().to_ascii_lowercase(), value.trim().to_string()))
}

/// Tokens of a `Sec-WebSocket-Protocol` value. The list is space-separated;
/// commas are tolerated as separators too.
pub(crate) fn protocol_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split([' ', ',']).filter(|token| !token.is_empty())
}
