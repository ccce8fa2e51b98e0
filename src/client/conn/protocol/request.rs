//! Request encoding.

use bytes::BytesMut;
use thiserror::Error;

use crate::url::Target;

/// Default bound on the size of an encoded request.
pub const DEFAULT_REQUEST_LIMIT: usize = 512;

/// The encoded request would exceed the configured bound.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("request of {len} bytes exceeds the {limit} byte limit")]
pub struct RequestTooLarge {
    /// Length of the request that was formatted.
    pub len: usize,
    /// The limit it exceeded.
    pub limit: usize,
}

/// Encode the `GET` request for `target`, refusing to exceed `limit` bytes.
///
/// The request always asks the server to close the connection, so the body
/// can be read until end of stream.
pub fn encode_get(target: &Target, limit: usize) -> Result<BytesMut, RequestTooLarge> {
    let port = target.port().to_string();
    let parts: [&[u8]; 7] = [
        b"GET ",
        target.path().as_bytes(),
        b" HTTP/1.1\r\nHost: ",
        target.host().as_bytes(),
        b":",
        port.as_bytes(),
        b"\r\nConnection: Close\r\nAccept: */*\r\n\r\n",
    ];

    let len: usize = parts.iter().map(|part| part.len()).sum();
    if len > limit {
        return Err(RequestTooLarge { len, limit });
    }

    let mut buf = BytesMut::with_capacity(len);
    for part in parts {
        buf.extend_from_slice(part);
    }
    Ok(buf)
}
