//! Parsing `https://` URLs into a connection target.
//!
//! This is deliberately not a general URI parser. It recognizes exactly one
//! shape, `https://<host>[:<port>]/<path>`, and splits it into the pieces
//! needed to open a connection and write a request line. There is no
//! percent-decoding, no query-string separation and no IPv6 literal support;
//! anything after the first `/` following the authority is carried verbatim
//! as the request target.

use std::collections::TryReserveError;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The only scheme accepted by [`Target::parse`].
pub const HTTPS_PREFIX: &str = "https://";

/// The port used when the URL does not name one.
pub const DEFAULT_PORT: u16 = 443;

/// Error returned when a URL can't be turned into a [`Target`].
#[derive(Debug, Error)]
pub enum UrlError {
    /// The URL is malformed. The message names the rule it broke.
    #[error("invalid url: {0}")]
    Invalid(&'static str),

    /// Memory for the host or path could not be reserved.
    #[error("allocation failed while copying url components")]
    Allocation(#[from] TryReserveError),
}

/// The host, port and request path extracted from an `https://` URL.
///
/// A `Target` always holds a non-empty host and a path beginning with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    host: String,
    port: u16,
    path: String,
}

impl Target {
    /// Parse a URL of the form `https://<host>[:<port>]/<path>`.
    ///
    /// # Example
    /// ```
    /// # use getweb::url::Target;
    /// let target = Target::parse("https://example.com:8443/a/b").unwrap();
    /// assert_eq!(target.host(), "example.com");
    /// assert_eq!(target.port(), 8443);
    /// assert_eq!(target.path(), "/a/b");
    /// ```
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        if url.len() < HTTPS_PREFIX.len() || !url.starts_with(HTTPS_PREFIX) {
            return Err(UrlError::Invalid("url must begin with https://"));
        }

        let rest = &url[HTTPS_PREFIX.len()..];
        let path_start = rest
            .find('/')
            .ok_or(UrlError::Invalid("url has no path separator"))?;

        // The scan for ':' is bounded by the first '/', so a colon inside the
        // path never starts a port.
        let authority = &rest[..path_start];
        let (host, port) = match authority.find(':') {
            Some(colon) => (&authority[..colon], parse_port(&authority[colon + 1..])?),
            None => (authority, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(UrlError::Invalid("url has an empty host"));
        }

        Ok(Self {
            host: copy_str(host)?,
            port,
            path: copy_str(&rest[path_start..])?,
        })
    }

    /// The host name (or address literal) to connect to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port to connect to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The request target, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for Target {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}{}", HTTPS_PREFIX, self.host, self.port, self.path)
    }
}

fn parse_port(digits: &str) -> Result<u16, UrlError> {
    if digits.is_empty() {
        return Err(UrlError::Invalid("url has an empty port"));
    }

    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UrlError::Invalid("url port is not a decimal number"));
    }

    digits
        .parse()
        .map_err(|_| UrlError::Invalid("url port is out of range"))
}

fn copy_str(s: &str) -> Result<String, TryReserveError> {
    let mut owned = String::new();
    owned.try_reserve_exact(s.len())?;
    owned.push_str(s);
    Ok(owned)
}
