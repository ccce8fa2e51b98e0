use std::fmt;
use std::io;

use thiserror::Error;

use crate::client::conn::protocol::request::RequestTooLarge;
use crate::client::conn::protocol::status::ScanError;
use crate::url::UrlError;
use crate::BoxError;

/// The step of a session at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Stage {
    /// Starting the session, before any URL is parsed.
    Session,

    /// Parsing the URL.
    Parse,

    /// Resolving the host and opening the transport.
    Connect,

    /// Creating the TLS context.
    TlsContext,

    /// Binding a TLS channel to the transport.
    TlsChannel,

    /// Performing the TLS handshake.
    Handshake,

    /// Encoding and writing the request.
    Request,

    /// Scanning the response status line and headers.
    Status,
}

impl Stage {
    /// A short, lowercase name for the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Session => "session",
            Stage::Parse => "parse",
            Stage::Connect => "connect",
            Stage::TlsContext => "tls context",
            Stage::TlsChannel => "tls channel",
            Stage::Handshake => "handshake",
            Stage::Request => "request",
            Stage::Status => "status",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong during a session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The URL was not a well-formed `https://` URL.
    #[error("invalid url: {0}")]
    InvalidUrl(&'static str),

    /// Memory for the parsed URL components could not be reserved.
    #[error("allocation failure")]
    AllocationFailure(#[source] std::collections::TryReserveError),

    /// Name resolution or the TCP connection failed.
    #[error("connect: {0}")]
    Connect(#[source] BoxError),

    /// The TLS context or channel could not be created.
    #[error("tls context: {0}")]
    TlsContext(#[source] BoxError),

    /// The TLS handshake failed.
    #[error("tls handshake: {0}")]
    TlsHandshake(#[source] BoxError),

    /// Reading from or writing to the TLS channel failed.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// The response status line could not be recovered.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The formatted request would not fit in the request buffer.
    #[error("request of {len} bytes exceeds the {limit} byte limit")]
    RequestTooLarge {
        /// Length of the formatted request.
        len: usize,
        /// Configured request limit.
        limit: usize,
    },

    /// The session already carried a request; sessions are single-use.
    #[error("session already used")]
    SessionReused,
}

impl From<UrlError> for ErrorKind {
    fn from(error: UrlError) -> Self {
        match error {
            UrlError::Invalid(reason) => ErrorKind::InvalidUrl(reason),
            UrlError::Allocation(error) => ErrorKind::AllocationFailure(error),
        }
    }
}

impl From<RequestTooLarge> for ErrorKind {
    fn from(error: RequestTooLarge) -> Self {
        ErrorKind::RequestTooLarge {
            len: error.len,
            limit: error.limit,
        }
    }
}

/// Session error: the stage that failed, and why.
#[derive(Debug, Error)]
#[error("{stage} failed")]
pub struct Error {
    stage: Stage,
    #[source]
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(stage: Stage, kind: impl Into<ErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    /// Returns a closure which wraps an error for the given stage, for use with `map_err`.
    pub(crate) fn at<E>(stage: Stage) -> impl FnOnce(E) -> Self
    where
        E: Into<ErrorKind>,
    {
        move |error| Self::new(stage, error)
    }

    /// The stage at which the session failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The reason the session failed.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Consume the error, returning the reason the session failed.
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }
}
