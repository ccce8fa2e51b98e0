//! Transport streams for connecting to remote servers.
//!
//! Transports are responsible for establishing a connection to a remote server and
//! handing back a blocking, bidirectional byte stream. They know nothing about TLS
//! or HTTP; the session layers those on top of the stream a transport returns.

use std::io::{Read, Write};

use crate::BoxError;

#[cfg(any(test, feature = "mocks"))]
pub mod mock;
pub mod tcp;

/// Opens connections to a host and port.
///
/// Name resolution and connection failures are reported through the same
/// error type; callers treat them as one failure to connect.
pub trait Transport {
    /// The connected byte stream.
    type IO: Read + Write;

    /// Error returned when a connection cannot be established.
    type Error: Into<BoxError>;

    /// Resolve `host` and connect to it on `port`.
    fn connect(&mut self, host: &str, port: u16) -> Result<Self::IO, Self::Error>;
}

impl<T> Transport for &mut T
where
    T: Transport + ?Sized,
{
    type IO = T::IO;
    type Error = T::Error;

    fn connect(&mut self, host: &str, port: u16) -> Result<Self::IO, Self::Error> {
        (**self).connect(host, port)
    }
}
