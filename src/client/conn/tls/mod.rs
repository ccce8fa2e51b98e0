//! TLS providers layered over a transport stream.
//!
//! A [`TlsProvider`] works in two steps, mirroring how sessions set up encryption:
//! a reusable context is created once, then bound to a connected stream and a
//! server name to produce a [`TlsChannel`]. The channel must complete its
//! [`handshake`](TlsChannel::handshake) before any application data is exchanged.

use std::io::{self, Read, Write};

use crate::BoxError;

#[cfg(feature = "tls")]
mod connector;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;
#[cfg(feature = "tls")]
mod verify;

#[cfg(feature = "tls")]
pub use self::connector::{RootStore, RustlsChannel, RustlsProvider, TlsError};
#[cfg(feature = "tls")]
pub use self::verify::CertificateVerification;

/// An encrypted channel over a transport stream.
pub trait TlsChannel: Read + Write {
    /// Drive the handshake to completion.
    fn handshake(&mut self) -> io::Result<()>;

    /// Tell the peer the channel is closing.
    ///
    /// This is best-effort; errors are reported but the channel is unusable afterwards either way.
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Creates TLS contexts and binds them to transport streams.
pub trait TlsProvider<IO> {
    /// Shared TLS state (trusted roots, verification policy, protocol settings).
    type Context;

    /// The channel produced by binding a context to a stream.
    type Channel: TlsChannel;

    /// Error creating a context or binding a channel.
    type Error: Into<BoxError>;

    /// Create a new context.
    fn new_context(&self) -> Result<Self::Context, Self::Error>;

    /// Bind `context` to `io`, expecting the server to be `domain`.
    fn bind(
        &self,
        context: &Self::Context,
        domain: &str,
        io: IO,
    ) -> Result<Self::Channel, Self::Error>;
}
