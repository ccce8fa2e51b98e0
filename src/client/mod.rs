//! A minimal HTTPS client, built on blocking I/O.
//!
//! There are two levels of available APIs in this library:
//!
//! 1. The [`Client`] API, which holds a transport and TLS provider and runs one
//!    fresh [`HttpsSession`] per request.
//! 2. The [connection][self::conn] API, which exposes the transport, TLS and protocol
//!    layers a session is assembled from. This is useful for substituting custom
//!    transports or TLS backends.
//!
//! Every request is a single `GET` over a new connection which is closed
//! afterwards. Only the status code and, for `200` responses, a bounded amount of
//! body are returned.

use crate::client::conn::protocol::request::DEFAULT_REQUEST_LIMIT;
#[cfg(feature = "tls")]
use crate::client::conn::tls::RustlsProvider;
#[cfg(feature = "tls")]
use crate::client::conn::TcpTransport;
use crate::client::conn::{TlsProvider, Transport};

mod builder;
pub mod conn;
mod error;
mod session;

pub use self::builder::Builder;
pub use self::error::{Error, ErrorKind, Stage};
pub use self::session::{HttpsSession, Response, State};

/// Default bound on the number of body bytes captured.
pub const DEFAULT_BODY_LIMIT: usize = 20480;

/// Limits applied to each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum length of the encoded request, in bytes.
    pub request_limit: usize,

    /// Maximum number of body bytes captured.
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_limit: DEFAULT_REQUEST_LIMIT,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// A client for single `GET` requests over HTTPS.
///
/// The client is cheap to share; each call to [`get`](Client::get) clones the
/// transport and TLS provider into a new session.
///
/// # Example
/// ```no_run
/// # fn run() -> Result<(), getweb::Error> {
/// let client = getweb::Client::new();
/// let response = client.get("https://www.example.com/")?;
/// println!("{}: {} bytes", response.status(), response.body().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client<T, P> {
    transport: T,
    tls: P,
    config: Config,
}

impl Client<(), ()> {
    /// A builder for a client.
    pub fn builder() -> Builder<(), ()> {
        Builder::new()
    }
}

#[cfg(feature = "tls")]
impl Client<TcpTransport, RustlsProvider> {
    /// A client using TCP and rustls with the platform's root certificates.
    pub fn new() -> Self {
        Builder::default().build()
    }
}

#[cfg(feature = "tls")]
impl Default for Client<TcpTransport, RustlsProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> Client<T, P> {
    /// The limits applied to each session.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The transport used to open connections.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The TLS provider used to secure connections.
    pub fn tls(&self) -> &P {
        &self.tls
    }
}

impl<T, P> Client<T, P>
where
    T: Transport + Clone,
    P: TlsProvider<T::IO> + Clone,
{
    /// A new, empty session using this client's transport, TLS provider and limits.
    pub fn session(&self) -> HttpsSession<T, P> {
        HttpsSession::with_config(self.transport.clone(), self.tls.clone(), self.config)
    }

    /// Fetch `url` on a new session.
    pub fn get(&self, url: &str) -> Result<Response, Error> {
        self.session().fetch(url)
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::client::conn::tls::mock::MockTls;
    use crate::client::conn::transport::mock::MockTransport;

    #[cfg(feature = "tls")]
    assert_impl_all!(Client<TcpTransport, RustlsProvider>: Send, Sync, Clone);

    #[test]
    fn default_limits() {
        let config = Config::default();
        assert_eq!(config.request_limit, 512);
        assert_eq!(config.body_limit, 20480);
    }

    #[test]
    fn each_get_uses_a_new_session() {
        let transport = MockTransport::new(&b"HTTP/1.1 404 Not Found\r\n\r\n"[..]);
        let client = Client::builder()
            .with_transport(transport.clone())
            .with_tls(MockTls::default())
            .build();

        assert_eq!(client.get("https://example.com/a").unwrap().status(), 404);

        // The scripted response has been consumed, so the next session sees a closed stream.
        let error = client.get("https://example.com/b").unwrap_err();
        assert_eq!(error.stage(), Stage::Status);
        assert_eq!(transport.connections(), 2);
    }
}
