#[cfg(feature = "tls")]
use crate::client::conn::tls::RustlsProvider;
use crate::client::conn::{TcpTransport, TcpTransportConfig, TlsProvider, Transport};
use crate::client::{Client, Config};

/// A builder for a client.
///
/// The transport and TLS provider start out unset (`()`), and must both be
/// supplied before the client can be built.
#[derive(Debug)]
pub struct Builder<T, P> {
    transport: T,
    tls: P,
    config: Config,
}

impl Builder<(), ()> {
    /// Create a new, empty builder
    pub fn new() -> Self {
        Self {
            transport: (),
            tls: (),
            config: Config::default(),
        }
    }
}

impl Default for Builder<(), ()> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tls")]
impl Default for Builder<TcpTransport, RustlsProvider> {
    fn default() -> Self {
        Self {
            transport: TcpTransport::default(),
            tls: RustlsProvider::default(),
            config: Config::default(),
        }
    }
}

impl<T, P> Builder<T, P> {
    /// Use the provided transport.
    pub fn with_transport<T2>(self, transport: T2) -> Builder<T2, P> {
        Builder {
            transport,
            tls: self.tls,
            config: self.config,
        }
    }

    /// Use a TCP transport with the provided configuration.
    pub fn with_tcp(self, config: TcpTransportConfig) -> Builder<TcpTransport, P> {
        self.with_transport(TcpTransport::new(config))
    }

    /// Use the provided TLS provider.
    pub fn with_tls<P2>(self, tls: P2) -> Builder<T, P2> {
        Builder {
            transport: self.transport,
            tls,
            config: self.config,
        }
    }

    /// Use rustls, verifying against the platform's root certificates.
    #[cfg(feature = "tls")]
    pub fn with_default_tls(self) -> Builder<T, RustlsProvider> {
        self.with_tls(RustlsProvider::default())
    }

    /// Replace all session limits.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum length of the encoded request.
    pub fn request_limit(mut self, limit: usize) -> Self {
        self.config.request_limit = limit;
        self
    }

    /// Set the maximum number of body bytes captured.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.config.body_limit = limit;
        self
    }

    /// Mutable access to the transport.
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Mutable access to the TLS provider.
    pub fn tls(&mut self) -> &mut P {
        &mut self.tls
    }
}

impl<T, P> Builder<T, P>
where
    T: Transport,
    P: TlsProvider<T::IO>,
{
    /// Build the client.
    pub fn build(self) -> Client<T, P> {
        Client {
            transport: self.transport,
            tls: self.tls,
            config: self.config,
        }
    }
}
