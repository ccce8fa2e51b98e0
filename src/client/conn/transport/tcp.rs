//! TCP transport implementation for client connections.
//!
//! This module contains the [`TcpTransport`] type, which resolves a host name and
//! opens a blocking [`TcpStream`] to it. It also contains the [`TcpTransportConfig`]
//! type, which is used to configure TCP connections.
//!
//! Normally, you will not need to use this module directly. Instead, you can use the
//! [`Client`][crate::client::Client] type, which uses the [`TcpTransport`] by default.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::Transport;
use crate::client::conn::dns::{GaiResolver, Resolve, SocketAddrs};

/// A TCP transport for client connections.
///
/// The transport requires a resolver `R`, which is by default [`GaiResolver`],
/// using the system's resolver to turn host names into addresses. Resolved
/// addresses are tried in order, and the first one to accept the connection wins.
///
/// # Example
/// ```no_run
/// # use getweb::client::conn::transport::{Transport, tcp::TcpTransport};
/// let mut transport = TcpTransport::default();
/// let stream = transport.connect("example.com", 443).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransport<R = GaiResolver> {
    config: Arc<TcpTransportConfig>,
    resolver: R,
}

impl TcpTransport {
    /// Create a new `TcpTransport` with the given configuration and the system resolver.
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config: Arc::new(config),
            resolver: GaiResolver::new(),
        }
    }

    /// A builder for a `TcpTransport`.
    pub fn builder() -> TcpTransportBuilder<GaiResolver> {
        TcpTransportBuilder::default()
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(TcpTransportConfig::default())
    }
}

impl<R> TcpTransport<R> {
    /// Create a new `TcpTransport` with the given configuration and resolver.
    pub fn with_resolver(config: TcpTransportConfig, resolver: R) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
        }
    }

    /// Get the configuration for the TCP transport.
    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }
}

impl<R> Transport for TcpTransport<R>
where
    R: Resolve,
{
    type IO = TcpStream;
    type Error = TcpConnectionError;

    fn connect(&mut self, host: &str, port: u16) -> Result<Self::IO, Self::Error> {
        let _span = tracing::debug_span!("tcp", %host, port).entered();

        let mut addrs = self
            .resolver
            .resolve(host, port)
            .map_err(TcpConnectionError::msg("dns resolution"))?;
        addrs.set_port(port);

        connect_sequential(addrs, &self.config)
    }
}

/// Try each address in turn, returning the first connected stream.
///
/// When every address fails, the error from the last attempt is returned.
fn connect_sequential(
    addrs: SocketAddrs,
    config: &TcpTransportConfig,
) -> Result<TcpStream, TcpConnectionError> {
    if addrs.is_empty() {
        return Err(TcpConnectionError::new("no addresses resolved"));
    }

    let mut last_error = None;
    for addr in addrs {
        match connect(&addr, config) {
            Ok(stream) => {
                trace!(%addr, "tcp connected");
                return Ok(stream);
            }
            Err(error) => {
                debug!(%addr, %error, "tcp connection attempt failed");
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| TcpConnectionError::new("no addresses resolved")))
}

/// Builder for a [`TcpTransport`].
#[derive(Debug, Default)]
pub struct TcpTransportBuilder<R> {
    config: TcpTransportConfig,
    resolver: R,
}

impl<R> TcpTransportBuilder<R> {
    /// Replace the connection configuration.
    pub fn with_config(mut self, config: TcpTransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Mutable access to the connection configuration.
    pub fn config(&mut self) -> &mut TcpTransportConfig {
        &mut self.config
    }

    /// Use a different resolver.
    pub fn with_resolver<R2>(self, resolver: R2) -> TcpTransportBuilder<R2> {
        TcpTransportBuilder {
            config: self.config,
            resolver,
        }
    }

    /// Use the system resolver.
    pub fn with_gai_resolver(self) -> TcpTransportBuilder<GaiResolver> {
        self.with_resolver(GaiResolver::new())
    }

    /// Build the transport.
    pub fn build(self) -> TcpTransport<R> {
        TcpTransport::with_resolver(self.config, self.resolver)
    }
}

/// Error type for TCP connections.
#[derive(Debug, Error)]
pub struct TcpConnectionError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TcpConnectionError {
    pub(crate) fn new<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn msg<S, E>(message: S) -> impl FnOnce(E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        move |error| Self::build(message, error)
    }

    pub(crate) fn build<S, E>(message: S, error: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(error)),
        }
    }
}

impl fmt::Display for TcpConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref source) = self.source {
            write!(f, "{}: {}", self.message, source)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Configuration for TCP connections.
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// The timeout for connecting to a single remote address.
    pub connect_timeout: Option<Duration>,

    /// The timeout for a single read on the connected stream.
    pub read_timeout: Option<Duration>,

    /// The timeout for a single write on the connected stream.
    pub write_timeout: Option<Duration>,

    /// The local IPv4 address to bind to.
    pub local_address_ipv4: Option<Ipv4Addr>,

    /// The local IPv6 address to bind to.
    pub local_address_ipv6: Option<Ipv6Addr>,

    /// Whether to disable Nagle's algorithm.
    pub nodelay: bool,

    /// The size of the send buffer.
    pub send_buffer_size: Option<usize>,

    /// The size of the receive buffer.
    pub recv_buffer_size: Option<usize>,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
            local_address_ipv4: None,
            local_address_ipv6: None,
            nodelay: true,
            send_buffer_size: None,
            recv_buffer_size: None,
        }
    }
}

fn bind_local_address(
    socket: &Socket,
    dst_addr: &SocketAddr,
    local_addr_ipv4: &Option<Ipv4Addr>,
    local_addr_ipv6: &Option<Ipv6Addr>,
) -> io::Result<()> {
    match (*dst_addr, local_addr_ipv4, local_addr_ipv6) {
        (SocketAddr::V4(_), Some(addr), _) => {
            socket.bind(&SocketAddr::new((*addr).into(), 0).into())?;
        }
        (SocketAddr::V6(_), _, Some(addr)) => {
            socket.bind(&SocketAddr::new((*addr).into(), 0).into())?;
        }
        _ => {}
    }

    Ok(())
}

#[tracing::instrument(skip(config), level = "debug")]
fn connect(addr: &SocketAddr, config: &TcpTransportConfig) -> Result<TcpStream, TcpConnectionError> {
    let domain = Domain::for_address(*addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(TcpConnectionError::msg("tcp open error"))?;

    if let Some(size) = config.send_buffer_size {
        if let Err(e) = socket.set_send_buffer_size(size) {
            warn!("tcp set_buffer_size error: {}", e);
        }
    }

    if let Some(size) = config.recv_buffer_size {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            warn!("tcp set_recv_buffer_size error: {}", e);
        }
    }

    bind_local_address(
        &socket,
        addr,
        &config.local_address_ipv4,
        &config.local_address_ipv6,
    )
    .map_err(TcpConnectionError::msg("tcp bind local address"))?;

    let remote = (*addr).into();
    match config.connect_timeout {
        Some(timeout) => socket.connect_timeout(&remote, timeout),
        None => socket.connect(&remote),
    }
    .map_err(TcpConnectionError::msg("tcp connect error"))?;

    socket
        .set_read_timeout(config.read_timeout)
        .map_err(TcpConnectionError::msg("tcp set_read_timeout error"))?;
    socket
        .set_write_timeout(config.write_timeout)
        .map_err(TcpConnectionError::msg("tcp set_write_timeout error"))?;

    let stream: TcpStream = socket.into();
    if let Err(e) = stream.set_nodelay(config.nodelay) {
        warn!("tcp set_nodelay error: {}", e);
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;

    use super::*;

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    #[test]
    fn connects_to_resolved_address() {
        let listener = TcpListener::bind(localhost(0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"hello").unwrap();
        });

        let mut transport = TcpTransport::builder()
            .with_resolver(|_: &str, port: u16| -> io::Result<SocketAddrs> {
                Ok(SocketAddrs::from_iter([localhost(port)]))
            })
            .build();

        let mut stream = transport.connect("example.com", port).unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
        assert_eq!(stream.peer_addr().unwrap(), localhost(port));
        assert!(stream.nodelay().unwrap());

        server.join().unwrap();
    }

    #[test]
    fn falls_through_to_next_address() {
        let listener = TcpListener::bind(localhost(0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        // Bind and drop to find a port nobody is listening on.
        let closed = TcpListener::bind(localhost(0))
            .unwrap()
            .local_addr()
            .unwrap();

        let addrs = SocketAddrs::from_iter([closed, listener.local_addr().unwrap()]);
        let stream = connect_sequential(addrs, &TcpTransportConfig::default()).unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn no_addresses_is_an_error() {
        let error = connect_sequential(SocketAddrs::default(), &TcpTransportConfig::default())
            .unwrap_err();
        assert_eq!(error.to_string(), "no addresses resolved");
    }

    #[test]
    fn resolution_failure_is_a_connection_error() {
        let mut transport = TcpTransport::builder()
            .with_resolver(|_: &str, _: u16| -> io::Result<SocketAddrs> {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such host"))
            })
            .build();

        let error = transport.connect("nowhere.invalid", 443).unwrap_err();
        assert_eq!(error.to_string(), "dns resolution: no such host");
    }

    #[test]
    fn timeouts_are_applied() {
        let listener = TcpListener::bind(localhost(0)).unwrap();
        let config = TcpTransportConfig {
            // The kernel rounds socket timeouts to its tick, so use whole seconds.
            read_timeout: Some(Duration::from_secs(2)),
            write_timeout: None,
            ..Default::default()
        };

        let stream = connect(&listener.local_addr().unwrap(), &config).unwrap();
        assert_eq!(stream.read_timeout().unwrap(), Some(Duration::from_secs(2)));
        assert_eq!(stream.write_timeout().unwrap(), None);
    }
}
