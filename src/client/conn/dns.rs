//! DNS resolution utilities.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

/// Resolves a host name to the socket addresses a transport may connect to.
///
/// This is implemented for closures, which is mostly useful in tests:
///
/// ```
/// # use std::net::{Ipv4Addr, SocketAddr};
/// # use getweb::client::conn::dns::{Resolve, SocketAddrs};
/// let mut resolver = |_: &str, port: u16| -> std::io::Result<SocketAddrs> {
///     Ok(SocketAddrs::from_iter([SocketAddr::from((Ipv4Addr::LOCALHOST, port))]))
/// };
/// let addrs = resolver.resolve("example.com", 8443).unwrap();
/// assert_eq!(addrs.len(), 1);
/// ```
pub trait Resolve {
    /// Resolve `host`, returning addresses with `port` applied.
    fn resolve(&mut self, host: &str, port: u16) -> io::Result<SocketAddrs>;
}

impl<F> Resolve for F
where
    F: FnMut(&str, u16) -> io::Result<SocketAddrs>,
{
    fn resolve(&mut self, host: &str, port: u16) -> io::Result<SocketAddrs> {
        (self)(host, port)
    }
}

/// GetAddrInfo based resolver.
///
/// This resolver uses the `getaddrinfo` system call to resolve
/// hostnames to IP addresses via the operating system. It blocks
/// the calling thread.
#[derive(Debug, Default, Clone)]
pub struct GaiResolver {
    _priv: (),
}

impl GaiResolver {
    /// Create a new `GaiResolver`.
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl Resolve for GaiResolver {
    fn resolve(&mut self, host: &str, port: u16) -> io::Result<SocketAddrs> {
        let _span = tracing::trace_span!("getaddrinfo", %host).entered();
        tracing::trace!("dns resolution starting");
        let addrs: SocketAddrs = (host, port).to_socket_addrs()?.collect();
        tracing::trace!(count = addrs.len(), "dns resolution finished");
        Ok(addrs)
    }
}

/// The addresses a host resolved to, in preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketAddrs(Vec<SocketAddr>);

impl SocketAddrs {
    /// Whether no addresses were found.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of addresses.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Overwrite the port on every address.
    pub fn set_port(&mut self, port: u16) {
        for addr in &mut self.0 {
            addr.set_port(port);
        }
    }

    /// Iterate over the addresses.
    pub fn iter(&self) -> std::slice::Iter<'_, SocketAddr> {
        self.0.iter()
    }
}

impl FromIterator<SocketAddr> for SocketAddrs {
    fn from_iter<T: IntoIterator<Item = SocketAddr>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SocketAddrs {
    type Item = SocketAddr;
    type IntoIter = std::vec::IntoIter<SocketAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SocketAddrs {
    type Item = &'a SocketAddr;
    type IntoIter = std::slice::Iter<'a, SocketAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn gai_resolves_ip_literals() {
        let addrs = GaiResolver::new().resolve("127.0.0.1", 8443).unwrap();
        assert_eq!(
            addrs.into_iter().collect::<Vec<_>>(),
            vec![SocketAddr::from((Ipv4Addr::LOCALHOST, 8443))]
        );
    }

    #[test]
    fn set_port_applies_to_all() {
        let mut addrs: SocketAddrs = [
            SocketAddr::from((Ipv4Addr::LOCALHOST, 1)),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 2)),
        ]
        .into_iter()
        .collect();
        addrs.set_port(443);
        assert!(addrs.iter().all(|addr| addr.port() == 443));
    }
}
