//! Connection building blocks for the client.
//!
//! A session is assembled from three layers:
//!
//! - a [`Transport`] opens a byte stream to a host and port,
//! - a [`TlsProvider`] wraps that stream in a [`TlsChannel`],
//! - the [`protocol`] module writes the request and reads the response over the channel.
//!
//! Each layer is a trait so that tests can substitute in-memory implementations.

pub mod dns;
pub mod protocol;
pub mod tls;
pub mod transport;

pub use self::tls::{TlsChannel, TlsProvider};
pub use self::transport::tcp::{TcpTransport, TcpTransportConfig};
pub use self::transport::Transport;
