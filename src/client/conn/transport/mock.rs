//! A scripted in-memory transport, suitable for testing behavior of transport-dependent code.
//!
//! A [`MockTransport`] hands out [`MockStream`]s which replay a fixed response and
//! record everything written to them. Clones of a transport share that state, so a
//! test can keep one handle for inspection while another is moved into a session.

use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

use super::Transport;

static IDENT: AtomicU16 = AtomicU16::new(1);

/// A unique identifier for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamID(u16);

impl StreamID {
    /// Create a new unique stream identifier.
    pub fn new() -> Self {
        Self(IDENT.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for StreamID {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// An error that can occur when connecting a mock transport.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("connection error")]
pub struct MockConnectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransportMode {
    Connected,
    ConnectionError,
}

#[derive(Debug, Default)]
struct MockState {
    incoming: Cursor<Vec<u8>>,
    written: Vec<u8>,
    chunk: Option<usize>,
    fail_at_end: bool,
    fail_writes: bool,
    open: bool,
    connections: usize,
    reads: usize,
    target: Option<(String, u16)>,
}

/// A mock transport that replays a scripted response.
#[derive(Debug, Clone)]
pub struct MockTransport {
    mode: TransportMode,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Transport whose streams yield `response` and then end.
    pub fn new(response: impl Into<Vec<u8>>) -> Self {
        let state = MockState {
            incoming: Cursor::new(response.into()),
            ..Default::default()
        };
        Self {
            mode: TransportMode::Connected,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Transport which immediately returns an error.
    pub fn connection_error() -> Self {
        Self {
            mode: TransportMode::ConnectionError,
            state: Default::default(),
        }
    }

    /// Yield at most `chunk` bytes per read.
    pub fn with_chunk_size(self, chunk: usize) -> Self {
        self.state.lock().chunk = Some(chunk);
        self
    }

    /// Fail reads with an error once the response is exhausted, instead of ending cleanly.
    pub fn with_error_at_end(self) -> Self {
        self.state.lock().fail_at_end = true;
        self
    }

    /// Fail every write with a broken pipe, as if the peer closed before the request.
    pub fn with_write_error(self) -> Self {
        self.state.lock().fail_writes = true;
        self
    }

    /// Everything written to streams from this transport.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Whether a stream from this transport is still alive.
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Number of successful connections made.
    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }

    /// Number of read calls made against the streams.
    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Bytes of the scripted response not yet read.
    pub fn remaining(&self) -> usize {
        let state = self.state.lock();
        state.incoming.get_ref().len() - state.incoming.position() as usize
    }

    /// The host and port of the most recent connection.
    pub fn target(&self) -> Option<(String, u16)> {
        self.state.lock().target.clone()
    }
}

impl Transport for MockTransport {
    type IO = MockStream;
    type Error = MockConnectionError;

    fn connect(&mut self, host: &str, port: u16) -> Result<Self::IO, Self::Error> {
        if self.mode == TransportMode::ConnectionError {
            return Err(MockConnectionError);
        }

        {
            let mut state = self.state.lock();
            state.open = true;
            state.connections += 1;
            state.target = Some((host.to_owned(), port));
        }

        let stream = MockStream {
            state: self.state.clone(),
            ident: StreamID::new(),
        };
        trace!(id=%stream.id(), "creating connection");
        Ok(stream)
    }
}

/// A mock stream connection for testing.
#[derive(Debug)]
pub struct MockStream {
    state: Arc<Mutex<MockState>>,
    ident: StreamID,
}

impl MockStream {
    /// Get a unique ID for this connection stream.
    pub fn id(&self) -> StreamID {
        self.ident
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.reads += 1;

        let limit = match state.chunk {
            Some(chunk) => buf.len().min(chunk),
            None => buf.len(),
        };
        let n = state.incoming.read(&mut buf[..limit])?;
        if n == 0 && limit > 0 && state.fail_at_end {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by mock peer",
            ));
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock peer closed the connection",
            ));
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        trace!(id=%self.ident, "closing connection");
        self.state.lock().open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_replays_response_and_records_writes() {
        let mut transport = MockTransport::new(&b"HTTP/1.1 200 OK\r\n\r\n"[..]).with_chunk_size(4);
        let handle = transport.clone();

        let mut stream = transport.connect("example.com", 443).unwrap();
        assert!(handle.is_open());
        assert_eq!(handle.target(), Some(("example.com".to_owned(), 443)));

        stream.write_all(b"GET / HTTP/1.1\r\n").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(handle.remaining(), 15);

        drop(stream);
        assert!(!handle.is_open());
        assert_eq!(handle.written(), b"GET / HTTP/1.1\r\n");
        assert_eq!(handle.connections(), 1);
    }

    #[test]
    fn write_error_records_nothing() {
        let mut transport = MockTransport::new(Vec::new()).with_write_error();
        let mut stream = transport.connect("example.com", 443).unwrap();

        let error = stream.write_all(b"GET / HTTP/1.1\r\n").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
        assert!(transport.written().is_empty());
    }

    #[test]
    fn connection_error() {
        let mut transport = MockTransport::connection_error();
        assert_eq!(
            transport.connect("example.com", 443).unwrap_err(),
            MockConnectionError
        );
        assert_eq!(transport.connections(), 0);
    }
}
