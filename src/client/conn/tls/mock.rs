//! A pass-through TLS provider for testing sessions without certificates.
//!
//! [`MockTls`] produces channels which forward bytes untouched, and can be scripted
//! to fail at any of its steps. Clones share counters, so a test can observe how
//! many contexts are alive and whether channels were shut down.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use super::{TlsChannel, TlsProvider};

/// An error produced by a [`MockTls`] provider.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockTlsError {
    /// Context creation was scripted to fail.
    #[error("mock tls context error")]
    Context,

    /// Binding a channel was scripted to fail.
    #[error("mock tls bind error")]
    Bind,
}

/// Which step of the mock provider fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MockTlsMode {
    /// Every step succeeds.
    #[default]
    Ok,

    /// [`TlsProvider::new_context`] fails.
    ContextError,

    /// [`TlsProvider::bind`] fails.
    BindError,

    /// [`TlsChannel::handshake`] fails.
    HandshakeError,
}

#[derive(Debug, Default)]
struct Counters {
    contexts: AtomicUsize,
    released: AtomicUsize,
    handshakes: AtomicUsize,
    shutdowns: AtomicUsize,
}

/// A TLS provider which does no encryption.
#[derive(Debug, Clone, Default)]
pub struct MockTls {
    mode: MockTlsMode,
    domains: Arc<parking_lot::Mutex<Vec<String>>>,
    counters: Arc<Counters>,
}

impl MockTls {
    /// A provider which fails at the given step.
    pub fn new(mode: MockTlsMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Number of contexts created.
    pub fn contexts_created(&self) -> usize {
        self.counters.contexts.load(Ordering::SeqCst)
    }

    /// Number of contexts created and not yet dropped.
    pub fn contexts_alive(&self) -> usize {
        self.contexts_created() - self.counters.released.load(Ordering::SeqCst)
    }

    /// Number of completed handshakes.
    pub fn handshakes(&self) -> usize {
        self.counters.handshakes.load(Ordering::SeqCst)
    }

    /// Number of channel shutdowns.
    pub fn shutdowns(&self) -> usize {
        self.counters.shutdowns.load(Ordering::SeqCst)
    }

    /// Server names channels were bound to.
    pub fn domains(&self) -> Vec<String> {
        self.domains.lock().clone()
    }
}

/// A context from a [`MockTls`] provider. Dropping it is counted.
#[derive(Debug)]
pub struct MockTlsContext {
    counters: Arc<Counters>,
}

impl Drop for MockTlsContext {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl<IO> TlsProvider<IO> for MockTls
where
    IO: Read + Write,
{
    type Context = MockTlsContext;
    type Channel = MockTlsChannel<IO>;
    type Error = MockTlsError;

    fn new_context(&self) -> Result<Self::Context, Self::Error> {
        if self.mode == MockTlsMode::ContextError {
            return Err(MockTlsError::Context);
        }

        self.counters.contexts.fetch_add(1, Ordering::SeqCst);
        Ok(MockTlsContext {
            counters: self.counters.clone(),
        })
    }

    fn bind(
        &self,
        _context: &Self::Context,
        domain: &str,
        io: IO,
    ) -> Result<Self::Channel, Self::Error> {
        if self.mode == MockTlsMode::BindError {
            return Err(MockTlsError::Bind);
        }

        self.domains.lock().push(domain.to_owned());
        Ok(MockTlsChannel {
            inner: io,
            fail_handshake: self.mode == MockTlsMode::HandshakeError,
            counters: self.counters.clone(),
        })
    }
}

/// A channel which forwards bytes to its stream unchanged.
#[derive(Debug)]
pub struct MockTlsChannel<IO> {
    inner: IO,
    fail_handshake: bool,
    counters: Arc<Counters>,
}

impl<IO> MockTlsChannel<IO> {
    /// The underlying stream.
    pub fn get_ref(&self) -> &IO {
        &self.inner
    }
}

impl<IO: Read> Read for MockTlsChannel<IO> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<IO: Write> Write for MockTlsChannel<IO> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<IO: Read + Write> TlsChannel for MockTlsChannel<IO> {
    fn handshake(&mut self) -> io::Result<()> {
        if self.fail_handshake {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "mock certificate rejected",
            ));
        }
        self.counters.handshakes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.flush()
    }
}
