//! The single-request HTTPS session state machine.

use std::fmt;
use std::io::{self, Write as _};

use bytes::{Bytes, BytesMut};
use tracing::{debug, field, trace, warn};

use super::conn::protocol::{encode_get, read_content, StatusScanner};
use super::conn::{TlsChannel, TlsProvider, Transport};
use super::error::{Error, ErrorKind, Stage};
use super::Config;
use crate::url::Target;

/// Where a session is in its lifecycle.
///
/// States only move forward, in declaration order. A failure at any step moves
/// the session to [`Failed`](State::Failed), and every session ends [`Closed`](State::Closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Constructed, nothing acquired.
    Empty,
    /// The URL was parsed into a target.
    Parsed,
    /// The transport is connected.
    TransportOpen,
    /// A TLS context exists.
    TlsContextReady,
    /// A TLS channel is bound to the transport.
    TlsChannelReady,
    /// The TLS handshake completed.
    HandshakeComplete,
    /// The request was written and flushed.
    RequestSent,
    /// The response status code was scanned.
    StatusKnown(u16),
    /// The body was read.
    BodyRead,
    /// All resources were released.
    Closed,
    /// The given stage failed; teardown follows immediately.
    Failed(Stage),
}

/// The outcome of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    body: Bytes,
}

impl Response {
    /// The response status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The captured body. Empty unless the status was `200`.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response, returning the body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// A single HTTPS `GET`: connect, handshake, request, status, body, teardown.
///
/// The session exclusively owns every resource it acquires. Resources are
/// acquired strictly in order, and released by [`teardown`](Self::teardown),
/// which is safe to call at any point and any number of times. Teardown also
/// runs when the session is dropped.
///
/// Sessions are single-use: once [`fetch`](Self::fetch) has run, the session is
/// closed and further calls fail with [`ErrorKind::SessionReused`].
pub struct HttpsSession<T, P>
where
    T: Transport,
    P: TlsProvider<T::IO>,
{
    transport: T,
    tls: P,
    config: Config,

    target: Option<Target>,
    stream: Option<T::IO>,
    context: Option<P::Context>,
    channel: Option<P::Channel>,

    state: State,
    failure: Option<Stage>,
}

impl<T, P> fmt::Debug for HttpsSession<T, P>
where
    T: Transport,
    P: TlsProvider<T::IO>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpsSession")
            .field("state", &self.state)
            .field("target", &self.target)
            .field("transport", &self.stream.is_some())
            .field("context", &self.context.is_some())
            .field("channel", &self.channel.is_some())
            .finish()
    }
}

fn enter(state: &mut State, next: State) {
    trace!(from = ?state, to = ?next, "session state");
    *state = next;
}

impl<T, P> HttpsSession<T, P>
where
    T: Transport,
    P: TlsProvider<T::IO>,
{
    /// An empty session which will connect with `transport` and encrypt with `tls`.
    pub fn new(transport: T, tls: P) -> Self {
        Self::with_config(transport, tls, Config::default())
    }

    /// An empty session with explicit limits.
    pub fn with_config(transport: T, tls: P, config: Config) -> Self {
        Self {
            transport,
            tls,
            config,
            target: None,
            stream: None,
            context: None,
            channel: None,
            state: State::Empty,
            failure: None,
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The stage which failed, if the session failed.
    pub fn failure(&self) -> Option<Stage> {
        self.failure
    }

    /// The parsed target, while the session holds it.
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Whether the session currently holds a transport stream, bare or inside a TLS channel.
    pub fn has_transport(&self) -> bool {
        self.stream.is_some() || self.channel.is_some()
    }

    /// Whether the session currently holds a TLS context.
    pub fn has_tls_context(&self) -> bool {
        self.context.is_some()
    }

    /// Whether the session currently holds a TLS channel.
    pub fn has_tls_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Run the request for `url`, then tear the session down.
    ///
    /// On failure, the error names the stage which failed. Nothing acquired before
    /// the failure outlives this call.
    pub fn fetch(&mut self, url: &str) -> Result<Response, Error> {
        if self.state != State::Empty {
            return Err(Error::new(Stage::Session, ErrorKind::SessionReused));
        }

        let span = tracing::debug_span!("https", host = field::Empty, port = field::Empty);
        let _guard = span.enter();

        let result = self.run(url, &span);
        if let Err(error) = &result {
            self.failure = Some(error.stage());
            enter(&mut self.state, State::Failed(error.stage()));
            warn!(stage = %error.stage(), error = %error.kind(), "session failed");
        }

        self.teardown();
        result
    }

    fn run(&mut self, url: &str, span: &tracing::Span) -> Result<Response, Error> {
        let target = self
            .target
            .insert(Target::parse(url).map_err(Error::at(Stage::Parse))?);
        span.record("host", target.host());
        span.record("port", target.port());
        enter(&mut self.state, State::Parsed);

        let stream = self
            .transport
            .connect(target.host(), target.port())
            .map_err(|error| Error::new(Stage::Connect, ErrorKind::Connect(error.into())))?;
        self.stream = Some(stream);
        enter(&mut self.state, State::TransportOpen);

        let context = self.context.insert(
            self.tls
                .new_context()
                .map_err(|error| Error::new(Stage::TlsContext, ErrorKind::TlsContext(error.into())))?,
        );
        enter(&mut self.state, State::TlsContextReady);

        let stream = self.stream.take().ok_or_else(|| {
            Error::new(Stage::TlsChannel, io::Error::from(io::ErrorKind::NotConnected))
        })?;
        let channel = self.channel.insert(
            self.tls
                .bind(context, target.host(), stream)
                .map_err(|error| Error::new(Stage::TlsChannel, ErrorKind::TlsContext(error.into())))?,
        );
        enter(&mut self.state, State::TlsChannelReady);

        channel
            .handshake()
            .map_err(|error| Error::new(Stage::Handshake, ErrorKind::TlsHandshake(error.into())))?;
        enter(&mut self.state, State::HandshakeComplete);

        let request =
            encode_get(target, self.config.request_limit).map_err(Error::at(Stage::Request))?;
        channel
            .write_all(&request)
            .and_then(|()| channel.flush())
            .map_err(Error::at(Stage::Request))?;
        enter(&mut self.state, State::RequestSent);

        let status = StatusScanner::new()
            .scan(channel)
            .map_err(Error::at(Stage::Status))?;
        enter(&mut self.state, State::StatusKnown(status));

        if status != 200 {
            debug!(status, "skipping body");
            return Ok(Response {
                status,
                body: Bytes::new(),
            });
        }

        let mut body = BytesMut::zeroed(self.config.body_limit);
        let received = read_content(channel, &mut body);
        body.truncate(received);
        if received < self.config.body_limit {
            debug!(received, limit = self.config.body_limit, "short body");
        }
        enter(&mut self.state, State::BodyRead);

        Ok(Response {
            status,
            body: body.freeze(),
        })
    }

    /// Release everything the session holds, in reverse order of acquisition.
    ///
    /// The TLS channel is shut down first (failures are logged, not returned),
    /// then the context, transport and target are dropped. Calling this on a
    /// session that never started, or calling it repeatedly, is harmless.
    pub fn teardown(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(error) = channel.shutdown() {
                debug!(%error, "tls shutdown failed");
            }
        }

        self.context = None;
        self.stream = None;
        self.target = None;

        if self.state != State::Closed {
            enter(&mut self.state, State::Closed);
        }
    }
}

impl<T, P> Drop for HttpsSession<T, P>
where
    T: Transport,
    P: TlsProvider<T::IO>,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
