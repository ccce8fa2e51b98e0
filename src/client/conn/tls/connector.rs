//! TLS over blocking streams, provided by rustls.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{InvalidDnsNameError, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::verify::{CertificateVerification, NoVerifier};
use super::{TlsChannel, TlsProvider};

/// Errors creating a TLS context or binding a channel.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TlsError {
    /// No crypto provider was installed or compiled in.
    #[error("no crypto provider is available")]
    NoCryptoProvider,

    /// Verification is enabled, but there are no roots to verify against.
    #[error("no trusted root certificates")]
    NoRootCertificates,

    /// The host is not a valid TLS server name.
    #[error("invalid server name")]
    InvalidServerName(#[from] InvalidDnsNameError),

    /// Rustls rejected the configuration or connection.
    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

/// Where trusted root certificates come from.
#[derive(Debug, Clone, Default)]
pub enum RootStore {
    /// The platform's certificate store, loaded when a context is created.
    #[default]
    Native,

    /// A fixed set of roots.
    Custom(Arc<RootCertStore>),
}

/// Creates rustls client contexts and channels.
///
/// Each context is an `Arc<ClientConfig>`, so binding many channels to one context
/// is cheap. Certificate verification is enabled unless turned off with
/// [`with_verification`](Self::with_verification).
#[derive(Debug, Clone, Default)]
pub struct RustlsProvider {
    verification: CertificateVerification,
    roots: RootStore,
    config: Option<Arc<ClientConfig>>,
}

impl RustlsProvider {
    /// A provider which verifies against the platform's roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider which hands out a pre-built configuration as every context.
    ///
    /// The verification and root settings are ignored.
    pub fn from_config(config: Arc<ClientConfig>) -> Self {
        Self {
            config: Some(config),
            ..Default::default()
        }
    }

    /// Set the certificate verification policy.
    pub fn with_verification(mut self, verification: impl Into<CertificateVerification>) -> Self {
        self.verification = verification.into();
        self
    }

    /// Verify against `roots` instead of the platform's roots.
    pub fn with_root_store(mut self, roots: impl Into<Arc<RootCertStore>>) -> Self {
        self.roots = RootStore::Custom(roots.into());
        self
    }

    /// Verify against the platform's roots.
    pub fn with_native_roots(mut self) -> Self {
        self.roots = RootStore::Native;
        self
    }

    /// The certificate verification policy.
    pub fn verification(&self) -> CertificateVerification {
        self.verification
    }

    fn root_store(&self) -> Result<Arc<RootCertStore>, TlsError> {
        let roots = match &self.roots {
            RootStore::Custom(roots) => roots.clone(),
            RootStore::Native => Arc::new(native_roots()),
        };

        if roots.is_empty() {
            return Err(TlsError::NoRootCertificates);
        }
        Ok(roots)
    }
}

fn native_roots() -> RootCertStore {
    let loaded = rustls_native_certs::load_native_certs();
    for error in &loaded.errors {
        warn!(%error, "failed to load native certificates");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    if ignored > 0 {
        warn!(ignored, "ignored unparsable native certificates");
    }
    debug!(added, "loaded native root certificates");
    roots
}

/// The installed process-wide provider, or the one selected by crate features.
fn crypto_provider() -> Result<Arc<CryptoProvider>, TlsError> {
    CryptoProvider::get_default()
        .cloned()
        .or_else(builtin_provider)
        .ok_or(TlsError::NoCryptoProvider)
}

fn builtin_provider() -> Option<Arc<CryptoProvider>> {
    #[cfg(feature = "tls-ring")]
    let provider = Some(rustls::crypto::ring::default_provider());
    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    let provider = Some(rustls::crypto::aws_lc_rs::default_provider());
    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    let provider: Option<CryptoProvider> = None;

    provider.map(Arc::new)
}

impl<IO> TlsProvider<IO> for RustlsProvider
where
    IO: Read + Write,
{
    type Context = Arc<ClientConfig>;
    type Channel = RustlsChannel<IO>;
    type Error = TlsError;

    fn new_context(&self) -> Result<Self::Context, Self::Error> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }

        let provider = crypto_provider()?;
        let builder =
            ClientConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;

        let builder = match self.verification {
            CertificateVerification::Enabled => builder.with_root_certificates(self.root_store()?),
            CertificateVerification::Disabled => {
                warn!("certificate verification is disabled");
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoVerifier::new(provider)))
            }
        };

        let mut config = builder.with_no_client_auth();
        config.alpn_protocols.push(b"http/1.1".to_vec());
        Ok(Arc::new(config))
    }

    fn bind(
        &self,
        context: &Self::Context,
        domain: &str,
        io: IO,
    ) -> Result<Self::Channel, Self::Error> {
        let name = ServerName::try_from(domain.to_owned())?;
        let conn = ClientConnection::new(context.clone(), name)?;
        trace!(%domain, "tls channel bound");
        Ok(RustlsChannel {
            stream: StreamOwned::new(conn, io),
        })
    }
}

/// A rustls client session over a blocking stream.
pub struct RustlsChannel<IO: Read + Write> {
    stream: StreamOwned<ClientConnection, IO>,
}

impl<IO: Read + Write> RustlsChannel<IO> {
    /// The underlying transport stream.
    pub fn get_ref(&self) -> &IO {
        &self.stream.sock
    }

    /// The rustls connection state.
    pub fn connection(&self) -> &ClientConnection {
        &self.stream.conn
    }
}

impl<IO: Read + Write> fmt::Debug for RustlsChannel<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsChannel")
            .field("handshaking", &self.stream.conn.is_handshaking())
            .field("protocol", &self.stream.conn.protocol_version())
            .finish()
    }
}

impl<IO: Read + Write> Read for RustlsChannel<IO> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<IO: Read + Write> Write for RustlsChannel<IO> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl<IO: Read + Write> TlsChannel for RustlsChannel<IO> {
    fn handshake(&mut self) -> io::Result<()> {
        let StreamOwned { conn, sock } = &mut self.stream;
        while conn.is_handshaking() {
            conn.complete_io(sock)?;
        }

        debug!(
            protocol = ?conn.protocol_version(),
            alpn = ?conn.alpn_protocol().map(String::from_utf8_lossy),
            "tls handshake complete"
        );
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        let StreamOwned { conn, sock } = &mut self.stream;
        if conn.is_handshaking() {
            return Ok(());
        }

        conn.send_close_notify();
        while conn.wants_write() {
            conn.write_tls(sock)?;
        }
        sock.flush()
    }
}
