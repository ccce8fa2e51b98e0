//! Server certificate verification policy.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

/// Whether the server's certificate chain is checked against the trusted roots.
///
/// Verification is on unless explicitly turned off. Turning it off accepts any
/// certificate for any name, and is only suitable for testing against servers
/// with self-signed certificates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateVerification {
    /// Verify the chain and the server name.
    #[default]
    Enabled,

    /// Accept any certificate.
    Disabled,
}

impl CertificateVerification {
    /// Whether verification is turned on.
    pub fn is_enabled(&self) -> bool {
        matches!(self, CertificateVerification::Enabled)
    }
}

impl From<bool> for CertificateVerification {
    fn from(enabled: bool) -> Self {
        if enabled {
            CertificateVerification::Enabled
        } else {
            CertificateVerification::Disabled
        }
    }
}

/// Accepts every certificate chain, but still checks handshake signatures so the
/// peer must hold the key for the certificate it presents.
#[derive(Debug)]
pub(crate) struct NoVerifier {
    provider: Arc<CryptoProvider>,
}

impl NoVerifier {
    pub(crate) fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
