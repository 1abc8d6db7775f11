//! Certificate verification policy and the rustls connector built from it.

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_tungstenite::Connector;

use crate::errors::ConfigError;

/// How the server certificate is checked on `wss` endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify against the bundled webpki roots.
    #[default]
    Verified,
    /// Accept any certificate. Development only.
    #[cfg(feature = "insecure-tls")]
    InsecureSkipVerify,
}

impl TlsPolicy {
    /// Policy for the `tls.allowInsecure` setting.
    ///
    /// Fails when insecure TLS is requested in a build without the
    /// `insecure-tls` feature.
    pub fn from_allow_insecure(allow_insecure: bool) -> Result<Self, ConfigError> {
        if !allow_insecure {
            return Ok(Self::Verified);
        }
        #[cfg(feature = "insecure-tls")]
        {
            Ok(Self::InsecureSkipVerify)
        }
        #[cfg(not(feature = "insecure-tls"))]
        {
            Err(ConfigError::InsecureTlsUnavailable)
        }
    }

    /// Whether certificate verification is disabled.
    pub fn is_insecure(self) -> bool {
        match self {
            Self::Verified => false,
            #[cfg(feature = "insecure-tls")]
            Self::InsecureSkipVerify => true,
        }
    }

    /// Build the connector handed to the WebSocket dial.
    pub fn connector(self) -> Result<Connector, ConfigError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?;

        let config = match self {
            Self::Verified => {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                builder.with_root_certificates(roots).with_no_client_auth()
            }
            #[cfg(feature = "insecure-tls")]
            Self::InsecureSkipVerify => {
                let provider = Arc::new(rustls::crypto::ring::default_provider());
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(insecure::NoVerifier(provider)))
                    .with_no_client_auth()
            }
        };

        Ok(Connector::Rustls(Arc::new(config)))
    }
}

#[cfg(feature = "insecure-tls")]
mod insecure {
    use std::sync::Arc;

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::CryptoProvider;
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, SignatureScheme};

    /// Accepts any server certificate; signatures are still checked.
    #[derive(Debug)]
    pub(super) struct NoVerifier(pub(super) Arc<CryptoProvider>);

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
            rustls::crypto::verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }
}
