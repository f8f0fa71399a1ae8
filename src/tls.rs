mod cert_utils;
mod connector;
mod errors;
mod interceptor;

pub use cert_utils::*;
pub use connector::{OcspConnector, to_certificate};
pub use errors::TlsError;
pub use interceptor::{GateState, HandshakeInterceptor};

use std::sync::Arc;

use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslConnector, SslMethod};
use openssl::x509::X509;
use tracing::{debug, instrument, trace};

#[derive(Copy, Clone, PartialEq, Eq)]
enum Format {
    Pem,
    Der,
}

struct Inner {
    format: Format,
    cert_chain: Vec<u8>,
    private_key: Vec<u8>,
    ocsp_staple: Option<Arc<Vec<u8>>>,
}

/// Configuration for a TLS server that staples OCSP responses.
pub struct TlsConfig {
    inner: Inner,
}

impl TlsConfig {
    /// Creates a new TLS configuration from PEM encoded data
    ///
    /// # Arguments
    ///
    /// * `cert_chain` - Server certificate chain in PEM format.
    /// * `key` - Server private key in PEM format.
    pub fn from_pem(cert_chain: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Inner {
                format: Format::Pem,
                cert_chain: cert_chain.into(),
                private_key: key.into(),
                ocsp_staple: None,
            },
        }
    }

    /// Creates a new TLS configuration from DER encoded data
    ///
    /// # Arguments
    ///
    /// * `cert_der` - Server certificate in DER format.
    /// * `key_der` - Server private key in DER format.
    pub fn from_der(cert_der: impl Into<Vec<u8>>, key_der: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Inner {
                format: Format::Der,
                cert_chain: cert_der.into(),
                private_key: key_der.into(),
                ocsp_staple: None,
            },
        }
    }

    /// Staple the given OCSP response to every handshake whose client asks
    /// for certificate status.
    pub fn with_ocsp_staple(mut self, response: Vec<u8>) -> Self {
        debug!("Adding OCSP stapling to TLS configuration");
        self.inner.ocsp_staple = Some(Arc::new(response));
        self
    }

    /// Build the TLS acceptor from the configuration.
    #[instrument(skip(self))]
    pub fn build_acceptor(&self) -> Result<SslAcceptor, TlsError> {
        let mut builder = self.create_base_acceptor_builder()?;

        if let Some(staple) = &self.inner.ocsp_staple {
            let staple = staple.clone();
            builder.set_status_callback(move |ssl| {
                trace!(len = staple.len(), "Stapling OCSP response");
                ssl.set_ocsp_status(&staple)?;
                Ok(true)
            })?;
        }

        Ok(builder.build())
    }

    #[instrument(skip(self))]
    fn create_base_acceptor_builder(&self) -> Result<SslAcceptorBuilder, TlsError> {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server())?;

        let key: PKey<Private>;
        if self.inner.format == Format::Pem {
            trace!("Loading server certificate chain from PEM...");
            let certs = X509::stack_from_pem(&self.inner.cert_chain)?;
            for (i, cert) in certs.iter().enumerate() {
                if i == 0 {
                    builder.set_certificate(cert)?;
                } else {
                    builder.add_extra_chain_cert(cert.clone())?;
                }
            }
            trace!("Loading server private key from PEM...");
            key = PKey::private_key_from_pem(&self.inner.private_key)?;
        } else {
            trace!("Loading server certificate from DER...");
            let cert = X509::from_der(&self.inner.cert_chain)?;
            builder.set_certificate(&cert)?;
            trace!("Loading server private key from DER...");
            key = PKey::private_key_from_der(&self.inner.private_key)?;
        }
        builder.set_private_key(&key)?;
        debug!("Set server certificate and private key");

        Ok(builder)
    }
}

/// Client connector trusting the system roots plus `extra_roots_pem`.
pub fn client_connector(extra_roots_pem: &[Vec<u8>]) -> Result<SslConnector, TlsError> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;
    for root in extra_roots_pem {
        builder.cert_store_mut().add_cert(X509::from_pem(root)?)?;
    }
    Ok(builder.build())
}
