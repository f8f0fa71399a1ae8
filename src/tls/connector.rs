use std::pin::Pin;
use std::time::Duration;

use openssl::ssl::{SslConnector, SslRef, StatusType};
use openssl::x509::{X509Ref, X509VerifyResult};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_openssl::SslStream;
use tracing::{debug, info, instrument};

use super::errors::TlsError;
use super::interceptor::HandshakeInterceptor;
use crate::ocsp::{DEFAULT_CLOCK_SKEW, OcspChecker, OcspError, OcspResult};
use crate::pki::{Certificate, IssuerFetcher};

/// Client connector that withholds every connection until the peer
/// certificate passes an OCSP check.
///
/// Wraps an [`SslConnector`]: chain validation and hostname checks stay with
/// OpenSSL, revocation is decided after the handshake from the stapled
/// response or a live query.
#[derive(Clone)]
pub struct OcspConnector {
    connector: SslConnector,
    checker: OcspChecker,
    fetcher: IssuerFetcher,
    clock_skew: Duration,
}

impl OcspConnector {
    pub fn new(connector: SslConnector, checker: OcspChecker, fetcher: IssuerFetcher) -> Self {
        Self {
            connector,
            checker,
            fetcher,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    pub fn issuer_fetcher(&self) -> &IssuerFetcher {
        &self.fetcher
    }

    /// Performs the handshake over `stream` and returns it once the peer
    /// certificate is known not to be revoked.
    ///
    /// On rejection the TLS session is shut down and the stream dropped.
    #[instrument(skip(self, stream))]
    pub async fn connect<S>(&self, domain: &str, stream: S) -> Result<SslStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut ssl = self.connector.configure()?.into_ssl(domain)?;
        ssl.set_status_type(StatusType::OCSP)?;

        let mut stream = SslStream::new(ssl, stream)?;
        Pin::new(&mut stream).connect().await?;
        debug!("TLS handshake complete, checking revocation");

        let mut interceptor = HandshakeInterceptor::new(self.checker.clone(), self.fetcher.clone())
            .with_clock_skew(self.clock_skew);
        if let Some(staple) = stream.ssl().ocsp_status() {
            interceptor.on_staple_received(staple);
        }

        let (peer, chain_issuer) = peer_certificates(stream.ssl())?;
        match interceptor.on_handshake_complete(peer, chain_issuer).await {
            Ok(()) => {
                info!("Peer certificate passed OCSP check");
                Ok(stream)
            }
            Err(e) => {
                if let Err(shutdown) = stream.shutdown().await {
                    debug!("TLS shutdown after rejection failed: {}", shutdown);
                }
                Err(e.into())
            }
        }
    }
}

/// Peer certificate and, if the server sent it, its issuer.
fn peer_certificates(ssl: &SslRef) -> Result<(Certificate, Option<Certificate>), TlsError> {
    let peer = ssl.peer_certificate().ok_or(TlsError::NoPeerCertificate)?;

    let issuer = ssl
        .peer_cert_chain()
        .and_then(|chain| {
            chain
                .iter()
                .find(|candidate| candidate.issued(&peer) == X509VerifyResult::OK)
        })
        .map(to_certificate)
        .transpose()?;

    Ok((to_certificate(&peer)?, issuer))
}

pub fn to_certificate(cert: &X509Ref) -> OcspResult<Certificate> {
    let der = cert
        .to_der()
        .map_err(|e| OcspError::Malformed(e.to_string()))?;
    Certificate::from_der(der)
}
