use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::ocsp::{
    DEFAULT_CLOCK_SKEW, OcspChecker, OcspError, OcspRequest, OcspResult, VerifyOptions, verify,
};
use crate::pki::{Certificate, IssuerFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Handshake done, connection withheld from the caller.
    Pending,
    Verified,
    Failed,
}

/// Revocation gate for a single connection.
///
/// `on_staple_received` is called first when the server stapled a response,
/// then `on_handshake_complete` decides whether the connection may be used.
#[derive(Debug)]
pub struct HandshakeInterceptor {
    checker: OcspChecker,
    fetcher: IssuerFetcher,
    clock_skew: Duration,
    staple: Option<Vec<u8>>,
    state: GateState,
}

impl HandshakeInterceptor {
    pub fn new(checker: OcspChecker, fetcher: IssuerFetcher) -> Self {
        Self {
            checker,
            fetcher,
            clock_skew: DEFAULT_CLOCK_SKEW,
            staple: None,
            state: GateState::Pending,
        }
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn on_staple_received(&mut self, staple: &[u8]) {
        debug!(len = staple.len(), "Received stapled OCSP response");
        self.staple = Some(staple.to_vec());
    }

    /// Verifies the staple if one arrived, otherwise asks the responder.
    ///
    /// The issuer is taken from the handshake chain when present and fetched
    /// through the AIA extension otherwise.
    #[instrument(skip_all)]
    pub async fn on_handshake_complete(
        &mut self,
        peer: Certificate,
        chain_issuer: Option<Certificate>,
    ) -> OcspResult<()> {
        if self.state != GateState::Pending {
            return Err(OcspError::AlreadyResolved);
        }

        let result = self.resolve(peer, chain_issuer).await;
        self.state = match &result {
            Ok(()) => GateState::Verified,
            Err(e) => {
                warn!("Peer certificate rejected: {}", e);
                GateState::Failed
            }
        };
        result
    }

    async fn resolve(
        &self,
        peer: Certificate,
        chain_issuer: Option<Certificate>,
    ) -> OcspResult<()> {
        let issuer = match chain_issuer {
            Some(issuer) => issuer,
            None => self.fetcher.fetch(&peer).await?,
        };

        match &self.staple {
            Some(staple) => {
                debug!("Verifying stapled OCSP response");
                let request = OcspRequest::generate(peer, issuer)?;
                let options = VerifyOptions::default().with_clock_skew(self.clock_skew);
                verify(&request, staple, &options)
            }
            None => {
                debug!("No staple, falling back to live OCSP check");
                self.checker
                    .clone()
                    .with_clock_skew(self.clock_skew)
                    .check(peer, issuer)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocsp::{BasicResponseBuilder, CertStatus, DigestAlgorithm};
    use crate::tls::{AccessLocations, generate_ca_certificate, generate_leaf_certificate};
    use reqwest::Client;

    struct Fixture {
        leaf: Certificate,
        issuer: Certificate,
        staple_good: Vec<u8>,
        staple_revoked: Vec<u8>,
    }

    fn fixture() -> Fixture {
        let (ca_cert, ca_key) = generate_ca_certificate().unwrap();
        let (leaf, _) =
            generate_leaf_certificate(&ca_cert, &ca_key, &AccessLocations::default()).unwrap();
        let leaf = Certificate::from_der(leaf.to_der().unwrap()).unwrap();
        let issuer = Certificate::from_der(ca_cert.to_der().unwrap()).unwrap();

        let cert_id = OcspRequest::generate(&leaf, &issuer).unwrap().cert_id;
        let staple_good = BasicResponseBuilder::new(cert_id.clone())
            .sign(&ca_key, DigestAlgorithm::Sha256)
            .unwrap();
        let staple_revoked = BasicResponseBuilder::new(cert_id)
            .status(CertStatus::Revoked)
            .sign(&ca_key, DigestAlgorithm::Sha256)
            .unwrap();

        Fixture {
            leaf,
            issuer,
            staple_good,
            staple_revoked,
        }
    }

    fn interceptor() -> HandshakeInterceptor {
        let client = Client::new();
        HandshakeInterceptor::new(OcspChecker::new(client.clone()), IssuerFetcher::new(client))
    }

    #[tokio::test]
    async fn good_staple_releases_the_connection() {
        let fixture = fixture();
        let mut gate = interceptor();
        assert_eq!(gate.state(), GateState::Pending);

        gate.on_staple_received(&fixture.staple_good);
        gate.on_handshake_complete(fixture.leaf, Some(fixture.issuer))
            .await
            .unwrap();
        assert_eq!(gate.state(), GateState::Verified);
    }

    #[tokio::test]
    async fn revoked_staple_fails_the_connection() {
        let fixture = fixture();
        let mut gate = interceptor();

        gate.on_staple_received(&fixture.staple_revoked);
        let err = gate
            .on_handshake_complete(fixture.leaf, Some(fixture.issuer))
            .await
            .unwrap_err();
        assert!(matches!(err, OcspError::InvalidStatus(CertStatus::Revoked)));
        assert_eq!(gate.state(), GateState::Failed);
    }

    #[tokio::test]
    async fn without_staple_or_issuer_the_aia_lookup_fails() {
        let fixture = fixture();
        let mut gate = interceptor();

        let err = gate
            .on_handshake_complete(fixture.leaf, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OcspError::ExtensionMissing(_)));
        assert_eq!(gate.state(), GateState::Failed);

        let err = gate
            .on_handshake_complete(fixture.issuer.clone(), Some(fixture.issuer))
            .await
            .unwrap_err();
        assert!(matches!(err, OcspError::AlreadyResolved));
        assert_eq!(gate.state(), GateState::Failed);
    }

    #[tokio::test]
    async fn resolves_only_once() {
        let fixture = fixture();
        let mut gate = interceptor();
        gate.on_staple_received(&fixture.staple_good);
        gate.on_handshake_complete(fixture.leaf.clone(), Some(fixture.issuer.clone()))
            .await
            .unwrap();

        let err = gate
            .on_handshake_complete(fixture.leaf, Some(fixture.issuer))
            .await
            .unwrap_err();
        assert!(matches!(err, OcspError::AlreadyResolved));
        assert_eq!(gate.state(), GateState::Verified);
    }
}
