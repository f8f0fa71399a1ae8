use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{info, instrument};
use url::Url;

use super::errors::{OcspError, OcspResult};
use super::request::OcspRequest;
use super::verify::{DEFAULT_CLOCK_SKEW, VerifyOptions, verify};
use crate::pki::IntoCertificate;

pub const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";

/// Live revocation check against the responder named in the certificate.
#[derive(Debug, Clone)]
pub struct OcspChecker {
    client: Client,
    clock_skew: Duration,
}

impl OcspChecker {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Queries the certificate's OCSP responder and verifies the answer.
    #[instrument(skip_all)]
    pub async fn check(
        &self,
        cert: impl IntoCertificate,
        issuer: impl IntoCertificate,
    ) -> OcspResult<()> {
        let request = OcspRequest::generate(cert, issuer)?;
        let responder = request.cert.ocsp_responder_uri()?;
        Url::parse(&responder)?;

        info!("Querying OCSP responder {}", responder);
        let response = self
            .client
            .post(&responder)
            .header(CONTENT_TYPE, OCSP_REQUEST_CONTENT_TYPE)
            .body(request.data.clone())
            .send()
            .await?;
        let body = success_body(response, &responder).await?;

        let options = VerifyOptions::default().with_clock_skew(self.clock_skew);
        verify(&request, &body, &options)
    }
}

/// Body of a response whose status lies in [200, 400).
pub(crate) async fn success_body(response: Response, url: &str) -> OcspResult<Vec<u8>> {
    let status = response.status();
    if !(200..400).contains(&status.as_u16()) {
        return Err(OcspError::Transport(format!(
            "HTTP error {status} from {url}"
        )));
    }
    Ok(response.bytes().await?.to_vec())
}
