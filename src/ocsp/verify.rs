use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, instrument};

use super::errors::{OcspError, OcspResult};
use super::request::OcspRequest;
use super::responder::resolve_responder_key;
use super::response::{CertStatus, ParsedResponse, SingleResponse};
use super::signature::verify_signature;
use crate::pki::Certificate;

/// Tolerance applied on both ends of the validity window.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Overrides the issuer the request was built with.
    pub issuer: Option<Certificate>,
    pub clock_skew: Duration,
    /// Evaluation time; the current time when unset.
    pub now: Option<DateTime<Utc>>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            issuer: None,
            clock_skew: DEFAULT_CLOCK_SKEW,
            now: None,
        }
    }
}

impl VerifyOptions {
    pub fn with_issuer(mut self, issuer: Certificate) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Accepts `raw` only if it is a correctly signed, fresh `good` answer to
/// `request`.
///
/// Checks run in a fixed order and stop at the first failure.
#[instrument(skip_all, fields(id = %hex::encode(&request.id)))]
pub fn verify(request: &OcspRequest, raw: &[u8], options: &VerifyOptions) -> OcspResult<()> {
    let response = ParsedResponse::parse(raw)?;
    let issuer = options.issuer.as_ref().unwrap_or(&request.issuer);

    let key = resolve_responder_key(issuer, &response.certs, response.raw)?;
    if !verify_signature(
        response.signed_bytes(),
        &response.signature_algorithm,
        response.signature,
        &key,
    )? {
        return Err(OcspError::InvalidSignature);
    }

    let data = response.response_data()?;
    let single = data.responses.first().ok_or(OcspError::NoResponses)?;
    check_cert_id(request, single)?;

    if single.status != CertStatus::Good {
        return Err(OcspError::InvalidStatus(single.status));
    }

    let now = options.now.unwrap_or_else(Utc::now);
    check_freshness(single, now, options.clock_skew)?;

    debug!(this_update = %single.this_update, "OCSP response verified");
    Ok(())
}

fn check_cert_id(request: &OcspRequest, single: &SingleResponse<'_>) -> OcspResult<()> {
    let expected = &request.cert_id;
    let actual = &single.cert_id;

    if actual.hash_algorithm != expected.hash_algorithm {
        return Err(OcspError::AlgorithmMismatch {
            expected: expected.hash_algorithm.to_id_string(),
            actual: actual.hash_algorithm.to_id_string(),
        });
    }
    if actual.issuer_name_hash != expected.issuer_name_hash.as_slice() {
        return Err(OcspError::IssuerNameMismatch);
    }
    if actual.issuer_key_hash != expected.issuer_key_hash.as_slice() {
        return Err(OcspError::IssuerKeyMismatch);
    }
    if actual.serial_number != expected.serial_number.as_slice() {
        return Err(OcspError::SerialNumberMismatch);
    }
    Ok(())
}

// thisUpdate - skew <= now <= nextUpdate + skew, no upper bound without nextUpdate
fn check_freshness(
    single: &SingleResponse<'_>,
    now: DateTime<Utc>,
    clock_skew: Duration,
) -> OcspResult<()> {
    let skew = TimeDelta::from_std(clock_skew)
        .map_err(|_| OcspError::Malformed("clock skew out of range".to_string()))?;

    let expired = || OcspError::ResponseExpired {
        this_update: single.this_update,
        next_update: single.next_update,
        now,
    };

    let not_before = single.this_update.checked_sub_signed(skew);
    if not_before.is_some_and(|not_before| now < not_before) {
        return Err(expired());
    }
    if let Some(next_update) = single.next_update {
        let not_after = next_update.checked_add_signed(skew);
        if not_after.is_some_and(|not_after| now > not_after) {
            return Err(expired());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocsp::builder::BasicResponseBuilder;
    use crate::ocsp::der;
    use crate::ocsp::oid::{ID_SHA1, SHA256_WITH_RSA};
    use crate::ocsp::response::ResponseCertId;
    use crate::tls::{AccessLocations, generate_ca_certificate, generate_leaf_certificate};
    use openssl::hash::MessageDigest;
    use openssl::sign::Signer;

    fn single(
        this_update: DateTime<Utc>,
        next_update: Option<DateTime<Utc>>,
    ) -> SingleResponse<'static> {
        SingleResponse {
            cert_id: ResponseCertId {
                hash_algorithm: ID_SHA1,
                issuer_name_hash: &[],
                issuer_key_hash: &[],
                serial_number: &[1],
            },
            status: CertStatus::Good,
            this_update,
            next_update,
        }
    }

    #[test]
    fn freshness_window_is_inclusive() {
        let this_update = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let next_update = this_update + TimeDelta::hours(1);
        let response = single(this_update, Some(next_update));
        let skew = DEFAULT_CLOCK_SKEW;

        let lower = this_update - TimeDelta::seconds(60);
        let upper = next_update + TimeDelta::seconds(60);
        assert!(check_freshness(&response, lower, skew).is_ok());
        assert!(check_freshness(&response, upper, skew).is_ok());

        let too_early = lower - TimeDelta::milliseconds(1);
        let too_late = upper + TimeDelta::milliseconds(1);
        assert!(matches!(
            check_freshness(&response, too_early, skew),
            Err(OcspError::ResponseExpired { .. })
        ));
        assert!(matches!(
            check_freshness(&response, too_late, skew),
            Err(OcspError::ResponseExpired { .. })
        ));
    }

    #[test]
    fn missing_next_update_has_no_upper_bound() {
        let this_update = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let response = single(this_update, None);
        let far_future = this_update + TimeDelta::days(3650);
        assert!(check_freshness(&response, far_future, Duration::ZERO).is_ok());
        let before = this_update - TimeDelta::seconds(1);
        assert!(check_freshness(&response, before, Duration::ZERO).is_err());
    }

    #[test]
    fn signed_response_without_entries_is_rejected() {
        let (ca_cert, ca_key) = generate_ca_certificate().unwrap();
        let (leaf, _) =
            generate_leaf_certificate(&ca_cert, &ca_key, &AccessLocations::default()).unwrap();
        let issuer = Certificate::from_der(ca_cert.to_der().unwrap()).unwrap();
        let request = OcspRequest::generate(leaf.to_pem().unwrap().as_slice(), issuer).unwrap();

        let tbs = der::sequence(&[
            &der::explicit(2, &der::octet_string(&request.cert_id.issuer_key_hash)),
            &der::generalized_time_value(&Utc::now()),
            &der::sequence(&[]),
        ]);
        let mut signer = Signer::new(MessageDigest::sha256(), &ca_key).unwrap();
        signer.update(&tbs).unwrap();
        let signature = signer.sign_to_vec().unwrap();
        let algorithm = der::sequence(&[&der::oid(&SHA256_WITH_RSA), &der::null()]);

        let raw = BasicResponseBuilder::new(request.cert_id.clone())
            .assemble(&tbs, &algorithm, &signature);
        let err = verify(&request, &raw, &VerifyOptions::default()).unwrap_err();
        assert!(matches!(err, OcspError::NoResponses));
    }
}
