//! Building signed OCSP responses.
//!
//! Used by servers that staple their own status and by local responders.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKeyRef, Private};
use openssl::sign::Signer;

use super::algorithm::DigestAlgorithm;
use super::der;
use super::errors::SignError;
use super::oid::*;
use super::request::CertId;
use super::response::{CertStatus, ResponseStatus};

/// Builder for a successful BasicOCSPResponse about one certificate.
#[derive(Debug, Clone)]
pub struct BasicResponseBuilder {
    cert_id: CertId,
    status: CertStatus,
    produced_at: DateTime<Utc>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    responder_key_hash: Vec<u8>,
    nonce: Option<Vec<u8>>,
    certs: Vec<Vec<u8>>,
}

impl BasicResponseBuilder {
    /// A `good` response valid from now for one day, identified by the
    /// issuer's key hash.
    pub fn new(cert_id: CertId) -> Self {
        let now = Utc::now().trunc_subsecs(0);
        Self {
            responder_key_hash: cert_id.issuer_key_hash.clone(),
            cert_id,
            status: CertStatus::Good,
            produced_at: now,
            this_update: now,
            next_update: Some(now + Duration::days(1)),
            nonce: None,
            certs: Vec::new(),
        }
    }

    pub fn status(mut self, status: CertStatus) -> Self {
        self.status = status;
        self
    }

    pub fn produced_at(mut self, produced_at: DateTime<Utc>) -> Self {
        self.produced_at = produced_at;
        self
    }

    pub fn this_update(mut self, this_update: DateTime<Utc>) -> Self {
        self.this_update = this_update;
        self
    }

    pub fn next_update(mut self, next_update: Option<DateTime<Utc>>) -> Self {
        self.next_update = next_update;
        self
    }

    /// SHA-1 of the signer's public key bits, for `responderID byKey`.
    pub fn responder_key_hash(mut self, hash: Vec<u8>) -> Self {
        self.responder_key_hash = hash;
        self
    }

    /// Echo a request nonce in the response extensions.
    pub fn nonce(mut self, nonce: &[u8]) -> Self {
        self.nonce = Some(nonce.to_vec());
        self
    }

    /// Embed a DER certificate in the response.
    pub fn certificate(mut self, der: Vec<u8>) -> Self {
        self.certs.push(der);
        self
    }

    /// DER of tbsResponseData, the bytes covered by the signature.
    pub fn response_data(&self) -> Vec<u8> {
        let cert_id = self.cert_id.to_der();
        let cert_status = match self.status {
            CertStatus::Good => der::implicit_primitive(0, &[]),
            // [1] IMPLICIT RevokedInfo { revocationTime }
            CertStatus::Revoked => {
                der::explicit(1, &der::generalized_time_value(&self.this_update))
            }
            CertStatus::Unknown => der::implicit_primitive(2, &[]),
        };
        let this_update = der::generalized_time_value(&self.this_update);
        let next_update = self
            .next_update
            .map(|time| der::explicit(0, &der::generalized_time_value(&time)))
            .unwrap_or_default();
        let single = der::sequence(&[&cert_id, &cert_status, &this_update, &next_update]);

        let responder_id = der::explicit(2, &der::octet_string(&self.responder_key_hash));
        let produced_at = der::generalized_time_value(&self.produced_at);
        let responses = der::sequence(&[&single]);
        let extensions = self
            .nonce
            .as_ref()
            .map(|nonce| {
                let nonce_ext = der::sequence(&[
                    &der::oid(&ID_PKIX_OCSP_NONCE),
                    &der::octet_string(&der::octet_string(nonce)),
                ]);
                der::explicit(1, &der::sequence(&[&nonce_ext]))
            })
            .unwrap_or_default();

        der::sequence(&[&responder_id, &produced_at, &responses, &extensions])
    }

    /// Signs the response data with `key` and returns the full OCSPResponse.
    pub fn sign(
        &self,
        key: &PKeyRef<Private>,
        digest: DigestAlgorithm,
    ) -> Result<Vec<u8>, SignError> {
        let tbs = self.response_data();
        let algorithm = signature_algorithm(key, digest)?;

        let mut signer = Signer::new(message_digest(digest), key)?;
        signer.update(&tbs)?;
        let signature = signer.sign_to_vec()?;

        Ok(self.assemble(&tbs, &algorithm, &signature))
    }

    /// Wraps already signed response data into an OCSPResponse.
    pub fn assemble(&self, tbs: &[u8], algorithm: &[u8], signature: &[u8]) -> Vec<u8> {
        let certs = if self.certs.is_empty() {
            Vec::new()
        } else {
            let certs: Vec<&[u8]> = self.certs.iter().map(Vec::as_slice).collect();
            der::explicit(0, &der::sequence(&certs))
        };
        let basic = der::sequence(&[tbs, algorithm, &der::bit_string(signature), &certs]);

        let response_bytes = der::sequence(&[
            &der::oid(&ID_PKIX_OCSP_BASIC),
            &der::octet_string(&basic),
        ]);
        der::sequence(&[
            &der::enumerated(ResponseStatus::Successful.code()),
            &der::explicit(0, &response_bytes),
        ])
    }
}

/// An OCSPResponse carrying only a non-successful status.
pub fn error_response(status: ResponseStatus) -> Vec<u8> {
    der::sequence(&[&der::enumerated(status.code())])
}

fn signature_algorithm(
    key: &PKeyRef<Private>,
    digest: DigestAlgorithm,
) -> Result<Vec<u8>, SignError> {
    let id = key.id();
    let oid = if id == Id::RSA {
        match digest {
            DigestAlgorithm::Sha1 => SHA1_WITH_RSA,
            DigestAlgorithm::Sha256 => SHA256_WITH_RSA,
            DigestAlgorithm::Sha384 => SHA384_WITH_RSA,
            DigestAlgorithm::Sha512 => SHA512_WITH_RSA,
        }
    } else if id == Id::EC {
        match digest {
            DigestAlgorithm::Sha256 => ECDSA_WITH_SHA256,
            DigestAlgorithm::Sha384 => ECDSA_WITH_SHA384,
            _ => return Err(SignError::UnsupportedDigest { digest, key: "EC" }),
        }
    } else {
        return Err(SignError::UnsupportedKey(id.as_raw()));
    };

    // RSA identifiers carry explicit NULL parameters, ECDSA ones none
    if id == Id::RSA {
        Ok(der::sequence(&[&der::oid(&oid), &der::null()]))
    } else {
        Ok(der::sequence(&[&der::oid(&oid)]))
    }
}

fn message_digest(digest: DigestAlgorithm) -> MessageDigest {
    match digest {
        DigestAlgorithm::Sha1 => MessageDigest::sha1(),
        DigestAlgorithm::Sha256 => MessageDigest::sha256(),
        DigestAlgorithm::Sha384 => MessageDigest::sha384(),
        DigestAlgorithm::Sha512 => MessageDigest::sha512(),
    }
}
