//! Signature algorithm table.
//!
//! Maps an AlgorithmIdentifier to a digest + signature scheme, and a scheme
//! plus responder key to the concrete `ring` verification algorithm.

use asn1_rs::{Oid, Tag};
use ring::signature::{self, VerificationAlgorithm};
use x509_parser::x509::AlgorithmIdentifier;

use super::der::{Tlv, read_all};
use super::errors::{OcspError, OcspResult};
use super::oid::*;
use super::signature::{EcCurve, PublicKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn from_oid(oid: &Oid<'_>) -> Option<Self> {
        [
            (ID_SHA1, Self::Sha1),
            (ID_SHA256, Self::Sha256),
            (ID_SHA384, Self::Sha384),
            (ID_SHA512, Self::Sha512),
        ]
        .into_iter()
        .find_map(|(id, digest)| (id == *oid).then_some(digest))
    }

    pub fn oid(self) -> Oid<'static> {
        match self {
            Self::Sha1 => ID_SHA1,
            Self::Sha256 => ID_SHA256,
            Self::Sha384 => ID_SHA384,
            Self::Sha512 => ID_SHA512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    RsaPkcs1(DigestAlgorithm),
    RsaPss(DigestAlgorithm),
    Ecdsa(DigestAlgorithm),
    Ed25519,
}

const SIGNATURE_ALGORITHMS: &[(Oid<'static>, SignatureScheme)] = &[
    (SHA1_WITH_RSA, SignatureScheme::RsaPkcs1(DigestAlgorithm::Sha1)),
    (SHA256_WITH_RSA, SignatureScheme::RsaPkcs1(DigestAlgorithm::Sha256)),
    (SHA384_WITH_RSA, SignatureScheme::RsaPkcs1(DigestAlgorithm::Sha384)),
    (SHA512_WITH_RSA, SignatureScheme::RsaPkcs1(DigestAlgorithm::Sha512)),
    (ECDSA_WITH_SHA256, SignatureScheme::Ecdsa(DigestAlgorithm::Sha256)),
    (ECDSA_WITH_SHA384, SignatureScheme::Ecdsa(DigestAlgorithm::Sha384)),
    (ED25519, SignatureScheme::Ed25519),
];

/// An AlgorithmIdentifier borrowed from the structure it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmId<'a> {
    pub oid: Oid<'a>,
    /// Contents octets of the parameters, if present.
    pub parameters: Option<&'a [u8]>,
}

impl<'a> AlgorithmId<'a> {
    pub fn new(oid: Oid<'a>) -> Self {
        Self {
            oid,
            parameters: None,
        }
    }

    pub(crate) fn from_tlv(tlv: &Tlv<'a>) -> OcspResult<Self> {
        let fields = tlv.expect(Tag::Sequence, "AlgorithmIdentifier")?.children()?;
        let oid = fields
            .first()
            .ok_or_else(|| OcspError::Malformed("empty AlgorithmIdentifier".to_string()))?
            .oid()?;
        Ok(Self {
            oid,
            parameters: fields.get(1).map(|params| params.contents),
        })
    }

    pub fn from_x509(algorithm: &AlgorithmIdentifier<'a>) -> Self {
        Self {
            oid: algorithm.algorithm.clone(),
            parameters: algorithm.parameters.as_ref().map(|params| params.data),
        }
    }

    /// Resolves the identifier to a signature scheme.
    pub fn scheme(&self) -> OcspResult<SignatureScheme> {
        if self.oid == RSASSA_PSS {
            return self.pss_scheme();
        }
        SIGNATURE_ALGORITHMS
            .iter()
            .find(|(id, _)| *id == self.oid)
            .map(|(_, scheme)| *scheme)
            .ok_or_else(|| OcspError::UnknownAlgorithm(self.oid.to_id_string()))
    }

    // RSASSA-PSS-params: hashAlgorithm [0] defaults to SHA-1
    fn pss_scheme(&self) -> OcspResult<SignatureScheme> {
        let mut digest = DigestAlgorithm::Sha1;
        if let Some(params) = self.parameters {
            for field in read_all(params)? {
                if field.is_context(0) {
                    let hash = AlgorithmId::from_tlv(&field.explicit_inner()?)?;
                    digest = DigestAlgorithm::from_oid(&hash.oid).ok_or_else(|| {
                        OcspError::UnknownAlgorithm(format!(
                            "RSASSA-PSS with {}",
                            hash.oid.to_id_string()
                        ))
                    })?;
                }
            }
        }
        Ok(SignatureScheme::RsaPss(digest))
    }
}

impl SignatureScheme {
    /// The `ring` algorithm verifying this scheme under `key`.
    pub fn verification_algorithm(
        self,
        key: &PublicKey,
    ) -> OcspResult<&'static dyn VerificationAlgorithm> {
        use DigestAlgorithm::*;

        let algorithm: &'static dyn VerificationAlgorithm = match (self, key.curve()) {
            (Self::RsaPkcs1(Sha1), _) => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
            (Self::RsaPkcs1(Sha256), _) => &signature::RSA_PKCS1_2048_8192_SHA256,
            (Self::RsaPkcs1(Sha384), _) => &signature::RSA_PKCS1_2048_8192_SHA384,
            (Self::RsaPkcs1(Sha512), _) => &signature::RSA_PKCS1_2048_8192_SHA512,
            (Self::RsaPss(Sha256), _) => &signature::RSA_PSS_2048_8192_SHA256,
            (Self::RsaPss(Sha384), _) => &signature::RSA_PSS_2048_8192_SHA384,
            (Self::RsaPss(Sha512), _) => &signature::RSA_PSS_2048_8192_SHA512,
            (Self::Ecdsa(Sha256), Some(EcCurve::P256)) => &signature::ECDSA_P256_SHA256_ASN1,
            (Self::Ecdsa(Sha256), Some(EcCurve::P384)) => &signature::ECDSA_P384_SHA256_ASN1,
            (Self::Ecdsa(Sha384), Some(EcCurve::P256)) => &signature::ECDSA_P256_SHA384_ASN1,
            (Self::Ecdsa(Sha384), Some(EcCurve::P384)) => &signature::ECDSA_P384_SHA384_ASN1,
            (Self::Ed25519, _) => &signature::ED25519,
            (scheme, curve) => {
                return Err(OcspError::UnknownAlgorithm(format!(
                    "{scheme:?} with key curve {curve:?}"
                )));
            }
        };
        Ok(algorithm)
    }
}
