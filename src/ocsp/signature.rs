use asn1_rs::{Oid, Tag};
use ring::signature::UnparsedPublicKey;
use tracing::debug;
use x509_parser::x509::SubjectPublicKeyInfo;

use super::algorithm::AlgorithmId;
use super::errors::OcspResult;
use super::oid::{SECP256R1, SECP384R1, to_owned_oid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
}

/// A subject public key detached from its certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: Oid<'static>,
    curve: Option<Oid<'static>>,
    bits: Vec<u8>,
}

impl PublicKey {
    pub fn new(algorithm: Oid<'static>, curve: Option<Oid<'static>>, bits: Vec<u8>) -> Self {
        Self {
            algorithm,
            curve,
            bits,
        }
    }

    pub fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Self {
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .filter(|params| params.header.tag() == Tag::Oid)
            .map(|params| Oid::new(params.data.to_vec().into()));
        Self {
            algorithm: to_owned_oid(&spki.algorithm.algorithm),
            curve,
            bits: spki.subject_public_key.data.to_vec(),
        }
    }

    pub fn algorithm(&self) -> &Oid<'static> {
        &self.algorithm
    }

    /// Contents of the subjectPublicKey BIT STRING.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn curve(&self) -> Option<EcCurve> {
        match &self.curve {
            Some(curve) if *curve == SECP256R1 => Some(EcCurve::P256),
            Some(curve) if *curve == SECP384R1 => Some(EcCurve::P384),
            _ => None,
        }
    }
}

/// Verifies `signature` over exactly `signed`.
///
/// Returns `Ok(false)` for a well-formed but wrong signature and an error when
/// the algorithm cannot be mapped for this key.
pub fn verify_signature(
    signed: &[u8],
    algorithm: &AlgorithmId<'_>,
    signature: &[u8],
    key: &PublicKey,
) -> OcspResult<bool> {
    let scheme = algorithm.scheme()?;
    let verifier = scheme.verification_algorithm(key)?;
    let valid = UnparsedPublicKey::new(verifier, key.bits())
        .verify(signed, signature)
        .is_ok();
    debug!(?scheme, valid, signed_len = signed.len(), "Signature verification");
    Ok(valid)
}
