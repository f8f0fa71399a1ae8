use tracing::debug;

use super::algorithm::AlgorithmId;
use super::errors::{OcspError, OcspResult};
use super::response::ResponderCertificate;
use super::signature::{PublicKey, verify_signature};
use crate::pki::Certificate;

/// Decides which key must have signed the response.
///
/// A delegated responder certificate is trusted only if the issuer signed it.
/// Only the first embedded OCSP-signing certificate is considered; any others
/// are ignored.
pub fn resolve_responder_key(
    issuer: &Certificate,
    embedded: &[ResponderCertificate<'_>],
    raw: &[u8],
) -> OcspResult<PublicKey> {
    let issuer_key = issuer.public_key()?;

    let Some(responder) = embedded.first() else {
        debug!("No delegated responder, expecting issuer signature");
        return Ok(issuer_key);
    };

    let tbs = raw
        .get(responder.tbs.clone())
        .ok_or_else(|| OcspError::Malformed("responder certificate out of bounds".to_string()))?;
    let algorithm = AlgorithmId::from_x509(&responder.cert.signature_algorithm);
    let signature = &responder.cert.signature_value.data;

    if !verify_signature(tbs, &algorithm, signature, &issuer_key)? {
        return Err(OcspError::InvalidSignature);
    }
    debug!(subject = %responder.cert.subject(), "Using delegated OCSP responder");
    Ok(PublicKey::from_spki(responder.cert.public_key()))
}
