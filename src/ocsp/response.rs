//! OCSP response decoding.
//!
//! Everything borrows from the raw response buffer. The signed body of the
//! response and of every embedded responder certificate is reported as a byte
//! range into that buffer so that signatures are checked over the bytes exactly
//! as they arrived, never over a re-encoding.

use std::fmt;
use std::ops::Range;

use asn1_rs::{Oid, Tag};
use chrono::{DateTime, Utc};
use tracing::debug;
use x509_parser::certificate::X509Certificate;
use x509_parser::parse_x509_certificate;

use super::algorithm::AlgorithmId;
use super::der::{self, Tlv, read_tlv};
use super::errors::{OcspError, OcspResult};
use super::oid::ID_PKIX_OCSP_BASIC;
use crate::pki::has_ocsp_signing_eku;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Successful,
    MalformedRequest,
    InternalError,
    TryLater,
    SigRequired,
    Unauthorized,
}

impl ResponseStatus {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Successful => 0,
            Self::MalformedRequest => 1,
            Self::InternalError => 2,
            Self::TryLater => 3,
            Self::SigRequired => 5,
            Self::Unauthorized => 6,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Successful => "successful",
            Self::MalformedRequest => "malformedRequest",
            Self::InternalError => "internalError",
            Self::TryLater => "tryLater",
            Self::SigRequired => "sigRequired",
            Self::Unauthorized => "unauthorized",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked,
    Unknown,
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Good => "good",
            Self::Revoked => "revoked",
            Self::Unknown => "unknown",
        })
    }
}

/// CertID as found in a SingleResponse, as raw contents octets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCertId<'a> {
    pub hash_algorithm: Oid<'a>,
    pub issuer_name_hash: &'a [u8],
    pub issuer_key_hash: &'a [u8],
    pub serial_number: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct SingleResponse<'a> {
    pub cert_id: ResponseCertId<'a>,
    pub status: CertStatus,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderId<'a> {
    /// Full DER of the responder's Name.
    ByName(&'a [u8]),
    /// SHA-1 of the responder's public key bits.
    ByKey(&'a [u8]),
}

/// An embedded certificate that carries the OCSP-signing EKU.
#[derive(Debug, Clone)]
pub struct ResponderCertificate<'a> {
    pub cert: X509Certificate<'a>,
    /// Range of its tbsCertificate inside the raw response.
    pub tbs: Range<usize>,
}

/// The signed body of a BasicOCSPResponse, decoded.
#[derive(Debug, Clone)]
pub struct ResponseData<'a> {
    pub responder_id: ResponderId<'a>,
    pub produced_at: DateTime<Utc>,
    pub responses: Vec<SingleResponse<'a>>,
}

/// A successful OCSP response, split into what the signature check needs.
///
/// tbsResponseData is only located, not decoded, until
/// [`ParsedResponse::response_data`] is called. Callers verify the signature
/// over [`ParsedResponse::signed_bytes`] first.
#[derive(Debug, Clone)]
pub struct ParsedResponse<'a> {
    pub status: ResponseStatus,
    /// Range of the full tbsResponseData TLV inside `raw`.
    pub tbs: Range<usize>,
    pub signature_algorithm: AlgorithmId<'a>,
    pub signature: &'a [u8],
    pub certs: Vec<ResponderCertificate<'a>>,
    pub raw: &'a [u8],
}

impl<'a> ParsedResponse<'a> {
    pub fn parse(raw: &'a [u8]) -> OcspResult<Self> {
        let (outer, trailing) = read_tlv(raw)?;
        if !trailing.is_empty() {
            return Err(malformed("trailing data after OCSPResponse"));
        }
        let fields = outer.expect(Tag::Sequence, "OCSPResponse")?.children()?;

        let status_tlv = fields
            .first()
            .ok_or_else(|| malformed("empty OCSPResponse"))?
            .expect(Tag::Enumerated, "responseStatus")?;
        let code = der::small_unsigned(&status_tlv)?;
        let status = ResponseStatus::from_code(code)
            .ok_or_else(|| OcspError::Malformed(format!("unknown responseStatus {code}")))?;
        if status != ResponseStatus::Successful {
            return Err(OcspError::BadStatus(status));
        }

        let response_bytes = fields
            .get(1)
            .filter(|tlv| tlv.is_context(0))
            .ok_or_else(|| malformed("successful response without responseBytes"))?
            .explicit_inner()?
            .expect(Tag::Sequence, "ResponseBytes")?
            .children()?;
        let [response_type, response] = response_bytes.as_slice() else {
            return Err(malformed("ResponseBytes must have two fields"));
        };
        let response_type = response_type.oid()?;
        if response_type != ID_PKIX_OCSP_BASIC {
            return Err(OcspError::UnsupportedResponseType(
                response_type.to_id_string(),
            ));
        }
        let basic = response.expect(Tag::OctetString, "response")?;

        let parsed = Self::parse_basic(raw, basic.contents)?;
        debug!(
            signed = parsed.tbs.len(),
            certs = parsed.certs.len(),
            "Parsed OCSP response"
        );
        Ok(parsed)
    }

    /// The exact bytes covered by the response signature.
    pub fn signed_bytes(&self) -> &'a [u8] {
        &self.raw[self.tbs.clone()]
    }

    /// Decodes tbsResponseData. Only meaningful once the signature over
    /// [`Self::signed_bytes`] has been checked.
    pub fn response_data(&self) -> OcspResult<ResponseData<'a>> {
        let (tbs_data, _) = read_tlv(self.signed_bytes())?;
        let tbs_data = tbs_data.expect(Tag::Sequence, "tbsResponseData")?;
        let data = parse_response_data(&tbs_data)?;
        debug!(
            responses = data.responses.len(),
            produced_at = %data.produced_at,
            "Decoded OCSP response data"
        );
        Ok(data)
    }

    fn parse_basic(raw: &'a [u8], encoded: &'a [u8]) -> OcspResult<Self> {
        let (basic, _) = read_tlv(encoded)?;
        let fields = basic.expect(Tag::Sequence, "BasicOCSPResponse")?.children()?;
        if fields.len() < 3 {
            return Err(malformed("BasicOCSPResponse is missing fields"));
        }

        // Framing only; the body is signed and decoded later
        let tbs_data = &fields[0];
        let signature_algorithm = AlgorithmId::from_tlv(&fields[1])?;
        let signature = bit_string_bytes(&fields[2])?;

        let mut certs = Vec::new();
        if let Some(tagged) = fields.get(3).filter(|tlv| tlv.is_context(0)) {
            let list = tagged.explicit_inner()?.expect(Tag::Sequence, "certs")?;
            for cert_tlv in list.children()? {
                if let Some(cert) = responder_certificate(raw, &cert_tlv)? {
                    certs.push(cert);
                }
            }
        }

        Ok(Self {
            status: ResponseStatus::Successful,
            tbs: tbs_data.range_in(raw),
            signature_algorithm,
            signature,
            certs,
            raw,
        })
    }
}

fn parse_response_data<'a>(tbs_data: &Tlv<'a>) -> OcspResult<ResponseData<'a>> {
    let mut fields = tbs_data.children()?.into_iter().peekable();

    // version [0] EXPLICIT DEFAULT v1
    if fields.peek().is_some_and(|tlv| tlv.is_context(0)) {
        fields.next();
    }

    let responder = fields
        .next()
        .ok_or_else(|| malformed("ResponseData without responderID"))?;
    let responder_id = if responder.is_context(1) {
        ResponderId::ByName(responder.explicit_inner()?.raw)
    } else if responder.is_context(2) {
        ResponderId::ByKey(
            responder
                .explicit_inner()?
                .expect(Tag::OctetString, "responderID byKey")?
                .contents,
        )
    } else {
        return Err(malformed("unrecognised responderID"));
    };

    let produced_at = der::generalized_time(
        &fields
            .next()
            .ok_or_else(|| malformed("ResponseData without producedAt"))?,
    )?;

    let responses = fields
        .next()
        .ok_or_else(|| malformed("ResponseData without responses"))?
        .expect(Tag::Sequence, "responses")?
        .children()?
        .iter()
        .map(parse_single_response)
        .collect::<OcspResult<Vec<_>>>()?;

    Ok(ResponseData {
        responder_id,
        produced_at,
        responses,
    })
}

fn parse_single_response<'a>(tlv: &Tlv<'a>) -> OcspResult<SingleResponse<'a>> {
    let fields = tlv.expect(Tag::Sequence, "SingleResponse")?.children()?;
    if fields.len() < 3 {
        return Err(malformed("SingleResponse is missing fields"));
    }

    let cert_id = parse_cert_id(&fields[0])?;

    let status = &fields[1];
    let status = match (status.class, status.tag) {
        (asn1_rs::Class::ContextSpecific, Tag(0)) => CertStatus::Good,
        (asn1_rs::Class::ContextSpecific, Tag(1)) => CertStatus::Revoked,
        (asn1_rs::Class::ContextSpecific, Tag(2)) => CertStatus::Unknown,
        _ => return Err(malformed("unrecognised certStatus")),
    };

    let this_update = der::generalized_time(&fields[2])?;
    let next_update = match fields.get(3).filter(|tlv| tlv.is_context(0)) {
        Some(tagged) => Some(der::generalized_time(&tagged.explicit_inner()?)?),
        None => None,
    };

    Ok(SingleResponse {
        cert_id,
        status,
        this_update,
        next_update,
    })
}

fn parse_cert_id<'a>(tlv: &Tlv<'a>) -> OcspResult<ResponseCertId<'a>> {
    let fields = tlv.expect(Tag::Sequence, "CertID")?.children()?;
    let [hash_algorithm, name_hash, key_hash, serial] = fields.as_slice() else {
        return Err(malformed("CertID must have four fields"));
    };
    Ok(ResponseCertId {
        hash_algorithm: AlgorithmId::from_tlv(hash_algorithm)?.oid,
        issuer_name_hash: name_hash.expect(Tag::OctetString, "issuerNameHash")?.contents,
        issuer_key_hash: key_hash.expect(Tag::OctetString, "issuerKeyHash")?.contents,
        serial_number: serial.expect(Tag::Integer, "serialNumber")?.contents,
    })
}

/// Decodes an embedded certificate, keeping it only if it may sign OCSP
/// responses.
fn responder_certificate<'a>(
    raw: &'a [u8],
    tlv: &Tlv<'a>,
) -> OcspResult<Option<ResponderCertificate<'a>>> {
    let (_, cert) = parse_x509_certificate(tlv.raw)
        .map_err(|e| OcspError::Malformed(format!("embedded certificate: {e}")))?;
    if !has_ocsp_signing_eku(&cert) {
        debug!(subject = %cert.subject(), "Ignoring embedded certificate without OCSP signing");
        return Ok(None);
    }

    let tbs = tlv
        .expect(Tag::Sequence, "Certificate")?
        .children()?
        .first()
        .ok_or_else(|| malformed("empty embedded certificate"))?
        .range_in(raw);
    Ok(Some(ResponderCertificate { cert, tbs }))
}

fn bit_string_bytes<'a>(tlv: &Tlv<'a>) -> OcspResult<&'a [u8]> {
    let contents = tlv.expect(Tag::BitString, "signature")?.contents;
    match contents.split_first() {
        Some((0, bytes)) => Ok(bytes),
        _ => Err(malformed("signature BIT STRING has unused bits")),
    }
}

fn malformed(message: &str) -> OcspError {
    OcspError::Malformed(message.to_string())
}
