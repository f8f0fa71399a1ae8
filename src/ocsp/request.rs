use asn1_rs::Oid;
use ring::digest::{SHA1_FOR_LEGACY_USE_ONLY, digest};
use tracing::debug;

use super::der;
use super::errors::OcspResult;
use super::oid::{ID_PKIX_OCSP_NONCE, ID_SHA1};
use crate::pki::{Certificate, IntoCertificate};

/// Length of the random nonce placed in every request.
pub const NONCE_LEN: usize = 16;

/// Identifies a certificate in an OCSP query.
///
/// All fields hold DER contents octets so that comparisons are byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertId {
    pub hash_algorithm: Oid<'static>,
    pub issuer_name_hash: Vec<u8>,
    pub issuer_key_hash: Vec<u8>,
    pub serial_number: Vec<u8>,
}

impl CertId {
    /// CertID of `cert` under SHA-1.
    ///
    /// The name hash covers the certificate's encoded issuer Name, the key
    /// hash covers the issuer's subjectPublicKey bits.
    pub fn new(cert: &Certificate, issuer: &Certificate) -> OcspResult<Self> {
        let cert = cert.parsed()?;
        let issuer = issuer.parsed()?;

        let issuer_name_hash = sha1(cert.issuer().as_raw());
        let issuer_key_hash = sha1(&issuer.public_key().subject_public_key.data);

        Ok(Self {
            hash_algorithm: ID_SHA1,
            issuer_name_hash,
            issuer_key_hash,
            serial_number: cert.tbs_certificate.raw_serial().to_vec(),
        })
    }

    pub fn to_der(&self) -> Vec<u8> {
        let hash_algorithm = der::sequence(&[&der::oid(&self.hash_algorithm), &der::null()]);
        der::sequence(&[
            &hash_algorithm,
            &der::octet_string(&self.issuer_name_hash),
            &der::octet_string(&self.issuer_key_hash),
            &der::integer_raw(&self.serial_number),
        ])
    }
}

/// A ready-to-send OCSP request and the inputs it was built from.
#[derive(Debug, Clone)]
pub struct OcspRequest {
    /// SHA-1 of the CertID alone; stable across requests for the same pair.
    pub id: Vec<u8>,
    /// DER-encoded OCSPRequest.
    pub data: Vec<u8>,
    pub cert_id: CertId,
    pub nonce: [u8; NONCE_LEN],
    pub cert: Certificate,
    pub issuer: Certificate,
}

impl OcspRequest {
    /// Builds a request for `cert` issued by `issuer`.
    ///
    /// Both accept PEM text, DER bytes or an already decoded [`Certificate`].
    pub fn generate(cert: impl IntoCertificate, issuer: impl IntoCertificate) -> OcspResult<Self> {
        let cert = cert.into_certificate()?;
        let issuer = issuer.into_certificate()?;

        let cert_id = CertId::new(&cert, &issuer)?;
        let cert_id_der = cert_id.to_der();
        let nonce: [u8; NONCE_LEN] = rand::random();

        let data = encode_request(&cert_id_der, &nonce);
        let id = sha1(&cert_id_der);
        debug!(
            id = %hex::encode(&id),
            serial = %hex::encode(&cert_id.serial_number),
            "Generated OCSP request"
        );

        Ok(Self {
            id,
            data,
            cert_id,
            nonce,
            cert,
            issuer,
        })
    }
}

// OCSPRequest { tbsRequest { requestList { Request { reqCert } }, [2] requestExtensions } }
fn encode_request(cert_id: &[u8], nonce: &[u8]) -> Vec<u8> {
    let request = der::sequence(&[cert_id]);
    let request_list = der::sequence(&[&request]);

    let nonce_ext = der::sequence(&[
        &der::oid(&ID_PKIX_OCSP_NONCE),
        &der::octet_string(&der::octet_string(nonce)),
    ]);
    let extensions = der::explicit(2, &der::sequence(&[&nonce_ext]));

    let tbs_request = der::sequence(&[&request_list, &extensions]);
    der::sequence(&[&tbs_request])
}

pub(crate) fn sha1(data: &[u8]) -> Vec<u8> {
    digest(&SHA1_FOR_LEGACY_USE_ONLY, data).as_ref().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocsp::der::read_tlv;
    use crate::ocsp::errors::OcspError;
    use crate::tls::{AccessLocations, generate_ca_certificate, generate_leaf_certificate};

    fn pair() -> (Vec<u8>, Vec<u8>) {
        let (ca_cert, ca_key) = generate_ca_certificate().unwrap();
        let (leaf, _) =
            generate_leaf_certificate(&ca_cert, &ca_key, &AccessLocations::default()).unwrap();
        (leaf.to_pem().unwrap(), ca_cert.to_der().unwrap())
    }

    #[test]
    fn repeated_requests_share_id_but_not_nonce() {
        let (leaf_pem, ca_der) = pair();

        let first = OcspRequest::generate(leaf_pem.as_slice(), ca_der.as_slice()).unwrap();
        let second = OcspRequest::generate(leaf_pem.as_slice(), ca_der.as_slice()).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.cert_id, second.cert_id);
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn cert_id_hashes_issuer_name_and_key() {
        let (leaf_pem, ca_der) = pair();
        let request = OcspRequest::generate(leaf_pem.as_slice(), ca_der.as_slice()).unwrap();

        let issuer = request.issuer.parsed().unwrap();
        let cert = request.cert.parsed().unwrap();
        assert_eq!(request.cert_id.hash_algorithm, ID_SHA1);
        assert_eq!(
            request.cert_id.issuer_name_hash,
            sha1(issuer.subject().as_raw())
        );
        assert_eq!(
            request.cert_id.issuer_key_hash,
            sha1(&issuer.public_key().subject_public_key.data)
        );
        assert_eq!(
            request.cert_id.serial_number,
            cert.tbs_certificate.raw_serial()
        );
        assert_eq!(request.id.len(), 20);
    }

    #[test]
    fn wire_format_embeds_cert_id_and_nonce() {
        let (leaf_pem, ca_der) = pair();
        let request = OcspRequest::generate(leaf_pem.as_slice(), ca_der.as_slice()).unwrap();

        let (ocsp_request, rest) = read_tlv(&request.data).unwrap();
        assert!(rest.is_empty());
        let tbs = ocsp_request.children().unwrap();
        let tbs_fields = tbs[0].children().unwrap();
        assert_eq!(tbs_fields.len(), 2);

        let request_list = tbs_fields[0].children().unwrap();
        let req_cert = request_list[0].children().unwrap()[0];
        assert_eq!(req_cert.raw, request.cert_id.to_der().as_slice());

        assert!(tbs_fields[1].is_context(2));
        let extensions = tbs_fields[1].explicit_inner().unwrap().children().unwrap();
        let nonce = extensions[0].children().unwrap();
        assert_eq!(nonce[0].oid().unwrap(), ID_PKIX_OCSP_NONCE);
        let (inner, _) = read_tlv(nonce[1].contents).unwrap();
        assert_eq!(inner.contents, &request.nonce[..]);
    }

    #[test]
    fn undecodable_certificate_is_malformed() {
        let (_, ca_der) = pair();
        let err = OcspRequest::generate(&b"garbage"[..], ca_der.as_slice()).unwrap_err();
        assert!(matches!(err, OcspError::Malformed(_)));
    }
}
