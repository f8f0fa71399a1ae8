use std::fmt;
use std::sync::Arc;

use asn1_rs::Oid;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::pem::parse_x509_pem;
use x509_parser::certificate::X509Certificate;
use x509_parser::parse_x509_certificate;

use crate::ocsp::oid::{ID_AD_CA_ISSUERS, ID_AD_OCSP};
use crate::ocsp::{OcspError, OcspResult, PublicKey};

const PEM_LABEL: &str = "CERTIFICATE";

/// A DER-encoded X.509 certificate that is known to decode.
///
/// The decoded view borrows from the stored bytes and is produced on demand.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Arc<[u8]>,
}

impl Certificate {
    /// Create a certificate from DER data
    pub fn from_der(der: impl Into<Vec<u8>>) -> OcspResult<Self> {
        let der: Vec<u8> = der.into();
        parse_x509_certificate(&der)
            .map_err(|e| OcspError::Malformed(format!("Failed to parse certificate: {e}")))?;
        Ok(Self { der: der.into() })
    }

    /// Create a certificate from a single PEM `CERTIFICATE` block
    pub fn from_pem(pem: &[u8]) -> OcspResult<Self> {
        let (_, pem) = parse_x509_pem(pem)
            .map_err(|e| OcspError::Malformed(format!("Failed to parse PEM certificate: {e}")))?;
        if pem.label != PEM_LABEL {
            return Err(OcspError::Malformed(format!(
                "Unexpected PEM label {:?}",
                pem.label
            )));
        }
        Self::from_der(pem.contents)
    }

    /// Accepts either PEM text or raw DER.
    pub fn decode(input: &[u8]) -> OcspResult<Self> {
        if input.trim_ascii_start().starts_with(b"-----BEGIN") {
            Self::from_pem(input)
        } else {
            Self::from_der(input)
        }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Decoded view of the certificate
    pub fn parsed(&self) -> OcspResult<X509Certificate<'_>> {
        let (_, cert) = parse_x509_certificate(&self.der)
            .map_err(|e| OcspError::Malformed(format!("Failed to parse certificate: {e}")))?;
        Ok(cert)
    }

    /// Subject public key of this certificate
    pub fn public_key(&self) -> OcspResult<PublicKey> {
        Ok(PublicKey::from_spki(self.parsed()?.public_key()))
    }

    /// URI of the OCSP responder advertised in the AIA extension
    pub fn ocsp_responder_uri(&self) -> OcspResult<String> {
        authority_info_access(&self.parsed()?, &ID_AD_OCSP)
    }

    /// URI of the issuing CA certificate advertised in the AIA extension
    pub fn ca_issuers_uri(&self) -> OcspResult<String> {
        authority_info_access(&self.parsed()?, &ID_AD_CA_ISSUERS)
    }

    pub fn has_ocsp_signing(&self) -> bool {
        self.parsed()
            .map(|cert| has_ocsp_signing_eku(&cert))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parsed() {
            Ok(cert) => f
                .debug_struct("Certificate")
                .field("subject", &cert.subject().to_string())
                .field("serial", &hex::encode(cert.tbs_certificate.raw_serial()))
                .finish(),
            Err(_) => f.debug_struct("Certificate").finish_non_exhaustive(),
        }
    }
}

/// Conversion of the accepted certificate inputs (decoded, PEM or DER).
pub trait IntoCertificate {
    fn into_certificate(self) -> OcspResult<Certificate>;
}

impl IntoCertificate for Certificate {
    fn into_certificate(self) -> OcspResult<Certificate> {
        Ok(self)
    }
}

impl IntoCertificate for &Certificate {
    fn into_certificate(self) -> OcspResult<Certificate> {
        Ok(self.clone())
    }
}

impl IntoCertificate for &[u8] {
    fn into_certificate(self) -> OcspResult<Certificate> {
        Certificate::decode(self)
    }
}

impl IntoCertificate for Vec<u8> {
    fn into_certificate(self) -> OcspResult<Certificate> {
        Certificate::decode(&self)
    }
}

impl IntoCertificate for &str {
    fn into_certificate(self) -> OcspResult<Certificate> {
        Certificate::decode(self.as_bytes())
    }
}

/// Finds the URI registered under `method` in the AIA extension.
pub fn authority_info_access(cert: &X509Certificate<'_>, method: &Oid<'_>) -> OcspResult<String> {
    let mut has_aia = false;
    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            has_aia = true;
            for desc in &aia.accessdescs {
                if desc.access_method != *method {
                    continue;
                }
                if let GeneralName::URI(uri) = &desc.access_location {
                    return Ok(uri.to_string());
                }
            }
        }
    }

    if has_aia {
        Err(OcspError::ExtensionMissing(method.to_id_string()))
    } else {
        Err(OcspError::ExtensionMissing("AuthorityInfoAccess".to_string()))
    }
}

/// Whether the certificate's EKU extension allows OCSP signing.
pub fn has_ocsp_signing_eku(cert: &X509Certificate<'_>) -> bool {
    cert.extensions().iter().any(|ext| {
        matches!(
            ext.parsed_extension(),
            ParsedExtension::ExtendedKeyUsage(eku) if eku.ocsp_signing
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::{AccessLocations, generate_ca_certificate, generate_leaf_certificate};

    #[test]
    fn decodes_pem_and_der_to_the_same_certificate() {
        let (ca_cert, _) = generate_ca_certificate().unwrap();
        let from_pem = Certificate::decode(&ca_cert.to_pem().unwrap()).unwrap();
        let from_der = Certificate::decode(&ca_cert.to_der().unwrap()).unwrap();
        assert_eq!(from_pem, from_der);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Certificate::decode(b"not a certificate"),
            Err(OcspError::Malformed(_))
        ));
        assert!(matches!(
            Certificate::decode(b"-----BEGIN CERTIFICATE-----\n!!!\n-----END CERTIFICATE-----"),
            Err(OcspError::Malformed(_))
        ));
    }

    #[test]
    fn looks_up_access_locations() {
        let (ca_cert, ca_key) = generate_ca_certificate().unwrap();
        let locations = AccessLocations {
            ocsp: Some("http://ocsp.example.test/".to_string()),
            ca_issuers: Some("http://ca.example.test/ca.der".to_string()),
        };
        let (leaf, _) = generate_leaf_certificate(&ca_cert, &ca_key, &locations).unwrap();
        let leaf = Certificate::from_der(leaf.to_der().unwrap()).unwrap();

        assert_eq!(
            leaf.ocsp_responder_uri().unwrap(),
            "http://ocsp.example.test/"
        );
        assert_eq!(
            leaf.ca_issuers_uri().unwrap(),
            "http://ca.example.test/ca.der"
        );
    }

    #[test]
    fn missing_access_method_is_reported() {
        let (ca_cert, ca_key) = generate_ca_certificate().unwrap();
        let only_ocsp = AccessLocations {
            ocsp: Some("http://ocsp.example.test/".to_string()),
            ca_issuers: None,
        };
        let (leaf, _) = generate_leaf_certificate(&ca_cert, &ca_key, &only_ocsp).unwrap();
        let leaf = Certificate::from_der(leaf.to_der().unwrap()).unwrap();
        assert!(matches!(
            leaf.ca_issuers_uri(),
            Err(OcspError::ExtensionMissing(method)) if method == "1.3.6.1.5.5.7.48.2"
        ));

        let ca = Certificate::from_der(ca_cert.to_der().unwrap()).unwrap();
        assert!(matches!(
            ca.ocsp_responder_uri(),
            Err(OcspError::ExtensionMissing(_))
        ));
    }
}
