use openssl::asn1::{Asn1Integer, Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509, X509Builder, X509Extension, X509Name, X509NameBuilder};

use crate::ocsp::der;
use crate::ocsp::oid::{ID_AD_CA_ISSUERS, ID_AD_OCSP, ID_PE_AUTHORITY_INFO_ACCESS};

/// URIs placed in a leaf's Authority Information Access extension.
#[derive(Debug, Clone, Default)]
pub struct AccessLocations {
    pub ocsp: Option<String>,
    pub ca_issuers: Option<String>,
}

/// A CA and a `localhost` server certificate issued by it, PEM encoded.
pub fn generate_test_certificates(
    locations: &AccessLocations,
) -> Result<TestCertificates, ErrorStack> {
    let (ca_cert, ca_key) = generate_ca_certificate()?;
    let (server_cert, server_key) = generate_leaf_certificate(&ca_cert, &ca_key, locations)?;

    Ok(TestCertificates {
        server_cert: server_cert.to_pem()?,
        server_key: server_key.private_key_to_pem_pkcs8()?,
        ca_cert: ca_cert.to_pem()?,
    })
}

#[derive(Debug, Clone)]
pub struct TestCertificates {
    pub server_cert: Vec<u8>,
    pub server_key: Vec<u8>,
    pub ca_cert: Vec<u8>,
}

pub fn generate_ca_certificate() -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = generate_key()?;
    let subject_name = create_x509_name(&[
        ("C", "CM"),
        ("O", "OCSP Agent Test"),
        ("CN", "Test Root CA"),
    ])?;

    let mut cert_builder = base_builder(&subject_name, &subject_name, &key_pair)?;
    cert_builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()?,
    )?;
    cert_builder.sign(&key_pair, MessageDigest::sha256())?;

    Ok((cert_builder.build(), key_pair))
}

/// Server certificate for `localhost`, optionally advertising OCSP and CA
/// issuer locations.
pub fn generate_leaf_certificate(
    ca_cert: &X509,
    ca_key: &PKey<Private>,
    locations: &AccessLocations,
) -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = generate_key()?;
    let subject_name = create_x509_name(&[("C", "CM"), ("O", "Test"), ("CN", "localhost")])?;

    let mut cert_builder = base_builder(&subject_name, ca_cert.subject_name(), &key_pair)?;
    cert_builder.append_extension(BasicConstraints::new().build()?)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;

    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .ip("127.0.0.1")
        .build(&cert_builder.x509v3_context(Some(ca_cert), None))?;
    cert_builder.append_extension(san)?;

    if locations.ocsp.is_some() || locations.ca_issuers.is_some() {
        cert_builder.append_extension(authority_info_access(locations)?)?;
    }

    cert_builder.sign(ca_key, MessageDigest::sha256())?;

    Ok((cert_builder.build(), key_pair))
}

/// Delegated responder certificate carrying the OCSP signing EKU.
pub fn generate_responder_certificate(
    ca_cert: &X509,
    ca_key: &PKey<Private>,
) -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = generate_key()?;
    let subject_name = create_x509_name(&[("CN", "OCSP Responder")])?;

    let mut cert_builder = base_builder(&subject_name, ca_cert.subject_name(), &key_pair)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .build()?,
    )?;
    cert_builder.append_extension(ExtendedKeyUsage::new().other("OCSPSigning").build()?)?;
    cert_builder.sign(ca_key, MessageDigest::sha256())?;

    Ok((cert_builder.build(), key_pair))
}

fn generate_key() -> Result<PKey<Private>, ErrorStack> {
    PKey::from_rsa(Rsa::generate(2048)?)
}

fn base_builder(
    subject: &openssl::x509::X509NameRef,
    issuer: &openssl::x509::X509NameRef,
    key_pair: &PKey<Private>,
) -> Result<X509Builder, ErrorStack> {
    let mut cert_builder = X509Builder::new()?;
    cert_builder.set_version(2)?;
    let serial_number = generate_serial_number()?;
    cert_builder.set_serial_number(&serial_number)?;
    cert_builder.set_subject_name(subject)?;
    cert_builder.set_issuer_name(issuer)?;
    cert_builder.set_pubkey(key_pair)?;

    // Valid for one year
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;
    Ok(cert_builder)
}

// SEQUENCE OF AccessDescription { accessMethod, accessLocation [6] IA5String }
fn authority_info_access(locations: &AccessLocations) -> Result<X509Extension, ErrorStack> {
    let mut descriptions = Vec::new();
    if let Some(uri) = &locations.ocsp {
        descriptions.push(der::sequence(&[
            &der::oid(&ID_AD_OCSP),
            &der::implicit_primitive(6, uri.as_bytes()),
        ]));
    }
    if let Some(uri) = &locations.ca_issuers {
        descriptions.push(der::sequence(&[
            &der::oid(&ID_AD_CA_ISSUERS),
            &der::implicit_primitive(6, uri.as_bytes()),
        ]));
    }
    let parts: Vec<&[u8]> = descriptions.iter().map(Vec::as_slice).collect();
    let value = der::sequence(&parts);

    let oid = Asn1Object::from_str(&ID_PE_AUTHORITY_INFO_ACCESS.to_id_string())?;
    let contents = Asn1OctetString::new_from_bytes(&value)?;
    X509Extension::new_from_der(&oid, false, &contents)
}

fn generate_serial_number() -> Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

fn create_x509_name(entries: &[(&str, &str)]) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value)?;
    }
    Ok(name_builder.build())
}
