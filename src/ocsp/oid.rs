//! Object identifiers used by OCSP requests, responses and certificates.

use asn1_rs::{Oid, oid};

// Access methods (RFC 5280 §4.2.2.1)
pub const ID_AD_OCSP: Oid<'static> = oid!(1.3.6.1.5.5.7.48.1);
pub const ID_AD_CA_ISSUERS: Oid<'static> = oid!(1.3.6.1.5.5.7.48.2);
pub const ID_PE_AUTHORITY_INFO_ACCESS: Oid<'static> = oid!(1.3.6.1.5.5.7.1.1);

// OCSP (RFC 6960)
pub const ID_PKIX_OCSP_BASIC: Oid<'static> = oid!(1.3.6.1.5.5.7.48.1.1);
pub const ID_PKIX_OCSP_NONCE: Oid<'static> = oid!(1.3.6.1.5.5.7.48.1.2);
pub const ID_KP_OCSP_SIGNING: Oid<'static> = oid!(1.3.6.1.5.5.7.3.9);

// Digests
pub const ID_SHA1: Oid<'static> = oid!(1.3.14.3.2.26);
pub const ID_SHA256: Oid<'static> = oid!(2.16.840.1.101.3.4.2.1);
pub const ID_SHA384: Oid<'static> = oid!(2.16.840.1.101.3.4.2.2);
pub const ID_SHA512: Oid<'static> = oid!(2.16.840.1.101.3.4.2.3);

// Signature algorithms
pub const SHA1_WITH_RSA: Oid<'static> = oid!(1.2.840.113549.1.1.5);
pub const SHA256_WITH_RSA: Oid<'static> = oid!(1.2.840.113549.1.1.11);
pub const SHA384_WITH_RSA: Oid<'static> = oid!(1.2.840.113549.1.1.12);
pub const SHA512_WITH_RSA: Oid<'static> = oid!(1.2.840.113549.1.1.13);
pub const RSASSA_PSS: Oid<'static> = oid!(1.2.840.113549.1.1.10);
pub const ECDSA_WITH_SHA256: Oid<'static> = oid!(1.2.840.10045.4.3.2);
pub const ECDSA_WITH_SHA384: Oid<'static> = oid!(1.2.840.10045.4.3.3);
pub const ED25519: Oid<'static> = oid!(1.3.101.112);

// Named curves
pub const SECP256R1: Oid<'static> = oid!(1.2.840.10045.3.1.7);
pub const SECP384R1: Oid<'static> = oid!(1.3.132.0.34);

/// Detaches an OID from the buffer it was decoded from.
pub fn to_owned_oid(oid: &Oid<'_>) -> Oid<'static> {
    Oid::new(oid.as_bytes().to_vec().into())
}
