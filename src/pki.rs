//! Certificates and issuer retrieval

mod certificate;
mod issuer;

// Re-export commonly used types
pub use certificate::{
    Certificate, IntoCertificate, authority_info_access, has_ocsp_signing_eku,
};
pub use issuer::{DEFAULT_ISSUER_CACHE_CAPACITY, IssuerFetcher};
