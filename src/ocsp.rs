//! Online Certificate Status Protocol (RFC 6960)
//!
//! # Features
//! - Request construction with a random nonce
//! - Response decoding with exact byte ranges of every signed body
//! - Issuer or delegated responder signature verification
//! - CertID, status and freshness checks
//! - Live queries against the responder named in the certificate

mod algorithm;
pub mod builder;
mod check;
pub(crate) mod der;
mod errors;
pub mod oid;
mod request;
mod responder;
mod response;
mod signature;
mod verify;

// Re-export public types
pub use algorithm::{AlgorithmId, DigestAlgorithm, SignatureScheme};
pub use builder::BasicResponseBuilder;
pub use check::{OCSP_REQUEST_CONTENT_TYPE, OcspChecker};
pub use errors::{OcspError, OcspResult, SignError};
pub use request::{CertId, NONCE_LEN, OcspRequest};
pub use responder::resolve_responder_key;
pub use response::{
    CertStatus, ParsedResponse, ResponderCertificate, ResponderId, ResponseCertId, ResponseData,
    ResponseStatus, SingleResponse,
};
pub use signature::{EcCurve, PublicKey, verify_signature};
pub use verify::{DEFAULT_CLOCK_SKEW, VerifyOptions, verify};

pub(crate) use check::success_body;
