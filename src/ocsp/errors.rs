use chrono::{DateTime, Utc};
use openssl::error::ErrorStack;
use thiserror::Error;

use super::algorithm::DigestAlgorithm;
use super::response::{CertStatus, ResponseStatus};

/// OCSP-related errors
#[derive(Error, Debug)]
pub enum OcspError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Hash algorithm mismatch: requested {expected}, response carries {actual}")]
    AlgorithmMismatch { expected: String, actual: String },

    #[error("Issuer name hash mismatch")]
    IssuerNameMismatch,

    #[error("Issuer key hash mismatch")]
    IssuerKeyMismatch,

    #[error("Serial number mismatch")]
    SerialNumberMismatch,

    #[error("OCSP Status: {0}")]
    InvalidStatus(CertStatus),

    #[error("OCSP Response expired (thisUpdate={this_update}, nextUpdate={next_update:?}, now={now})")]
    ResponseExpired {
        this_update: DateTime<Utc>,
        next_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    },

    #[error("Expected at least one response")]
    NoResponses,

    #[error("Extension not found: {0}")]
    ExtensionMissing(String),

    #[error("Unknown signature algorithm {0}")]
    UnknownAlgorithm(String),

    #[error("Bad OCSP response status: {0}")]
    BadStatus(ResponseStatus),

    #[error("Unknown OCSP response type: {0}")]
    UnsupportedResponseType(String),

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Revocation check for this connection was already resolved")]
    AlreadyResolved,
}

impl OcspError {
    /// Stable code for the typed verification failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidSignature => Some("OCSP_INVALID_SIGNATURE"),
            Self::AlgorithmMismatch { .. } => Some("OCSP_ALGORITHM_MISMATCH"),
            Self::IssuerNameMismatch => Some("OCSP_ISSUER_NAME_MISMATCH"),
            Self::IssuerKeyMismatch => Some("OCSP_ISSUER_KEY_MISMATCH"),
            Self::SerialNumberMismatch => Some("OCSP_SERIAL_NUMBER_MISMATCH"),
            Self::InvalidStatus(_) => Some("OCSP_INVALID_STATUS"),
            Self::ResponseExpired { .. } => Some("OCSP_RESPONSE_EXPIRED"),
            _ => None,
        }
    }
}

/// Convenient Result type alias
pub type OcspResult<T> = Result<T, OcspError>;

/// Errors raised while signing a built OCSP response
#[derive(Error, Debug)]
pub enum SignError {
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] ErrorStack),

    #[error("Unsupported signing key type (nid {0})")]
    UnsupportedKey(i32),

    #[error("{digest:?} cannot be used with {key} keys")]
    UnsupportedDigest {
        digest: DigestAlgorithm,
        key: &'static str,
    },
}
