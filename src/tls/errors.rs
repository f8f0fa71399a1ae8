use openssl::error::ErrorStack;
use thiserror::Error;

use crate::ocsp::OcspError;

/// Errors that can occur during TLS operations.
#[derive(Error, Debug)]
pub enum TlsError {
    #[error(transparent)]
    OpenSSL(#[from] ErrorStack),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[from] openssl::ssl::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Peer presented no certificate")]
    NoPeerCertificate,

    #[error("Revocation check failed: {0}")]
    Revocation(#[from] OcspError),
}

impl TlsError {
    /// The revocation failure behind this error, if any.
    pub fn as_ocsp(&self) -> Option<&OcspError> {
        match self {
            Self::Revocation(e) => Some(e),
            _ => None,
        }
    }
}
