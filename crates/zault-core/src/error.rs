//! Error taxonomy for Zault.
//!
//! Every public operation fails with exactly one of these variants; none of
//! them carries enough detail to distinguish, say, a missing content block
//! from a missing metadata block, because callers are expected to match on
//! the taxonomy rather than parse prose out of an error string.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZaultError {
    #[error("not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid block")]
    InvalidBlock,

    #[error("invalid metadata")]
    InvalidMetadata,

    #[error("invalid export file")]
    InvalidExportFile,

    #[error("authentication failed")]
    AuthFailed,

    #[error("share expired")]
    ShareExpired,

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("crypto error: {0}")]
    CryptoError(String),

    #[error("out of memory")]
    OutOfMemory,
}

impl From<std::io::Error> for ZaultError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            ZaultError::NotFound
        } else {
            ZaultError::StorageFailure(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ZaultError>;
