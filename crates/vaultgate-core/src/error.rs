//! Crate-wide error taxonomy.
//!
//! Each subsystem defines its own error enum; this module composes them into
//! a single opaque-kind [`GatewayError`] that callers match on.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::metadata::MetadataError;
use crate::remote::RemoteError;
use crate::share::ShareError;

/// Top-level error returned by [`crate::proxy::Proxy`] operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("path not found")]
    NotFound,

    #[error("path is a directory")]
    IsADirectory,

    #[error("path is not a directory")]
    NotADirectory,

    #[error("path already exists")]
    AlreadyExists,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("decryption failed")]
    DecryptFailed,

    #[error("remote store error: {0}")]
    RemoteIo(#[from] RemoteError),

    #[error("metadata store error: {0}")]
    MetadataIo(#[from] MetadataError),

    #[error("share authentication failed")]
    ShareAuthFailed,

    #[error("share archive corrupt: {0}")]
    ShareCorrupt(String),

    /// Infrastructure-level failure (background task panicked or was cancelled).
    #[error("internal task failure: {0}")]
    Internal(String),
}

impl From<CryptoError> for GatewayError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptFailed => GatewayError::DecryptFailed,
            CryptoError::InvalidKeyLength { .. } => GatewayError::InvalidArgument(err.to_string()),
            CryptoError::Io(e) => GatewayError::RemoteIo(RemoteError::Io(e)),
        }
    }
}

impl From<ShareError> for GatewayError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::AuthFailed => GatewayError::ShareAuthFailed,
            ShareError::Corrupt(msg) => GatewayError::ShareCorrupt(msg),
            ShareError::Metadata(e) => GatewayError::MetadataIo(e),
            ShareError::Io(e) => GatewayError::RemoteIo(RemoteError::Io(e)),
        }
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(err: tokio::task::JoinError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}
