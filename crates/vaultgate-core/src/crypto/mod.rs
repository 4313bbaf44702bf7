//! Encryption primitives: the chunked AEAD stream codec and the master
//! key / file-encryption-key hierarchy.

pub mod chunked_aead;
pub mod keys;

pub use chunked_aead::{ChunkedReader, ChunkedWriter};
pub use keys::{Fek, MasterKey};

use thiserror::Error;

/// Errors from the codec (C1) and key-wrapping (part of C4.4.6).
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// AEAD authentication failure. Never carries chunk index or nonce.
    #[error("decryption failed")]
    DecryptFailed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
