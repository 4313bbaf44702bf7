//! Share codec (C6, §4.6): exports a subtree of a vault's metadata into a
//! password-protected archive that a second vault — with a different
//! master key, but access to the same remote blob store — can import.
//!
//! The archive never touches remote blobs; it only repackages the metadata
//! each importing vault needs to find and decrypt them.

mod codec;
mod manifest;

pub use codec::{export_share, import_share};
pub use manifest::ShareManifest;

use thiserror::Error;

use crate::metadata::MetadataError;

/// Errors from export or import.
#[derive(Error, Debug)]
pub enum ShareError {
    /// The supplied password did not unlock the archive's private key.
    #[error("share password does not match this archive")]
    AuthFailed,

    /// The archive is missing an entry, or an entry does not parse.
    #[error("share archive is corrupt: {0}")]
    Corrupt(String),

    #[error("metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}
