//! The file metadata record (§3).

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::path::VaultPath;

/// A single per-path metadata record.
///
/// For directories, `wrapped_fek` and `base_nonce` are empty and `size` is
/// always `0` — directories hold no blob.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: VaultPath,
    pub remote_name: String,
    pub is_dir: bool,
    pub size: u64,
    #[serde_as(as = "Base64")]
    pub wrapped_fek: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub base_nonce: Vec<u8>,
    /// Milliseconds since the Unix epoch, UTC.
    pub updated_at: u64,
}

impl FileRecord {
    /// A synthetic directory record at `path`.
    pub fn new_dir(path: VaultPath, updated_at: u64) -> Self {
        FileRecord {
            path,
            remote_name: String::new(),
            is_dir: true,
            size: 0,
            wrapped_fek: Vec::new(),
            base_nonce: Vec::new(),
            updated_at,
        }
    }

    /// A file record describing an uploaded blob.
    #[allow(clippy::too_many_arguments)]
    pub fn new_file(
        path: VaultPath,
        remote_name: String,
        size: u64,
        wrapped_fek: Vec<u8>,
        base_nonce: Vec<u8>,
        updated_at: u64,
    ) -> Self {
        FileRecord {
            path,
            remote_name,
            is_dir: false,
            size,
            wrapped_fek,
            base_nonce,
            updated_at,
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
