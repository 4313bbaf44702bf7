//! The share archive's `manifest.json` (§6, normative on-wire format).

use serde::{Deserialize, Serialize};

/// Top-level manifest written alongside the encrypted per-record entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareManifest {
    /// Hex-encoded opaque identifier for this export.
    pub package_id: String,
    pub version: String,
    /// RFC3339 timestamp.
    pub created_at: String,
    /// Always `"rsa-aes"` for this codec version.
    pub encryption: String,
    /// Base64 `RSA-OAEP(pk_e, AK)`.
    pub encrypted_aes_key: String,
    /// Ids of the `metadata/<id>.enc` entries belonging to this archive.
    pub metadata_files: Vec<String>,
    /// Sum of the plaintext `size` of every exported record.
    pub total_size: u64,
}
