//! The metadata store contract (C2, §4.2).

use async_trait::async_trait;
use thiserror::Error;

use crate::path::VaultPath;

use super::record::{now_millis, FileRecord};

/// Errors surfaced by a [`MetadataStore`] implementation.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The target of a rename already exists. `path-not-found` is
    /// deliberately not a variant here: it is a soft condition returned as
    /// `Option::None`, not a fault.
    #[error("path conflict: target already exists")]
    Conflict,

    #[error("metadata backend I/O error: {0}")]
    BackendIo(#[from] std::io::Error),

    #[error("metadata backend serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A key/value mapping from virtual path to [`FileRecord`], with the
/// additional bulk operations the proxy needs for directories and
/// cross-reference lookups.
///
/// Implementations must be internally thread-safe: the proxy shares one
/// instance across concurrent callers. Single-path operations
/// (`get`/`put`/`remove`) are atomic; `rename`/`remove_all` need only be
/// crash-safe (§4.2) — an interrupted call may leave a partially-moved or
/// partially-deleted subtree, but never a corrupt individual record.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Look up the record at `path`. Absence is not an error.
    async fn get(&self, path: &VaultPath) -> Result<Option<FileRecord>, MetadataError>;

    /// Insert or overwrite the record at `record.path`.
    async fn put(&self, record: FileRecord) -> Result<(), MetadataError>;

    /// Remove and return the single record at `path`, if any.
    async fn remove(&self, path: &VaultPath) -> Result<Option<FileRecord>, MetadataError>;

    /// Every record whose path is `path`, or lies under it
    /// (`path == other` or `other` starts with `path + "/"`).
    async fn list_by_prefix(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError>;

    /// Immediate children of `path`: records at `path/<name>` with no
    /// further slash in `<name>`.
    async fn list_children(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError>;

    /// The record whose `remote_name` matches, if any. At most one record
    /// may ever share a `remote_name`.
    async fn find_by_remote_name(&self, remote_name: &str) -> Result<Option<FileRecord>, MetadataError>;

    /// Recursively relocate every record at or under `old` to the
    /// corresponding path under `new`, preserving `remote_name`. Fails with
    /// [`MetadataError::Conflict`] if `new` already has a record.
    async fn rename(&self, old: &VaultPath, new: &VaultPath) -> Result<(), MetadataError>;

    /// Recursively remove every record at or under `path`, returning the
    /// removed records (so the caller can act on file descendants, e.g.
    /// deleting their remote blobs).
    async fn remove_all(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError>;
}

/// Materialize every missing strict-prefix ancestor directory of `path`
/// as an explicit `is_dir` record.
///
/// §3 requires a dir record for every strict-prefix ancestor of a path
/// that has a record, "OR the store synthesises them on read … whichever
/// is chosen must be consistent for listing". Neither [`super::memory_store::InMemoryMetadataStore`]
/// nor [`super::file_store::FileMetadataStore`] synthesises on read — both
/// `list_children` implementations only match records whose `parent()` is
/// exactly `path` — so every writer that can introduce a new nested path
/// (`Proxy::upload`/`mkdir`/`rename`, and [`crate::share::import_share`])
/// must call this first.
pub async fn ensure_parent_dirs(metadata: &dyn MetadataStore, path: &VaultPath) -> Result<(), MetadataError> {
    for ancestor in path.ancestors() {
        if metadata.get(&ancestor).await?.is_none() {
            metadata.put(FileRecord::new_dir(ancestor, now_millis())).await?;
        }
    }
    Ok(())
}
