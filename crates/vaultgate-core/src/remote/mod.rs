//! Remote blob store contract (C3, §4.3).
//!
//! The proxy consumes any value implementing [`RemoteStore`]; concrete
//! backends (S3, WebDAV, a local directory) are out of scope for this
//! crate and live on the other side of this trait.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Errors from a [`RemoteStore`] backend.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote object not found")]
    NotFound,

    #[error("remote backend does not support range reads")]
    RangeNotSupported,

    #[error("remote backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote backend error: {0}")]
    Other(String),
}

/// Size and modification time of a remote object, as returned by
/// [`RemoteStore::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobStat {
    pub size: u64,
    pub modified: SystemTime,
}

/// An owned, `'static` byte stream handed to [`RemoteStore::put`].
pub type BodyStream = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Contract for the opaque, flat-namespace remote object store the proxy
/// persists ciphertext into.
///
/// `size = None` in [`RemoteStore::put`] means the length is unknown up
/// front (the implementation may buffer or use chunked transfer encoding).
/// `length = None` in [`RemoteStore::get_range`] means "to end".
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Stream-upload `body` under `name`, overwriting any existing object.
    async fn put(&self, name: &str, body: BodyStream, size: Option<u64>) -> Result<(), RemoteError>;

    /// Stream-download the full object from offset 0.
    async fn get(&self, name: &str) -> Result<BodyStream, RemoteError>;

    /// Stream a byte range `[start, start+length)` (or `[start, end)` when
    /// `length` is `None`). Lack of range support is a fatal configuration
    /// error, not a silent full-object fallback.
    async fn get_range(&self, name: &str, start: u64, length: Option<u64>) -> Result<BodyStream, RemoteError>;

    /// Delete `name`. Idempotent: deleting a missing object is not an
    /// error.
    async fn delete(&self, name: &str) -> Result<(), RemoteError>;

    /// Rename `old` to `new`, server-side if the backend supports it,
    /// otherwise copy-then-delete. The proxy's own path renames are
    /// metadata-only and never call this; it exists for backends that need
    /// it internally.
    async fn rename(&self, old: &str, new: &str) -> Result<(), RemoteError>;

    /// Size and modification time of `name`.
    async fn stat(&self, name: &str) -> Result<BlobStat, RemoteError>;
}

pub mod memory {
    //! An in-memory [`RemoteStore`] test double. Not gated behind
    //! `#[cfg(test)]` so integration tests in `tests/` can use it too.

    use std::collections::HashMap;
    use std::time::SystemTime;

    use tokio::io::AsyncReadExt;
    use tokio::sync::RwLock;

    use super::{BlobStat, BodyStream, RemoteError, RemoteStore};
    use async_trait::async_trait;

    #[derive(Default)]
    pub struct InMemoryRemoteStore {
        objects: RwLock<HashMap<String, (Vec<u8>, SystemTime)>>,
    }

    impl InMemoryRemoteStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl RemoteStore for InMemoryRemoteStore {
        async fn put(&self, name: &str, mut body: BodyStream, _size: Option<u64>) -> Result<(), RemoteError> {
            let mut buf = Vec::new();
            body.read_to_end(&mut buf).await?;
            self.objects.write().await.insert(name.to_string(), (buf, SystemTime::now()));
            Ok(())
        }

        async fn get(&self, name: &str) -> Result<BodyStream, RemoteError> {
            self.get_range(name, 0, None).await
        }

        async fn get_range(&self, name: &str, start: u64, length: Option<u64>) -> Result<BodyStream, RemoteError> {
            let objects = self.objects.read().await;
            let (bytes, _) = objects.get(name).ok_or(RemoteError::NotFound)?;
            let start = start as usize;
            let end = match length {
                Some(len) => (start + len as usize).min(bytes.len()),
                None => bytes.len(),
            };
            let slice = bytes.get(start..end).unwrap_or(&[]).to_vec();
            Ok(Box::pin(std::io::Cursor::new(slice)))
        }

        async fn delete(&self, name: &str) -> Result<(), RemoteError> {
            self.objects.write().await.remove(name);
            Ok(())
        }

        async fn rename(&self, old: &str, new: &str) -> Result<(), RemoteError> {
            let mut objects = self.objects.write().await;
            if let Some(entry) = objects.remove(old) {
                objects.insert(new.to_string(), entry);
            }
            Ok(())
        }

        async fn stat(&self, name: &str) -> Result<BlobStat, RemoteError> {
            let objects = self.objects.read().await;
            let (bytes, modified) = objects.get(name).ok_or(RemoteError::NotFound)?;
            Ok(BlobStat { size: bytes.len() as u64, modified: *modified })
        }
    }
}
