//! Proxy core (C4, §4.4): translates virtual filesystem operations into
//! `metadata × remote × codec` operations, owning the master key and the
//! upload/download pipelines.

mod download_stream;
mod locks;

pub use download_stream::DownloadStream;

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tracing::{instrument, warn};

use crate::crypto::chunked_aead::{self, chunk_range_for, ciphertext_byte_range};
use crate::crypto::keys::{generate_base_nonce, generate_fek};
use crate::crypto::MasterKey;
use crate::error::GatewayError;
use crate::metadata::{ensure_parent_dirs, record::now_millis, FileRecord, MetadataStore};
use crate::path::VaultPath;
use crate::pending::PendingWriteCache;
use crate::remote::RemoteStore;

use locks::UploadLockRegistry;

/// The encrypting storage gateway proxy.
///
/// Constructed from an already-derived [`MasterKey`] and concrete
/// [`MetadataStore`] / [`RemoteStore`] implementations — no configuration
/// loading happens here; that is an adapter concern (§1).
pub struct Proxy<M, R>
where
    M: MetadataStore + 'static,
    R: RemoteStore + 'static,
{
    metadata: Arc<M>,
    remote: Arc<R>,
    master_key: Arc<MasterKey>,
    upload_locks: UploadLockRegistry,
    pending: PendingWriteCache,
}

impl<M, R> Proxy<M, R>
where
    M: MetadataStore + 'static,
    R: RemoteStore + 'static,
{
    pub fn new(metadata: M, remote: R, master_key: MasterKey) -> Self {
        Proxy {
            metadata: Arc::new(metadata),
            remote: Arc::new(remote),
            master_key: Arc::new(master_key),
            upload_locks: UploadLockRegistry::new(),
            pending: PendingWriteCache::new(),
        }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// §4.5: mark `path` as about to exist for up to `ttl`.
    pub fn save_placeholder(&self, path: &VaultPath, ttl: Duration) {
        self.pending.add(path, ttl);
    }

    pub fn remove_placeholder(&self, path: &VaultPath) {
        self.pending.remove(path);
    }

    pub fn has_placeholder(&self, path: &VaultPath) -> bool {
        self.pending.exists(path)
    }

    async fn generate_unique_remote_name(&self) -> Result<String, GatewayError> {
        loop {
            let mut buf = [0u8; 32];
            rand::rng().fill_bytes(&mut buf);
            let name = hex::encode(buf);
            if self.metadata.find_by_remote_name(&name).await?.is_none() {
                return Ok(name);
            }
        }
    }

    /// §4.4.3: idempotent directory creation.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn mkdir(&self, path: &VaultPath) -> Result<(), GatewayError> {
        if let Some(existing) = self.metadata.get(path).await? {
            return if existing.is_dir { Ok(()) } else { Err(GatewayError::AlreadyExists) };
        }
        ensure_parent_dirs(&*self.metadata, path).await?;
        self.metadata.put(FileRecord::new_dir(path.clone(), now_millis())).await?;
        Ok(())
    }

    /// §4.4.1: encrypt `reader`'s plaintext, store the ciphertext remotely
    /// under a fresh random name, and write the metadata record only after
    /// the remote accepts it.
    #[instrument(skip(self, reader, size), fields(path = %path))]
    pub async fn upload<Src>(&self, path: &VaultPath, reader: Src, size: Option<u64>) -> Result<(), GatewayError>
    where
        Src: AsyncRead + Send + Unpin + 'static,
    {
        let _guard = self.upload_locks.acquire(path).await;

        let existing = self.metadata.get(path).await?;
        if let Some(rec) = &existing {
            if rec.is_dir {
                return Err(GatewayError::IsADirectory);
            }
        }
        ensure_parent_dirs(&*self.metadata, path).await?;

        let fek = generate_fek();
        let base_nonce = generate_base_nonce();
        let remote_name = self.generate_unique_remote_name().await?;

        let (pipe_writer, pipe_reader) = tokio::io::duplex(64 * 1024);
        let encrypt_key = *fek;
        let encrypt_task = tokio::spawn(async move {
            let mut reader = reader;
            let mut writer = pipe_writer;
            chunked_aead::encrypt_stream(&encrypt_key, &base_nonce, &mut reader, &mut writer).await
        });

        let put_result = self.remote.put(&remote_name, Box::pin(pipe_reader), size).await;
        let actual_len = encrypt_task.await??;
        put_result?;

        if let Some(expected) = size {
            if expected != actual_len {
                return Err(GatewayError::InvalidArgument(format!(
                    "declared size {expected} does not match observed {actual_len} bytes"
                )));
            }
        }

        let wrapped_fek = self.master_key.wrap_fek(&fek);
        let record = FileRecord::new_file(
            path.clone(),
            remote_name.clone(),
            actual_len,
            wrapped_fek,
            base_nonce.to_vec(),
            now_millis(),
        );
        self.metadata.put(record).await?;
        self.pending.remove(path);

        if let Some(old) = existing {
            if !old.is_dir && old.remote_name != remote_name {
                if let Err(e) = self.remote.delete(&old.remote_name).await {
                    warn!(error = %e, remote_name = %old.remote_name, path = %path, "failed to delete replaced remote blob");
                }
            }
        }

        Ok(())
    }

    /// §4.4.2, full download.
    pub async fn download(&self, path: &VaultPath) -> Result<DownloadStream, GatewayError> {
        self.download_range(path, 0, None).await
    }

    /// §4.4.2, `(start, length)` — `length = None` means to end of file.
    #[instrument(skip(self), fields(path = %path, start, length))]
    pub async fn download_range(
        &self,
        path: &VaultPath,
        start: u64,
        length: Option<u64>,
    ) -> Result<DownloadStream, GatewayError> {
        let record = self.metadata.get(path).await?.ok_or(GatewayError::NotFound)?;
        if record.is_dir {
            return Err(GatewayError::IsADirectory);
        }
        let total = record.size;
        let len = length.unwrap_or(total.saturating_sub(start)).min(total.saturating_sub(start));

        if start >= total || len == 0 {
            return Ok(DownloadStream::empty());
        }

        let fek = self.master_key.unwrap_fek(&record.wrapped_fek)?;
        let base_nonce: [u8; 12] = record
            .base_nonce
            .clone()
            .try_into()
            .map_err(|_| GatewayError::InvalidArgument("corrupt base_nonce in metadata record".into()))?;

        let (start_chunk, end_chunk) = chunk_range_for(start, len).expect("len > 0 checked above");
        let (ct_offset, ct_len) = ciphertext_byte_range(total, start_chunk, end_chunk);
        let skip_front = start - start_chunk * chunked_aead::CHUNK_SIZE as u64;

        let ciphertext = self.remote.get_range(&record.remote_name, ct_offset, Some(ct_len)).await?;

        let (writer, reader) = tokio::io::duplex(64 * 1024);
        let (err_tx, err_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut writer = writer;
            let result = chunked_aead::decrypt_range_stream(
                &fek,
                &base_nonce,
                start_chunk,
                total,
                ciphertext,
                &mut writer,
                skip_front,
                len,
            )
            .await;
            if let Err(e) = result {
                let _ = err_tx.send(GatewayError::from(e));
            }
        });

        Ok(DownloadStream::new(reader, err_rx))
    }

    /// §4.4.4: spec-recommended fail-if-exists rename. Directories move
    /// their whole subtree by boundary-aware prefix substitution; no
    /// remote blob ever moves.
    #[instrument(skip(self), fields(old = %old, new = %new))]
    pub async fn rename(&self, old: &VaultPath, new: &VaultPath) -> Result<(), GatewayError> {
        if old == new {
            return Ok(());
        }
        self.metadata.get(old).await?.ok_or(GatewayError::NotFound)?;
        if self.metadata.get(new).await?.is_some() {
            return Err(GatewayError::AlreadyExists);
        }
        ensure_parent_dirs(&*self.metadata, new).await?;
        self.metadata.rename(old, new).await?;
        Ok(())
    }

    /// §4.4.5: file delete and recursive directory delete.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete(&self, path: &VaultPath) -> Result<(), GatewayError> {
        let record = self.metadata.get(path).await?.ok_or(GatewayError::NotFound)?;
        if record.is_dir {
            self.remove_all_dir(path).await
        } else {
            self.metadata.remove(path).await?;
            self.pending.remove(path);
            if let Err(e) = self.remote.delete(&record.remote_name).await {
                warn!(error = %e, remote_name = %record.remote_name, path = %path, "failed to delete remote blob");
            }
            Ok(())
        }
    }

    /// Alias for [`Proxy::delete`] on a directory path, kept distinct to
    /// mirror the two named operations of §4.4.5.
    pub async fn remove_all(&self, path: &VaultPath) -> Result<(), GatewayError> {
        self.delete(path).await
    }

    async fn remove_all_dir(&self, path: &VaultPath) -> Result<(), GatewayError> {
        // Remote blobs are deleted before metadata, per §4.4.5: for a
        // directory, descendants' blobs go first, then every record.
        let descendants = self.metadata.list_by_prefix(path).await?;
        for record in descendants.iter().filter(|r| !r.is_dir) {
            if let Err(e) = self.remote.delete(&record.remote_name).await {
                warn!(error = %e, remote_name = %record.remote_name, path = %record.path, "failed to delete remote blob during recursive delete");
            }
        }
        self.metadata.remove_all(path).await?;
        for record in &descendants {
            self.pending.remove(&record.path);
        }
        Ok(())
    }

    /// List immediate children of `path`, per the directory semantics of
    /// §4.2.
    pub async fn list_children(&self, path: &VaultPath) -> Result<Vec<FileRecord>, GatewayError> {
        Ok(self.metadata.list_children(path).await?)
    }

    pub async fn stat(&self, path: &VaultPath) -> Result<Option<FileRecord>, GatewayError> {
        Ok(self.metadata.get(path).await?)
    }
}
