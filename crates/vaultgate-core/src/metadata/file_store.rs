//! File-per-record [`MetadataStore`] backend (the recommended persisted
//! layout from §6): one JSON file per virtual path, mirroring the virtual
//! directory structure on disk, with an in-memory cache loaded at open
//! time and kept in sync on every write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::path::VaultPath;

use super::record::FileRecord;
use super::store::{MetadataError, MetadataStore};

const ROOT_MARKER: &str = ".vaultgate-root";
const ROOT_RECORD_FILE: &str = "__root__.json";

/// A directory-tree-backed metadata store.
///
/// The on-disk path of a record's JSON blob is derived from its virtual
/// path purely for human-navigable layout; on reload the store trusts each
/// blob's own embedded `path` field as authoritative, so a crash partway
/// through `rename`/`remove_all` (some files moved or deleted, others not)
/// never produces a corrupt record — only, at worst, a blob sitting at a
/// stale on-disk location until the next write touches it.
pub struct FileMetadataStore {
    root: PathBuf,
    cache: RwLock<HashMap<VaultPath, FileRecord>>,
}

impl FileMetadataStore {
    /// Open (creating if needed) a file-backed metadata store rooted at
    /// `root`, loading every existing record into the in-memory cache.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, MetadataError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let marker = root.join(ROOT_MARKER);
        if tokio::fs::metadata(&marker).await.is_err() {
            tokio::fs::write(&marker, b"vaultgate metadata store\n").await?;
        }

        let mut cache = HashMap::new();
        for entry in walkdir::WalkDir::new(&root).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "json") {
                let bytes = tokio::fs::read(entry.path()).await?;
                let record: FileRecord = serde_json::from_slice(&bytes)?;
                cache.insert(record.path.clone(), record);
            }
        }

        Ok(FileMetadataStore { root, cache: RwLock::new(cache) })
    }

    fn record_file_path(&self, path: &VaultPath) -> PathBuf {
        if path.is_root() {
            self.root.join(ROOT_RECORD_FILE)
        } else {
            self.root.join(format!("{}.json", path.as_str()))
        }
    }

    async fn write_record_file(&self, record: &FileRecord) -> Result<(), MetadataError> {
        let file_path = self.record_file_path(&record.path);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&file_path, bytes).await?;
        Ok(())
    }

    async fn remove_record_file(&self, path: &VaultPath) -> Result<(), MetadataError> {
        let file_path = self.record_file_path(path);
        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Path to the root marker file, exposed mainly for tests that assert
    /// `remove_all("/")` preserves it.
    pub fn marker_path(&self) -> PathBuf {
        self.root.join(ROOT_MARKER)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn get(&self, path: &VaultPath) -> Result<Option<FileRecord>, MetadataError> {
        Ok(self.cache.read().await.get(path).cloned())
    }

    async fn put(&self, record: FileRecord) -> Result<(), MetadataError> {
        self.write_record_file(&record).await?;
        self.cache.write().await.insert(record.path.clone(), record);
        Ok(())
    }

    async fn remove(&self, path: &VaultPath) -> Result<Option<FileRecord>, MetadataError> {
        let removed = self.cache.write().await.remove(path);
        if removed.is_some() {
            self.remove_record_file(path).await?;
        }
        Ok(removed)
    }

    async fn list_by_prefix(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError> {
        let cache = self.cache.read().await;
        Ok(cache.values().filter(|r| r.path.is_or_is_under(path)).cloned().collect())
    }

    async fn list_children(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError> {
        let cache = self.cache.read().await;
        Ok(cache
            .values()
            .filter(|r| r.path.parent().as_ref() == Some(path))
            .cloned()
            .collect())
    }

    async fn find_by_remote_name(&self, remote_name: &str) -> Result<Option<FileRecord>, MetadataError> {
        let cache = self.cache.read().await;
        Ok(cache.values().find(|r| r.remote_name == remote_name).cloned())
    }

    async fn rename(&self, old: &VaultPath, new: &VaultPath) -> Result<(), MetadataError> {
        let moving: Vec<FileRecord> = {
            let cache = self.cache.read().await;
            if cache.contains_key(new) {
                return Err(MetadataError::Conflict);
            }
            cache.values().filter(|r| r.path.is_or_is_under(old)).cloned().collect()
        };

        for mut record in moving {
            let old_path = record.path.clone();
            let new_path = old_path.substitute_prefix(old, new);
            record.path = new_path.clone();
            self.write_record_file(&record).await?;
            self.remove_record_file(&old_path).await?;
            let mut cache = self.cache.write().await;
            cache.remove(&old_path);
            cache.insert(new_path, record);
        }
        Ok(())
    }

    async fn remove_all(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError> {
        let removing: Vec<FileRecord> = {
            let cache = self.cache.read().await;
            cache.values().filter(|r| r.path.is_or_is_under(path)).cloned().collect()
        };
        for record in &removing {
            self.remove_record_file(&record.path).await?;
            self.cache.write().await.remove(&record.path);
        }
        Ok(removing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::record::now_millis;

    fn file(path: &str, remote_name: &str) -> FileRecord {
        FileRecord::new_file(VaultPath::new(path), remote_name.to_string(), 3, vec![0; 44], vec![0; 12], now_millis())
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileMetadataStore::open(dir.path()).await.unwrap();
            store.put(file("a/b.txt", "rn1")).await.unwrap();
        }
        let reopened = FileMetadataStore::open(dir.path()).await.unwrap();
        let record = reopened.get(&VaultPath::new("a/b.txt")).await.unwrap().unwrap();
        assert_eq!(record.remote_name, "rn1");
    }

    #[tokio::test]
    async fn remove_all_root_preserves_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::open(dir.path()).await.unwrap();
        store.put(file("a.txt", "rn1")).await.unwrap();
        store.remove_all(&VaultPath::root()).await.unwrap();
        assert!(tokio::fs::metadata(store.marker_path()).await.is_ok());
        assert!(store.get(&VaultPath::new("a.txt")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::open(dir.path()).await.unwrap();
        store.put(file("a.txt", "rn1")).await.unwrap();
        store.put(file("b.txt", "rn2")).await.unwrap();
        let err = store.rename(&VaultPath::new("a.txt"), &VaultPath::new("b.txt")).await.unwrap_err();
        assert!(matches!(err, MetadataError::Conflict));
    }
}
