//! A process-local, in-memory [`MetadataStore`] used for tests and as a
//! reference implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::path::VaultPath;

use super::record::FileRecord;
use super::store::{MetadataError, MetadataStore};

/// In-memory metadata store backed by a single `RwLock<HashMap<..>>`.
///
/// Not persisted; useful for unit tests and as the simplest possible
/// [`MetadataStore`] implementation to read when implementing a real one.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<VaultPath, FileRecord>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, path: &VaultPath) -> Result<Option<FileRecord>, MetadataError> {
        Ok(self.records.read().await.get(path).cloned())
    }

    async fn put(&self, record: FileRecord) -> Result<(), MetadataError> {
        self.records.write().await.insert(record.path.clone(), record);
        Ok(())
    }

    async fn remove(&self, path: &VaultPath) -> Result<Option<FileRecord>, MetadataError> {
        Ok(self.records.write().await.remove(path))
    }

    async fn list_by_prefix(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.path.is_or_is_under(path))
            .cloned()
            .collect())
    }

    async fn list_children(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.path.parent().as_ref() == Some(path))
            .cloned()
            .collect())
    }

    async fn find_by_remote_name(&self, remote_name: &str) -> Result<Option<FileRecord>, MetadataError> {
        let records = self.records.read().await;
        Ok(records.values().find(|r| r.remote_name == remote_name).cloned())
    }

    async fn rename(&self, old: &VaultPath, new: &VaultPath) -> Result<(), MetadataError> {
        let mut records = self.records.write().await;
        if records.contains_key(new) {
            return Err(MetadataError::Conflict);
        }
        let moving: Vec<VaultPath> = records
            .keys()
            .filter(|p| p.is_or_is_under(old))
            .cloned()
            .collect();
        for path in moving {
            if let Some(mut record) = records.remove(&path) {
                let new_path = path.substitute_prefix(old, new);
                record.path = new_path.clone();
                records.insert(new_path, record);
            }
        }
        Ok(())
    }

    async fn remove_all(&self, path: &VaultPath) -> Result<Vec<FileRecord>, MetadataError> {
        let mut records = self.records.write().await;
        let removing: Vec<VaultPath> = records
            .keys()
            .filter(|p| p.is_or_is_under(path))
            .cloned()
            .collect();
        let mut removed = Vec::with_capacity(removing.len());
        for path in removing {
            if let Some(record) = records.remove(&path) {
                removed.push(record);
            }
        }
        Ok(removed)
    }
}
