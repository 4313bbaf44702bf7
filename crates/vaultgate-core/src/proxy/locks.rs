//! Per-path upload serialization (§5): "Per-path concurrency is bounded to
//! one in-progress `Upload` at a time."
//!
//! Modeled on a dashmap-backed lock registry: one `Mutex` per path,
//! created lazily and dropped once nothing references it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::path::VaultPath;

#[derive(Default)]
pub struct UploadLockRegistry {
    locks: DashMap<VaultPath, Arc<Mutex<()>>>,
}

impl UploadLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, path: &VaultPath) -> Arc<Mutex<()>> {
        self.locks.entry(path.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquire exclusive access for `path`, blocking any other concurrent
    /// upload to the same path until the guard is dropped.
    pub async fn acquire(&self, path: &VaultPath) -> OwnedMutexGuard<()> {
        let lock = self.get_or_create(path);
        lock.lock_owned().await
    }
}
