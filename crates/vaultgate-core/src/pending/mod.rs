//! Pending-write cache (C5, §4.5): tracks paths an adapter has promised
//! will imminently exist, covering two-phase client create flows
//! (`create, close(empty), stat, open-for-write, write, close`).

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::path::VaultPath;

/// Default placeholder time-to-live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Process-local, in-memory placeholder map.
///
/// Expiry is lazy: a lookup that observes `now > expires_at` treats the
/// entry as absent and removes it, rather than relying on a background
/// sweep.
#[derive(Default)]
pub struct PendingWriteCache {
    entries: DashMap<VaultPath, Instant>,
}

impl PendingWriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` will imminently exist, for up to `ttl`.
    pub fn add(&self, path: &VaultPath, ttl: Duration) {
        self.entries.insert(path.clone(), Instant::now() + ttl);
    }

    /// Whether `path` has a live placeholder. Expires the entry as a
    /// side effect if it has outlived its TTL.
    pub fn exists(&self, path: &VaultPath) -> bool {
        let Some(expires_at) = self.entries.get(path).map(|e| *e) else {
            return false;
        };
        if Instant::now() > expires_at {
            self.entries.remove(path);
            false
        } else {
            true
        }
    }

    /// Clear any placeholder at `path`, e.g. once a real `Upload`
    /// completes.
    pub fn remove(&self, path: &VaultPath) {
        self.entries.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_exists() {
        let cache = PendingWriteCache::new();
        let path = VaultPath::new("new.txt");
        cache.add(&path, Duration::from_secs(30));
        assert!(cache.exists(&path));
    }

    #[test]
    fn expires_after_ttl() {
        let cache = PendingWriteCache::new();
        let path = VaultPath::new("new.txt");
        cache.add(&path, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cache.exists(&path));
    }

    #[test]
    fn remove_clears_entry() {
        let cache = PendingWriteCache::new();
        let path = VaultPath::new("new.txt");
        cache.add(&path, Duration::from_secs(30));
        cache.remove(&path);
        assert!(!cache.exists(&path));
    }

    #[test]
    fn missing_path_does_not_exist() {
        let cache = PendingWriteCache::new();
        assert!(!cache.exists(&VaultPath::new("nope.txt")));
    }
}
