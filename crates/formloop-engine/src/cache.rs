//! Fingerprint-keyed document index cache
//!
//! Layout: `<root>/<fingerprint>/index.json` plus `meta.json`. An entry is
//! built in a staging directory under `<root>` and renamed into place, so a
//! directory that exists is always complete. Entries are never evicted or
//! rewritten; identical bytes always resolve to the same entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use formloop_utils::atomic_write::{PublishOutcome, publish_dir_atomic};
use formloop_utils::error::{CacheError, RunError};
use formloop_utils::fingerprint::{fingerprint_bytes, is_fingerprint};
use formloop_utils::paths::ensure_dir_all;

use crate::collaborators::{DocumentIndexer, IndexHandle};

pub const INDEX_FILE: &str = "index.json";
pub const META_FILE: &str = "meta.json";

/// Hit/miss counters for one cache instance
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub writes: usize,
}

impl CacheStats {
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Sidecar describing a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub fingerprint: String,
    pub source_bytes: u64,
    pub index_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct IndexCache {
    root: PathBuf,
    stats: Mutex<CacheStats>,
}

impl IndexCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, f: impl FnOnce(&mut CacheStats)) {
        f(&mut self.stats.lock().unwrap_or_else(|e| e.into_inner()));
    }

    #[must_use]
    pub fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Look up a published entry. `Ok(None)` means "not cached".
    pub fn load(&self, key: &str) -> Result<Option<IndexHandle>, CacheError> {
        if !is_fingerprint(key) {
            return Ok(None);
        }
        let dir = self.entry_dir(key);
        if !dir.is_dir() {
            return Ok(None);
        }
        let artifact_path = dir.join(INDEX_FILE);
        if !artifact_path.is_file() {
            return Err(CacheError::Corrupt {
                key: key.to_string(),
                reason: format!("{INDEX_FILE} is missing"),
            });
        }
        Ok(Some(IndexHandle {
            cache_key: key.to_string(),
            artifact_path,
        }))
    }

    /// Publish `index` under `key`. If another writer won the race, its entry
    /// is returned and ours is discarded.
    pub fn store(
        &self,
        key: &str,
        source_bytes: u64,
        index: &[u8],
    ) -> Result<IndexHandle, CacheError> {
        let publish_err = |reason: String| CacheError::PublishFailed {
            key: key.to_string(),
            reason,
        };

        ensure_dir_all(&self.root).map_err(|e| CacheError::Unavailable {
            path: self.root.display().to_string(),
            reason: e.to_string(),
        })?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|e| publish_err(format!("failed to create staging directory: {e}")))?;

        let meta = CacheMeta {
            fingerprint: key.to_string(),
            source_bytes,
            index_bytes: index.len() as u64,
            created_at: Utc::now(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| publish_err(format!("failed to serialize {META_FILE}: {e}")))?;

        write_synced(&staging.path().join(INDEX_FILE), index)
            .map_err(|e| publish_err(format!("failed to write {INDEX_FILE}: {e}")))?;
        write_synced(&staging.path().join(META_FILE), &meta_json)
            .map_err(|e| publish_err(format!("failed to write {META_FILE}: {e}")))?;

        // `staging` still owns the directory: any error below removes it on drop.
        let target = self.entry_dir(key);
        match publish_dir_atomic(staging.path(), &target)
            .map_err(|e| publish_err(format!("{e:#}")))?
        {
            PublishOutcome::Published => {
                // Moved into place; nothing left to clean up.
                let _ = staging.keep();
                self.record(|s| s.writes += 1);
                debug!(key = %key, bytes = index.len(), "Published index cache entry");
            }
            PublishOutcome::AlreadyPresent => {
                debug!(key = %key, "Index cache entry published concurrently, keeping existing");
            }
        }

        Ok(IndexHandle {
            cache_key: key.to_string(),
            artifact_path: target.join(INDEX_FILE),
        })
    }

    /// Return the index for `bytes`, building and publishing it on a miss.
    pub async fn resolve(
        &self,
        bytes: &[u8],
        indexer: &dyn DocumentIndexer,
    ) -> Result<IndexHandle, RunError> {
        let key = fingerprint_bytes(bytes);

        if let Some(handle) = self
            .load(&key)
            .map_err(|e| RunError::collaborator("index_cache", e))?
        {
            self.record(|s| s.hits += 1);
            info!(key = %&key[..12], "Document index cache hit");
            return Ok(handle);
        }

        self.record(|s| s.misses += 1);
        info!(key = %&key[..12], bytes = bytes.len(), "Document index cache miss, indexing");

        let index = indexer.index_document(bytes).await?;
        self.store(&key, bytes.len() as u64, &index)
            .map_err(|e| RunError::collaborator("index_cache", e))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    struct CountingIndexer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentIndexer for CountingIndexer {
        async fn index_document(&self, bytes: &[u8]) -> Result<Vec<u8>, RunError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(format!("{{\"len\":{}}}", bytes.len()).into_bytes())
        }
    }

    #[tokio::test]
    async fn test_second_resolve_is_a_hit() {
        let temp = TempDir::new().unwrap();
        let cache = IndexCache::new(temp.path().join("cache"));
        let indexer = CountingIndexer {
            calls: AtomicUsize::new(0),
        };

        let first = cache.resolve(b"resume text", &indexer).await.unwrap();
        let second = cache.resolve(b"resume text", &indexer).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(indexer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                writes: 1
            }
        );
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_entry_layout() {
        let temp = TempDir::new().unwrap();
        let cache = IndexCache::new(temp.path());
        let indexer = CountingIndexer {
            calls: AtomicUsize::new(0),
        };
        let handle = cache.resolve(b"abc", &indexer).await.unwrap();

        let dir = temp.path().join(fingerprint_bytes(b"abc"));
        assert_eq!(handle.artifact_path, dir.join(INDEX_FILE));
        let meta: CacheMeta =
            serde_json::from_slice(&fs::read(dir.join(META_FILE)).unwrap()).unwrap();
        assert_eq!(meta.source_bytes, 3);
        assert_eq!(meta.fingerprint, handle.cache_key);

        assert!(staging_leftovers(temp.path()).is_empty());
    }

    fn staging_leftovers(root: &Path) -> Vec<PathBuf> {
        fs::read_dir(root)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
            .map(|e| e.path())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolves_share_one_entry() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(IndexCache::new(temp.path()));
        let indexer = Arc::new(CountingIndexer {
            calls: AtomicUsize::new(0),
        });

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let indexer = Arc::clone(&indexer);
            tasks.spawn(async move {
                cache
                    .resolve(b"same resume", indexer.as_ref())
                    .await
                    .unwrap()
            });
        }

        let mut handles = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            handles.push(joined.unwrap());
        }

        assert_eq!(handles.len(), 8);
        assert!(handles.iter().all(|h| *h == handles[0]));
        assert_eq!(
            fs::read_to_string(&handles[0].artifact_path).unwrap(),
            "{\"len\":11}"
        );
        assert!(temp.path().join(&handles[0].cache_key).join(META_FILE).is_file());
        assert_eq!(cache.stats().writes, 1);
        assert!(staging_leftovers(temp.path()).is_empty());
    }

    #[test]
    fn test_failed_publish_removes_staging() {
        let temp = TempDir::new().unwrap();
        let cache = IndexCache::new(temp.path());
        let key = fingerprint_bytes(b"doc");
        // A stray file where the entry directory belongs makes the rename fail.
        fs::write(temp.path().join(&key), "not a directory").unwrap();

        assert!(matches!(
            cache.store(&key, 3, b"index"),
            Err(CacheError::PublishFailed { .. })
        ));
        assert!(staging_leftovers(temp.path()).is_empty());
        assert_eq!(cache.stats().writes, 0);
    }

    #[test]
    fn test_load_missing_and_invalid_keys() {
        let temp = TempDir::new().unwrap();
        let cache = IndexCache::new(temp.path());
        assert!(cache.load(&fingerprint_bytes(b"nothing")).unwrap().is_none());
        assert!(cache.load("../etc").unwrap().is_none());
    }

    #[test]
    fn test_store_twice_keeps_first_entry() {
        let temp = TempDir::new().unwrap();
        let cache = IndexCache::new(temp.path());
        let key = fingerprint_bytes(b"doc");

        cache.store(&key, 3, b"first").unwrap();
        let handle = cache.store(&key, 3, b"second").unwrap();

        assert_eq!(fs::read(&handle.artifact_path).unwrap(), b"first");
        assert_eq!(cache.stats().writes, 1);
    }

    #[test]
    fn test_directory_without_index_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let cache = IndexCache::new(temp.path());
        let key = fingerprint_bytes(b"doc");
        fs::create_dir_all(temp.path().join(&key)).unwrap();
        assert!(matches!(
            cache.load(&key),
            Err(CacheError::Corrupt { .. })
        ));
    }
}
