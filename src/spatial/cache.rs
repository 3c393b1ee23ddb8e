//! Persistence of built spatial indexes
//!
//! A built [`KdTree`] is stored under the [`Fingerprint`] of the composition
//! it indexes. Backends:
//!
//! - [`DiskCacheBackend`]: one JSON artifact per key in a cache directory
//! - [`MemoryCacheBackend`]: process-local map
//! - [`NoOpCacheBackend`]: never stores anything
//!
//! A stale, corrupt or mismatched artifact is never fatal; the index is
//! rebuilt and the artifact replaced.
//!
//! # File Layout
//!
//! ```text
//! {cache_dir}/{fingerprint}.kdtree.json
//! ```

use super::fingerprint::Fingerprint;
use super::kdtree::KdTree;
use crate::config::ExtractConfig;
use crate::errors::{ExtractError, Result};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const ARTIFACT_SUFFIX: &str = ".kdtree.json";

/// Distinguishes temp files of concurrent writers within one process
static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Storage for serialized spatial indexes keyed by fingerprint
pub trait CacheBackend: Send + Sync {
    /// Stored tree for a key, `None` on a miss
    fn load(&self, key: &Fingerprint) -> Result<Option<KdTree>>;

    /// Store a tree, replacing any previous artifact for the key
    fn store(&self, key: &Fingerprint, tree: &KdTree) -> Result<()>;

    /// True when an artifact exists for the key
    fn contains(&self, key: &Fingerprint) -> bool;

    /// Remove every artifact, returning how many were removed
    fn clear(&self) -> Result<usize>;

    /// Where artifacts live, if anywhere on disk
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// One JSON artifact per fingerprint in a directory
#[derive(Debug, Clone)]
pub struct DiskCacheBackend {
    directory: PathBuf,
}

impl DiskCacheBackend {
    /// Create the backend, creating the directory if needed
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| ExtractError::Cache {
            path: Some(directory.clone()),
            message: format!("cannot create cache directory: {}", e),
        })?;
        Ok(Self { directory })
    }

    /// Artifact path for a key
    pub fn artifact_path(&self, key: &Fingerprint) -> PathBuf {
        self.directory.join(format!("{}{}", key, ARTIFACT_SUFFIX))
    }

    /// Temp path unique to this process and write
    fn temp_path(&self, key: &Fingerprint) -> PathBuf {
        let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        self.directory
            .join(format!("{}.{}.{}.tmp", key, std::process::id(), sequence))
    }
}

impl CacheBackend for DiskCacheBackend {
    fn load(&self, key: &Fingerprint) -> Result<Option<KdTree>> {
        let path = self.artifact_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tree: KdTree = serde_json::from_slice(&bytes).map_err(|e| ExtractError::Cache {
            path: Some(path.clone()),
            message: format!("corrupt index artifact: {}", e),
        })?;
        if !tree.is_consistent() {
            return Err(ExtractError::Cache {
                path: Some(path),
                message: "index artifact is structurally inconsistent".to_string(),
            });
        }
        Ok(Some(tree))
    }

    fn store(&self, key: &Fingerprint, tree: &KdTree) -> Result<()> {
        let path = self.artifact_path(key);
        // Write atomically via temp file
        let temp_path = self.temp_path(key);
        fs::write(&temp_path, serde_json::to_vec(tree)?)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        tracing::debug!(path = %path.display(), sites = tree.len(), "Stored spatial index");
        Ok(())
    }

    fn contains(&self, key: &Fingerprint) -> bool {
        self.artifact_path(key).is_file()
    }

    fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX));
            if is_artifact {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        tracing::info!(directory = %self.directory.display(), removed, "Cleared spatial index cache");
        Ok(removed)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.directory)
    }
}

/// Process-local index cache
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    trees: Mutex<HashMap<Fingerprint, KdTree>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Fingerprint, KdTree>>> {
        self.trees.lock().map_err(|_| ExtractError::Cache {
            path: None,
            message: "memory cache lock poisoned".to_string(),
        })
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn load(&self, key: &Fingerprint) -> Result<Option<KdTree>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn store(&self, key: &Fingerprint, tree: &KdTree) -> Result<()> {
        self.lock()?.insert(key.clone(), tree.clone());
        Ok(())
    }

    fn contains(&self, key: &Fingerprint) -> bool {
        self.lock().map(|m| m.contains_key(key)).unwrap_or(false)
    }

    fn clear(&self) -> Result<usize> {
        let mut trees = self.lock()?;
        let removed = trees.len();
        trees.clear();
        Ok(removed)
    }
}

/// Cache that never holds anything; every lookup rebuilds
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCacheBackend;

impl CacheBackend for NoOpCacheBackend {
    fn load(&self, _key: &Fingerprint) -> Result<Option<KdTree>> {
        Ok(None)
    }

    fn store(&self, _key: &Fingerprint, _tree: &KdTree) -> Result<()> {
        Ok(())
    }

    fn contains(&self, _key: &Fingerprint) -> bool {
        false
    }

    fn clear(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Index cache front end: load or build, then persist
pub struct IndexCache {
    backend: Box<dyn CacheBackend>,
}

impl std::fmt::Debug for IndexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCache")
            .field("location", &self.backend.location())
            .finish()
    }
}

impl IndexCache {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Disk-backed cache in `directory`
    pub fn disk(directory: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(Box::new(DiskCacheBackend::new(directory)?)))
    }

    /// Cache described by the configuration.
    ///
    /// Falls back to an in-memory cache when the directory cannot be created.
    pub fn from_config(config: &ExtractConfig) -> Self {
        if !config.use_index_cache {
            return Self::new(Box::new(NoOpCacheBackend));
        }
        let directory = config.resolved_cache_dir();
        match DiskCacheBackend::new(&directory) {
            Ok(backend) => Self::new(Box::new(backend)),
            Err(e) => {
                tracing::warn!(error = %e, "Spatial index cache unavailable, using memory cache");
                Self::new(Box::new(MemoryCacheBackend::new()))
            }
        }
    }

    /// Cache location on disk, if any
    pub fn location(&self) -> Option<&Path> {
        self.backend.location()
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.backend.contains(key)
    }

    pub fn load(&self, key: &Fingerprint) -> Result<Option<KdTree>> {
        self.backend.load(key)
    }

    pub fn store(&self, key: &Fingerprint, tree: &KdTree) -> Result<()> {
        self.backend.store(key, tree)
    }

    /// Cached tree for `key`, or a tree built from `points` and then stored.
    ///
    /// An artifact that fails to load or indexes a different number of sites
    /// is discarded with a warning. Failing to store is logged, not returned.
    pub fn get_or_build(&self, key: &Fingerprint, points: &[[f64; 2]]) -> KdTree {
        match self.backend.load(key) {
            Ok(Some(tree)) if tree.len() == points.len() => {
                tracing::debug!(key = %key, sites = tree.len(), "Spatial index cache hit");
                return tree;
            }
            Ok(Some(tree)) => {
                tracing::warn!(
                    key = %key,
                    cached = tree.len(),
                    expected = points.len(),
                    "Cached spatial index has wrong site count, rebuilding"
                );
            }
            Ok(None) => tracing::debug!(key = %key, "Spatial index cache miss"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Discarding unreadable spatial index"),
        }

        let tree = KdTree::build(points.to_vec());
        if let Err(e) = self.backend.store(key, &tree) {
            tracing::warn!(key = %key, error = %e, "Failed to persist spatial index");
        }
        tree
    }

    /// Remove every cached artifact
    pub fn clear(&self) -> Result<usize> {
        self.backend.clear()
    }
}
