//! Caching system for template files, directory listings and compiled templates
//!
//! Every cache in the engine follows the same discipline, implemented once in
//! [`PendingCache`]:
//!
//! 1. The key is the normalized absolute path of the file or directory.
//! 2. On a miss, the pending load is stored under the key *before* it is
//!    awaited, so concurrent callers for the same key share one load and one
//!    result (success or failure).
//! 3. If the load fails, the entry is removed before the error is returned, so
//!    the next call starts from scratch instead of replaying the failure.
//!
//! When a caller disables caching, the load runs directly and the cache is
//! neither consulted nor updated.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::types::Encoding;
use crate::utils::{absolute_path, to_forward_slashes};

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Path-keyed cache of in-flight or resolved loads
pub struct PendingCache<T> {
    entries: DashMap<PathBuf, SharedLoad<T>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<T> PendingCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Return the cached value for `key`, or run `load` and cache its result
    ///
    /// `key` must already be absolute and normalized.
    pub async fn get_or_load<F>(&self, key: PathBuf, enabled: bool, load: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        if !enabled {
            return load.await;
        }

        let pending = match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(path = %key.display(), "cache hit");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(path = %key.display(), "cache miss");
                let pending = load.boxed().shared();
                entry.insert(pending.clone());
                pending
            }
        };

        let result = pending.clone().await;

        if let Err(err) = &result {
            // A retry may already have replaced the failed entry
            let removed = self
                .entries
                .remove_if(&key, |_, current| current.ptr_eq(&pending));
            if removed.is_some() {
                debug!(path = %key.display(), error = %err, "dropped failed cache entry");
            }
        }

        result
    }

    /// Whether an entry (pending or resolved) exists for `key`
    pub fn contains(&self, key: &Path) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses,
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
            entry_count: self.entries.len(),
        }
    }
}

impl<T> Default for PendingCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
    pub entry_count: usize,
}

/// Memoized file reads and directory listings
#[derive(Default)]
pub struct FileCache {
    files: PendingCache<Arc<str>>,
    dirs: PendingCache<Arc<[String]>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a text file
    pub async fn read_file(&self, path: &Path, cache: bool, encoding: Encoding) -> Result<Arc<str>> {
        let key = absolute_path(path)?;
        let target = key.clone();

        self.files
            .get_or_load(key, cache, async move {
                trace!(path = %target.display(), ?encoding, "reading template file");
                let bytes = tokio::fs::read(&target)
                    .await
                    .map_err(|e| Error::io("open", &target, e))?;
                Ok(Arc::from(encoding.decode(bytes)))
            })
            .await
    }

    /// List files under `dir` whose names end with `extname`
    ///
    /// Paths are relative to `dir` and use `/` separators. Within a directory,
    /// files come before subdirectories and are ordered by stem, so
    /// `page.hbs` sorts ahead of `page-2.hbs`. The returned vector is a copy;
    /// the cached listing cannot be changed through it.
    pub async fn list_files(&self, dir: &Path, extname: &str, cache: bool) -> Result<Vec<String>> {
        let key = absolute_path(dir)?;
        let root = key.clone();
        let extname = extname.to_string();

        let listing = self
            .dirs
            .get_or_load(key, cache, async move {
                let walk_root = root.clone();
                tokio::task::spawn_blocking(move || walk_templates(&walk_root, &extname))
                    .await
                    .map_err(|e| Error::io("scandir", &root, io::Error::other(e)))?
            })
            .await?;

        Ok(listing.to_vec())
    }

    pub fn file_stats(&self) -> CacheStats {
        self.files.stats()
    }

    pub fn directory_stats(&self) -> CacheStats {
        self.dirs.stats()
    }

    /// Whether `path` has a cached file or directory entry
    pub fn contains(&self, path: &Path) -> bool {
        absolute_path(path)
            .map(|key| self.files.contains(&key) || self.dirs.contains(&key))
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn walk_templates(root: &Path, extname: &str) -> Result<Arc<[String]>> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.path().file_stem().cmp(&b.path().file_stem()))
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 && err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                debug!(dir = %root.display(), "template directory does not exist");
                return Ok(Arc::from(Vec::new()));
            }
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let source = match err.into_io_error() {
                    Some(io_err) => io_err,
                    None => io::Error::other("file system loop detected"),
                };
                return Err(Error::io("scandir", path, source));
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if !entry.file_name().to_string_lossy().ends_with(extname) {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        files.push(to_forward_slashes(relative));
    }

    trace!(dir = %root.display(), count = files.len(), "listed template files");
    Ok(Arc::from(files))
}

/// Statistics for every cache owned by an engine
#[derive(Debug, Clone, Default)]
pub struct EngineCacheStats {
    pub compiled_templates: CacheStats,
    pub precompiled_templates: CacheStats,
    pub files: CacheStats,
    pub directories: CacheStats,
}

impl EngineCacheStats {
    /// Calculate overall hit rate across all caches
    pub fn overall_hit_rate(&self) -> f64 {
        let all = [
            &self.compiled_templates,
            &self.precompiled_templates,
            &self.files,
            &self.directories,
        ];
        let hits: usize = all.iter().map(|s| s.hits).sum();
        let total: usize = hits + all.iter().map(|s| s.misses).sum::<usize>();

        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    pub fn total_entries(&self) -> usize {
        self.compiled_templates.entry_count
            + self.precompiled_templates.entry_count
            + self.files.entry_count
            + self.directories.entry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_load(
        counter: &Arc<AtomicUsize>,
        result: Result<u32>,
    ) -> impl Future<Output = Result<u32>> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            result
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let cache = PendingCache::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let key = PathBuf::from("/views/a");

        let first = cache
            .get_or_load(key.clone(), true, counting_load(&loads, Ok(1)))
            .await
            .unwrap();
        let second = cache
            .get_or_load(key.clone(), true, counting_load(&loads, Ok(2)))
            .await
            .unwrap();

        assert_eq!((first, second), (1, 1));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_loads_and_never_stores() {
        let cache = PendingCache::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let key = PathBuf::from("/views/a");

        cache
            .get_or_load(key.clone(), true, counting_load(&loads, Ok(1)))
            .await
            .unwrap();
        let fresh = cache
            .get_or_load(key.clone(), false, counting_load(&loads, Ok(2)))
            .await
            .unwrap();

        assert_eq!(fresh, 2);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        // the existing entry is bypassed, not cleared
        let cached = cache
            .get_or_load(key, true, counting_load(&loads, Ok(3)))
            .await
            .unwrap();
        assert_eq!(cached, 1);
    }

    #[tokio::test]
    async fn test_failure_is_rolled_back() {
        let cache: PendingCache<u32> = PendingCache::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let key = PathBuf::from("/views/missing");
        let missing = || {
            Err(Error::io(
                "open",
                "/views/missing",
                io::Error::new(io::ErrorKind::NotFound, "gone"),
            ))
        };

        assert!(cache
            .get_or_load(key.clone(), true, counting_load(&loads, missing()))
            .await
            .is_err());
        assert!(!cache.contains(&key));

        let retried = cache
            .get_or_load(key.clone(), true, counting_load(&loads, Ok(7)))
            .await
            .unwrap();
        assert_eq!(retried, 7);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let cache: PendingCache<u32> = PendingCache::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let key = PathBuf::from("/views/shared");

        let (a, b) = tokio::join!(
            cache.get_or_load(key.clone(), true, counting_load(&loads, Ok(1))),
            cache.get_or_load(key.clone(), true, counting_load(&loads, Ok(2))),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let cache: PendingCache<u32> = PendingCache::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let key = PathBuf::from("/views/broken");
        let broken = Err(Error::configuration_static("broken"));

        let (a, b) = tokio::join!(
            cache.get_or_load(key.clone(), true, counting_load(&loads, broken)),
            cache.get_or_load(key.clone(), true, counting_load(&loads, Ok(2))),
        );

        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let files = FileCache::new();
        let err = files
            .read_file(Path::new("does-not-exist"), true, Encoding::Utf8)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such file or directory"));
        assert!(!files.contains(Path::new("does-not-exist")));
    }

    #[tokio::test]
    async fn test_listing_is_a_copy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.hbs"), "a").unwrap();
        let files = FileCache::new();

        let mut first = files.list_files(dir.path(), ".hbs", true).await.unwrap();
        first.push("injected.hbs".to_string());

        let second = files.list_files(dir.path(), ".hbs", true).await.unwrap();
        assert_eq!(second, vec!["a.hbs".to_string()]);
        assert_eq!(files.directory_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_listing_skips_hidden_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("b.hbs"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join(".hidden.hbs"), "h").unwrap();
        std::fs::write(dir.path().join(".git/c.hbs"), "c").unwrap();
        std::fs::write(dir.path().join("nested/d.hbs"), "d").unwrap();

        let files = FileCache::new();
        let listing = files.list_files(dir.path(), ".hbs", false).await.unwrap();
        assert_eq!(listing, vec!["b.hbs".to_string(), "nested/d.hbs".to_string()]);
    }

    #[tokio::test]
    async fn test_listing_orders_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-2.hbs"), "2").unwrap();
        std::fs::write(dir.path().join("page.hbs"), "1").unwrap();

        let files = FileCache::new();
        let listing = files.list_files(dir.path(), ".hbs", false).await.unwrap();
        assert_eq!(listing, vec!["page.hbs".to_string(), "page-2.hbs".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let files = FileCache::new();
        let listing = files
            .list_files(Path::new("does-not-exist"), ".hbs", true)
            .await
            .unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn test_engine_cache_stats() {
        let stats = EngineCacheStats {
            compiled_templates: CacheStats {
                hits: 10,
                misses: 5,
                hit_rate: 0.67,
                entry_count: 8,
            },
            files: CacheStats {
                hits: 20,
                misses: 10,
                hit_rate: 0.67,
                entry_count: 15,
            },
            ..Default::default()
        };

        assert_eq!(stats.total_entries(), 23);
        assert!((stats.overall_hit_rate() - 0.67).abs() < 0.01);
    }
}
