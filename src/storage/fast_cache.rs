use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::{
    fs::operations::{read_locked, write_locked},
    utils::time::{day_key, parse_day_key},
};

use super::{entities::CacheEntry, error::CacheError};

/// Number of most recent days kept in the cache. Older days are served by the store.
pub const MAX_CACHED_DAYS: usize = 31;

/// On-disk layout of the cache file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: BTreeMap<String, u32>,
}

/// Low latency mirror of the latest unlock counts. The cache is never authoritative: a missing
/// entry means "ask the store", not zero.
///
/// Counts kept here can be persisted into a small JSON file so that a freshly started process
/// can render the current count before touching the database. Persistence is best effort.
pub struct FastCache {
    entries: RwLock<BTreeMap<NaiveDate, u32>>,
    updates: watch::Sender<Option<CacheEntry>>,
    file: Option<PathBuf>,
    // Keeps file writes in the same order as memory updates.
    write_lock: Mutex<()>,
}

impl FastCache {
    pub fn in_memory() -> Self {
        Self::with_entries(BTreeMap::new(), None)
    }

    /// Loads the cache from `path`. A missing or unreadable file results in an empty cache.
    pub async fn open(path: PathBuf) -> Self {
        let entries = match load_entries(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable cache file {path:?}: {e:?}");
                BTreeMap::new()
            }
        };
        debug!("Loaded {} cached days from {path:?}", entries.len());
        Self::with_entries(entries, Some(path))
    }

    fn with_entries(entries: BTreeMap<NaiveDate, u32>, file: Option<PathBuf>) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            entries: RwLock::new(entries),
            updates,
            file,
            write_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, day: NaiveDate) -> Option<u32> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&day)
            .copied()
    }

    /// Stores `count` for `day`. Counts only grow during a day, so a lower count than the cached
    /// one is a late write from a concurrent increment and is dropped.
    pub async fn set(&self, day: NaiveDate, count: u32) {
        self.write(day, count, false).await
    }

    /// Stores `count` for `day` even if the cached count is higher. The persisted file may have
    /// outlived commits the store lost, so counts re-derived from the store go through here.
    pub async fn replace(&self, day: NaiveDate, count: u32) {
        self.write(day, count, true).await
    }

    /// Forgets the entry for `day`. Subscribers see a zero count for it.
    pub async fn remove(&self, day: NaiveDate) {
        let _write = self.write_lock.lock().await;

        let snapshot = {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if entries.remove(&day).is_none() {
                return;
            }
            entries.clone()
        };

        self.publish(CacheEntry { day, count: 0 }, &snapshot).await;
    }

    async fn write(&self, day: NaiveDate, count: u32, overwrite: bool) {
        let _write = self.write_lock.lock().await;

        let snapshot = {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match entries.get(&day).copied() {
                Some(cached) if cached == count => return,
                Some(cached) if cached > count && !overwrite => {
                    debug!("Cache already holds {cached} for {day}, skipping {count}");
                    return;
                }
                _ => (),
            }
            entries.insert(day, count);
            while entries.len() > MAX_CACHED_DAYS {
                entries.pop_first();
            }
            if !entries.contains_key(&day) {
                debug!("{day} is older than every cached day, not caching it");
                return;
            }
            entries.clone()
        };

        self.publish(CacheEntry { day, count }, &snapshot).await;
    }

    async fn publish(&self, entry: CacheEntry, snapshot: &BTreeMap<NaiveDate, u32>) {
        self.updates.send_replace(Some(entry));

        if let Some(path) = &self.file {
            if let Err(e) = persist(path, snapshot).await {
                warn!("Cache for {} was not persisted: {e}", entry.day);
            }
        }
    }

    /// Receiver that always holds the most recently changed entry.
    pub fn subscribe(&self) -> watch::Receiver<Option<CacheEntry>> {
        self.updates.subscribe()
    }

    /// Stream of changed entries. The first item is the latest entry at the moment of the call.
    pub fn updates(&self) -> WatchStream<Option<CacheEntry>> {
        WatchStream::new(self.subscribe())
    }
}

async fn load_entries(path: &Path) -> anyhow::Result<BTreeMap<NaiveDate, u32>> {
    let Some(contents) = read_locked(path).await? else {
        return Ok(BTreeMap::new());
    };
    let file: CacheFile = serde_json::from_slice(&contents)?;

    let mut entries = BTreeMap::new();
    for (key, count) in file.entries {
        match parse_day_key(&key) {
            Ok(day) => {
                entries.insert(day, count);
            }
            Err(e) => warn!("Dropping cache entry with illegal day {key:?}: {e}"),
        }
    }
    while entries.len() > MAX_CACHED_DAYS {
        entries.pop_first();
    }
    Ok(entries)
}

async fn persist(path: &Path, entries: &BTreeMap<NaiveDate, u32>) -> Result<(), CacheError> {
    let file = CacheFile {
        entries: entries
            .iter()
            .map(|(day, count)| (day_key(*day), *count))
            .collect(),
    };
    let contents = serde_json::to_vec(&file)?;
    write_locked(path, &contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate};
    use futures::{future::join_all, StreamExt};
    use tempfile::tempdir;

    use crate::storage::entities::CacheEntry;

    use super::{FastCache, MAX_CACHED_DAYS};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_get_absent_until_set() {
        let cache = FastCache::in_memory();
        assert_eq!(cache.get(day(1)), None);

        cache.set(day(1), 4).await;
        assert_eq!(cache.get(day(1)), Some(4));
        assert_eq!(cache.get(day(2)), None);
    }

    #[tokio::test]
    async fn test_set_never_regresses() {
        let cache = FastCache::in_memory();
        cache.set(day(1), 5).await;
        cache.set(day(1), 3).await;
        assert_eq!(cache.get(day(1)), Some(5));

        cache.set(day(1), 6).await;
        assert_eq!(cache.get(day(1)), Some(6));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_out_of_order_sets_keep_highest() {
        let cache = Arc::new(FastCache::in_memory());
        let tasks = (1..=20).rev().map(|count| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.set(day(1), count).await })
        });
        for result in join_all(tasks).await {
            result.unwrap();
        }
        assert_eq!(cache.get(day(1)), Some(20));
    }

    #[tokio::test]
    async fn test_persisted_entries_survive_restart() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        {
            let cache = FastCache::open(path.clone()).await;
            cache.set(day(1), 7).await;
            cache.set(day(2), 2).await;
        }

        let reopened = FastCache::open(path).await;
        assert_eq!(reopened.get(day(1)), Some(7));
        assert_eq!(reopened.get(day(2)), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_file_is_ignored() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{\"entries\": {\"2024-03-01\": ")?;

        let cache = FastCache::open(path).await;
        assert_eq!(cache.get(day(1)), None);

        cache.set(day(1), 1).await;
        assert_eq!(cache.get(day(1)), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_illegal_day_keys_are_dropped() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"entries": {"2024-03-01": 3, "yesterday": 9}}"#,
        )?;

        let cache = FastCache::open(path).await;
        assert_eq!(cache.get(day(1)), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_value() -> Result<()> {
        let dir = tempdir()?;
        // A directory can't be opened as a cache file.
        let cache = FastCache::open(dir.path().to_path_buf()).await;

        cache.set(day(1), 2).await;
        assert_eq!(cache.get(day(1)), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_old_days_are_evicted() {
        let cache = FastCache::in_memory();
        let first = day(1);
        for offset in 0..(MAX_CACHED_DAYS as i64 + 2) {
            cache.set(first + Duration::days(offset), 1).await;
        }

        assert_eq!(cache.get(first), None);
        assert_eq!(cache.get(first + Duration::days(1)), None);
        assert_eq!(cache.get(first + Duration::days(2)), Some(1));
    }

    #[tokio::test]
    async fn test_replace_overrides_higher_count() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        let cache = FastCache::open(path.clone()).await;
        cache.set(day(1), 9).await;

        cache.replace(day(1), 7).await;
        assert_eq!(cache.get(day(1)), Some(7));
        assert_eq!(FastCache::open(path).await.get(day(1)), Some(7));

        // Later increments continue from the replaced count.
        cache.set(day(1), 8).await;
        assert_eq!(cache.get(day(1)), Some(8));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_forgets_day() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        let cache = FastCache::open(path.clone()).await;
        cache.set(day(1), 3).await;
        let mut receiver = cache.subscribe();

        cache.remove(day(1)).await;
        assert_eq!(cache.get(day(1)), None);
        assert_eq!(FastCache::open(path).await.get(day(1)), None);
        assert_eq!(
            *receiver.borrow_and_update(),
            Some(CacheEntry {
                day: day(1),
                count: 0
            })
        );

        cache.remove(day(1)).await;
        assert!(!receiver.has_changed().unwrap());
        Ok(())
    }

    #[tokio::test]
    async fn test_day_older_than_cached_range_is_not_published() {
        let cache = FastCache::in_memory();
        let first = day(1);
        for offset in 1..=(MAX_CACHED_DAYS as i64) {
            cache.set(first + Duration::days(offset), 1).await;
        }
        let mut receiver = cache.subscribe();
        receiver.borrow_and_update();

        cache.set(first, 5).await;
        assert_eq!(cache.get(first), None);
        assert!(!receiver.has_changed().unwrap());
        assert_eq!(cache.get(first + Duration::days(1)), Some(1));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let cache = FastCache::in_memory();
        let mut receiver = cache.subscribe();
        assert_eq!(*receiver.borrow(), None);

        cache.set(day(1), 1).await;
        receiver.changed().await.unwrap();
        assert_eq!(
            *receiver.borrow_and_update(),
            Some(CacheEntry {
                day: day(1),
                count: 1
            })
        );

        // Unchanged values are not published.
        cache.set(day(1), 1).await;
        assert!(!receiver.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_update_stream_yields_latest() {
        let cache = FastCache::in_memory();
        let mut updates = cache.updates();
        assert_eq!(updates.next().await, Some(None));

        cache.set(day(1), 1).await;
        cache.set(day(1), 2).await;
        assert_eq!(
            updates.next().await,
            Some(Some(CacheEntry {
                day: day(1),
                count: 2
            }))
        );
    }
}
