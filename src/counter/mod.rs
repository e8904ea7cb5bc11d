//! Orchestration of the unlock counter. [UnlockCounter] is the handle the rest of the
//! application works with: triggers call [UnlockCounter::record_unlock], display surfaces call
//! [UnlockCounter::get_count] or subscribe to the cache.

use chrono::NaiveDate;
use tracing::{debug, error, instrument};

use crate::{
    storage::{
        counter_store::CounterStore, entities::DayCounter, error::CounterError,
        fast_cache::FastCache,
    },
    utils::{clock::Clock, time::month_bounds},
};

pub struct UnlockCounter<S: CounterStore> {
    store: S,
    cache: FastCache,
    clock: Box<dyn Clock>,
}

impl<S: CounterStore> UnlockCounter<S> {
    pub fn new(store: S, cache: FastCache, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    pub fn cache(&self) -> &FastCache {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Records a single unlock for `day` and returns the new count.
    ///
    /// The store commits first and only then the cache is updated, so the cache can never be
    /// ahead of the store. Every call counts, repeated deliveries of the same unlock included.
    #[instrument(skip(self))]
    pub async fn record_unlock(&self, day: NaiveDate) -> Result<u32, CounterError> {
        let count = self
            .store
            .upsert_increment(day)
            .await
            .inspect_err(|e| error!("Unlock for {day} was not recorded: {e}"))?;
        self.cache.set(day, count).await;
        Ok(count)
    }

    /// [Self::record_unlock] for the current local day.
    pub async fn record_unlock_now(&self) -> Result<u32, CounterError> {
        self.record_unlock(self.today()).await
    }

    /// Count for `day`, zero if nothing was recorded. Today's count is served from the cache when
    /// possible.
    #[instrument(skip(self))]
    pub async fn get_count(&self, day: NaiveDate) -> Result<u32, CounterError> {
        if day == self.today() {
            if let Some(count) = self.cache.get(day) {
                return Ok(count);
            }
            debug!("Cache miss for {day}");
        }
        Ok(self
            .store
            .get_by_day(day)
            .await?
            .map_or(0, |counter| counter.count))
    }

    /// Days with at least one unlock in the month containing `day`.
    pub async fn month_counts(&self, day: NaiveDate) -> Result<Vec<DayCounter>, CounterError> {
        let (first, last) = month_bounds(day);
        self.store.counts_between(first, last).await
    }

    /// Re-derives the cached entry for `day` from the store. A persisted cache that is ahead of
    /// the store is brought back in line.
    pub async fn warm_cache(&self, day: NaiveDate) -> Result<Option<u32>, CounterError> {
        let count = self.store.get_by_day(day).await?.map(|counter| counter.count);
        match count {
            Some(count) => self.cache.replace(day, count).await,
            None => self.cache.remove(day).await,
        }
        Ok(count)
    }
}
