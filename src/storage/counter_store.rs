use std::{
    future::Future,
    ops::Deref,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::utils::time::{day_key, parse_day_key};

use super::{
    entities::DayCounter,
    error::{CounterError, StorageFault},
};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS day_counters (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  day TEXT NOT NULL UNIQUE CHECK (length(day) = 10),
  count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0)
);
";

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Interface for the authoritative per-day unlock counter.
pub trait CounterStore {
    /// Returns the counter for `day`, or `None` if nothing was recorded for it.
    fn get_by_day(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayCounter>, CounterError>> + Send;

    /// Adds one unlock to `day`, creating the row on the first unlock of the day. Returns the
    /// count after the increment. Concurrent calls for the same day never lose an increment.
    fn upsert_increment(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<u32, CounterError>> + Send;

    /// All counters with `from <= day <= to`, ordered by day.
    fn counts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DayCounter>, CounterError>> + Send;
}

impl<T: Deref> CounterStore for T
where
    T::Target: CounterStore,
{
    fn get_by_day(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayCounter>, CounterError>> + Send {
        self.deref().get_by_day(day)
    }

    fn upsert_increment(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<u32, CounterError>> + Send {
        self.deref().upsert_increment(day)
    }

    fn counts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DayCounter>, CounterError>> + Send {
        self.deref().counts_between(from, to)
    }
}

/// The main realization of [CounterStore]. Every call runs on the blocking pool; the connection
/// itself is shared behind a mutex, and cross-process writers are serialized by SQLite.
#[derive(Clone)]
pub struct SqliteCounterStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCounterStore {
    pub fn open(path: &Path) -> Result<Self, CounterError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;
        info!("Opened counter database at {path:?}");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection on the blocking pool.
    async fn with_conn<F, R>(&self, f: F) -> Result<R, CounterError>
    where
        F: FnOnce(&mut Connection) -> Result<R, CounterError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            // A panic while holding the lock doesn't leave the connection in a broken state.
            let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut guard)
        })
        .await?
    }
}

impl CounterStore for SqliteCounterStore {
    async fn get_by_day(&self, day: NaiveDate) -> Result<Option<DayCounter>, CounterError> {
        self.with_conn(move |conn| {
            let row = conn
                .prepare_cached("SELECT id, day, count FROM day_counters WHERE day = ?1")?
                .query_row(params![day_key(day)], read_row)
                .optional()?;
            row.map(into_counter).transpose()
        })
        .await
    }

    async fn upsert_increment(&self, day: NaiveDate) -> Result<u32, CounterError> {
        let count = self
            .with_conn(move |conn| {
                // IMMEDIATE takes the write lock up front, so the busy timeout applies instead of
                // failing on a stale read snapshot.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let count: i64 = tx
                    .prepare_cached(
                        "INSERT INTO day_counters (day, count) VALUES (?1, 1)
                         ON CONFLICT(day) DO UPDATE SET count = count + 1
                         RETURNING count",
                    )?
                    .query_row(params![day_key(day)], |row| row.get(0))?;
                tx.commit()?;
                to_count(count)
            })
            .await?;
        debug!("Counter for {day} is now {count}");
        Ok(count)
    }

    async fn counts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayCounter>, CounterError> {
        self.with_conn(move |conn| {
            let mut statement = conn.prepare_cached(
                "SELECT id, day, count FROM day_counters
                 WHERE day BETWEEN ?1 AND ?2
                 ORDER BY day",
            )?;
            let rows = statement
                .query_map(params![day_key(from), day_key(to)], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_counter).collect()
        })
        .await
    }
}

type RawRow = (i64, String, i64);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_counter((id, day, count): RawRow) -> Result<DayCounter, CounterError> {
    let day = parse_day_key(&day).map_err(|e| {
        CounterError::StorageUnavailable(StorageFault::Corrupt(format!(
            "day {day:?} of row {id}: {e}"
        )))
    })?;
    Ok(DayCounter {
        id,
        day,
        count: to_count(count)?,
    })
}

fn to_count(count: i64) -> Result<u32, CounterError> {
    u32::try_from(count).map_err(|_| {
        CounterError::StorageUnavailable(StorageFault::Corrupt(format!(
            "count {count} is out of range"
        )))
    })
}
