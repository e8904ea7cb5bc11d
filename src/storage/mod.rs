//!  Storage is split in two parts:
//!   - [counter_store::SqliteCounterStore] is the authoritative per-day counter. It lives in a
//!     SQLite database and survives process death.
//!   - [fast_cache::FastCache] mirrors the latest known counts so that display surfaces don't
//!     have to query the database on every refresh. It can always be rebuilt from the store.

pub mod counter_store;
pub mod entities;
pub mod error;
pub mod fast_cache;
