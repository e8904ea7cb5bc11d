//! Counts screen unlocks per calendar day.
//!
//! The authoritative count for every day lives in a SQLite database
//! ([storage::counter_store]), a small cache ([storage::fast_cache]) mirrors the latest counts for
//! display surfaces, and [counter::UnlockCounter] keeps both in step. The [daemon] hosts all of it
//! and turns unlock triggers into increments.
//!

pub mod counter;
pub mod daemon;
pub mod fs;
pub mod storage;
pub mod utils;
