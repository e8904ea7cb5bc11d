use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of unlocks recorded for a single calendar day. Rows only exist for days with at least one
/// unlock, a missing row means zero.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct DayCounter {
    #[serde(skip)]
    pub(crate) id: i64,
    pub day: NaiveDate,
    pub count: u32,
}

/// Last known count for a day, as published to cache subscribers.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheEntry {
    pub day: NaiveDate,
    pub count: u32,
}
