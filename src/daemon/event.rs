use chrono::{DateTime, NaiveDate, Utc};

/// A single delivered unlock trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockEvent {
    /// Local calendar day at the moment the trigger fired. The unlock is attributed to this day
    /// even if it is processed after midnight.
    pub day: NaiveDate,
    pub moment: DateTime<Utc>,
}
