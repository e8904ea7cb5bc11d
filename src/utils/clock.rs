use chrono::{DateTime, Local, NaiveDate, Utc};

/// Represents an entity responsible for providing dates across application. This can allow it to
/// be used for testing
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    /// Calendar day the user currently sees on their device. Unlocks are attributed to this day.
    fn today(&self) -> NaiveDate {
        self.time().with_timezone(&Local).date_naive()
    }
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single moment. `today` is pinned explicitly so tests don't depend on the
/// timezone of the machine running them.
#[cfg(test)]
#[derive(Clone)]
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub day: NaiveDate,
}

#[cfg(test)]
impl FixedClock {
    pub fn on(day: NaiveDate) -> Self {
        Self {
            now: day.and_time(chrono::NaiveTime::MIN).and_utc(),
            day,
        }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn time(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.day
    }
}
