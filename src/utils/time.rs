use chrono::{Datelike, Months, NaiveDate, ParseResult};

/// Format used for day keys, both in the database and in the cache file.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a string in unlockcount.
pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

pub fn parse_day_key(key: &str) -> ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT)
}

/// Returns the first and the last day of the month `date` belongs to.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    (first, last)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{day_key, month_bounds, parse_day_key};

    #[test]
    fn test_day_key_is_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(day_key(date), "2024-03-01");
        assert_eq!(parse_day_key("2024-03-01").unwrap(), date);
        assert!(parse_day_key("01/03/2024").is_err());
    }

    #[test]
    fn test_month_bounds_leap_february() {
        let (first, last) = month_bounds(NaiveDate::from_ymd_opt(2024, 2, 17).unwrap());
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_month_bounds_december() {
        let (first, last) = month_bounds(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(first, NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }
}
