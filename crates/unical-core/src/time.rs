//! Date ranges used for fetch windows and filtering.
//!
//! Callers work in whole dates; adapters expand a [`DateRange`] to UTC
//! instants with [`DateRange::to_utc_bounds`] before talking to a provider.

use chrono::{DateTime, Local, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A closed interval of calendar dates `[start, end]`.
///
/// Deserialization enforces `start <= end` like [`DateRange::try_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedRange")]
pub struct DateRange {
    /// First day of the range (inclusive).
    pub start: NaiveDate,
    /// Last day of the range (inclusive).
    pub end: NaiveDate,
}

#[derive(Deserialize)]
struct UncheckedRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<UncheckedRange> for DateRange {
    type Error = String;

    fn try_from(raw: UncheckedRange) -> Result<Self, Self::Error> {
        Self::try_new(raw.start, raw.end)
            .ok_or_else(|| format!("range start {} is after end {}", raw.start, raw.end))
    }
}

impl DateRange {
    /// Creates a new date range.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        assert!(start <= end, "DateRange start must be <= end");
        Self { start, end }
    }

    /// Creates a date range, returning `None` if `start` is after `end`.
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The sync fetch window: `[today - months_back, today + months_ahead]`.
    ///
    /// Month arithmetic clamps to the last valid day, so 31 March minus one
    /// month is 28/29 February.
    pub fn fetch_window(today: NaiveDate, months_back: u32, months_ahead: u32) -> Self {
        let start = today
            .checked_sub_months(Months::new(months_back))
            .unwrap_or(NaiveDate::MIN);
        let end = today
            .checked_add_months(Months::new(months_ahead))
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    /// Returns true if `date` lies inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Returns true if the span `[start, end]` intersects this range.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }

    /// Number of days covered, counting both ends.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Expands the range to UTC instants using full-day boundaries in `tz`.
    ///
    /// Returns the half-open interval `[start of first day, start of the day
    /// after the last day)`.
    pub fn to_utc_bounds<Tz: TimeZone>(&self, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = start_of_day(self.start, tz);
        let end = match self.end.succ_opt() {
            Some(next) => start_of_day(next, tz),
            None => DateTime::<Utc>::MAX_UTC,
        };
        (start, end)
    }

    /// Same as [`to_utc_bounds`](Self::to_utc_bounds) in the local timezone.
    pub fn to_local_utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        self.to_utc_bounds(&Local)
    }
}

/// Midnight UTC at the start of `date`.
pub fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// The first instant of `date` in `tz`, converted to UTC.
///
/// Falls back to UTC midnight when local midnight does not exist.
fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| utc_midnight(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn try_new_rejects_reversed() {
        assert!(DateRange::try_new(date(2024, 6, 2), date(2024, 6, 1)).is_none());
        assert!(DateRange::try_new(date(2024, 6, 1), date(2024, 6, 1)).is_some());
    }

    #[test]
    fn deserialize_rejects_reversed() {
        let range: DateRange =
            serde_json::from_str(r#"{"start": "2024-06-01", "end": "2024-06-30"}"#).unwrap();
        assert_eq!(range.end, date(2024, 6, 30));

        let err = serde_json::from_str::<DateRange>(r#"{"start": "2024-06-02", "end": "2024-06-01"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("is after end"));
    }

    #[test]
    #[should_panic(expected = "DateRange start must be <= end")]
    fn new_panics_on_reversed() {
        DateRange::new(date(2024, 6, 2), date(2024, 6, 1));
    }

    #[test]
    fn fetch_window_spans_one_month_each_side() {
        let window = DateRange::fetch_window(date(2024, 6, 15), 1, 1);
        assert_eq!(window.start, date(2024, 5, 15));
        assert_eq!(window.end, date(2024, 7, 15));
    }

    #[test]
    fn fetch_window_clamps_month_end() {
        let window = DateRange::fetch_window(date(2024, 3, 31), 1, 1);
        assert_eq!(window.start, date(2024, 2, 29));
        assert_eq!(window.end, date(2024, 4, 30));
    }

    #[test]
    fn contains_is_inclusive() {
        let range = DateRange::new(date(2024, 6, 1), date(2024, 6, 30));
        assert!(range.contains(date(2024, 6, 1)));
        assert!(range.contains(date(2024, 6, 30)));
        assert!(!range.contains(date(2024, 7, 1)));
    }

    #[test]
    fn overlap_rules() {
        let range = DateRange::new(date(2024, 6, 10), date(2024, 6, 20));
        assert!(range.overlaps(date(2024, 6, 1), date(2024, 6, 10)));
        assert!(range.overlaps(date(2024, 6, 20), date(2024, 6, 25)));
        assert!(range.overlaps(date(2024, 6, 1), date(2024, 6, 30)));
        assert!(!range.overlaps(date(2024, 6, 21), date(2024, 6, 22)));
        assert!(!range.overlaps(date(2024, 6, 1), date(2024, 6, 9)));
    }

    #[test]
    fn utc_bounds_cover_full_days() {
        let range = DateRange::new(date(2024, 6, 1), date(2024, 6, 2));
        let (start, end) = range.to_utc_bounds(&Utc);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap());
        assert_eq!(range.num_days(), 2);
    }

    #[test]
    fn utc_bounds_respect_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let range = DateRange::single_day(date(2024, 6, 1));
        let (start, end) = range.to_utc_bounds(&tz);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 31, 22, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 1, 22, 0, 0).unwrap());
    }
}
