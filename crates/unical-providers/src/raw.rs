//! Raw entities as they come off the wire, before normalization.
//!
//! Each adapter parses its own wire format into these types. The shared
//! [`normalize`](crate::normalize) pipeline then turns them into
//! [`CalendarEvent`](unical_core::CalendarEvent) and
//! [`Task`](unical_core::Task).

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

/// A provider timestamp: either an instant or a bare date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventTime {
    DateTime(DateTime<Utc>),
    /// Date without time of day; marks all-day entries.
    Date(NaiveDate),
}

impl RawEventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Parses an RFC 3339 timestamp or, failing that, a `YYYY-MM-DD` date.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(Self::DateTime(dt.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(Self::Date)
    }
}

/// Priority in the provider's own scale.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NativePriority {
    /// The provider has no priority concept.
    #[default]
    Unspecified,
    /// iCalendar `PRIORITY`, 0 (undefined) and 1 (highest) to 9 (lowest).
    ICalendar(u8),
    /// Microsoft Graph `importance`: `low`, `normal` or `high`.
    Importance(String),
}

/// An event before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<RawEventTime>,
    pub end: Option<RawEventTime>,
    /// Provider-native recurrence, kept verbatim.
    pub recurrence: Option<String>,
    pub attendees: Vec<String>,
    pub owner_id: Option<String>,
    pub color: Option<String>,
}

impl RawEvent {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_times(mut self, start: RawEventTime, end: RawEventTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

/// A task before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTask {
    pub id: String,
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<RawEventTime>,
    pub completed: bool,
    pub priority: NativePriority,
    pub tags: BTreeSet<String>,
    pub owner_id: Option<String>,
}

impl RawTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}
