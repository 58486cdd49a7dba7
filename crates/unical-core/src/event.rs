//! The unified calendar event.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{EntityKey, Provider};
use crate::text::Keyword;
use crate::time::DateRange;

/// A calendar event normalized from any provider.
///
/// Timestamps are stored in UTC. All-day events start and end at UTC
/// midnight and carry `is_all_day = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Identifier assigned by the provider.
    pub id: String,
    /// The event title/summary.
    pub title: String,
    /// Free-form description, possibly empty.
    pub description: String,
    /// Free-form location, possibly empty.
    pub location: String,
    /// When the event starts. Required for a valid event.
    pub start: Option<DateTime<Utc>>,
    /// When the event ends. Missing means "same as start".
    pub end: Option<DateTime<Utc>>,
    /// Whether this is a date-only event.
    pub is_all_day: bool,
    /// Provider-native recurrence encoding, kept verbatim.
    pub recurrence_rule: Option<String>,
    /// Attendee identifiers (usually email addresses), in provider order.
    pub attendees: Vec<String>,
    /// Owner of the calendar the event belongs to.
    pub owner_id: String,
    /// Display color, as the provider reports it.
    pub color: Option<String>,
    /// Where the event came from.
    pub provider: Provider,
}

impl CalendarEvent {
    /// Creates an event with the identity fields set and everything else empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            location: String::new(),
            start: None,
            end: None,
            is_all_day: false,
            recurrence_rule: None,
            attendees: Vec::new(),
            owner_id: String::new(),
            color: None,
            provider,
        }
    }

    /// Returns the identity key `(id, provider)`.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.id.clone(), self.provider)
    }

    /// An event is valid iff id and title are non-empty and start is present.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.title.is_empty() && self.start.is_some()
    }

    /// The dates covered by this event, or `None` when start is missing.
    ///
    /// All-day events store an exclusive end at midnight of the following
    /// day, so the last covered date is the day before.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start?;
        let mut end = self.end.unwrap_or(start).max(start);
        if self.is_all_day && end > start {
            end -= Duration::nanoseconds(1);
        }
        Some((start.date_naive(), end.date_naive()))
    }

    /// Returns true if the event's date span intersects `range`.
    pub fn is_in_date_range(&self, range: &DateRange) -> bool {
        self.date_span()
            .is_some_and(|(start, end)| range.overlaps(start, end))
    }

    /// Matches the keyword against title, description and location.
    pub fn matches_text(&self, keyword: &Keyword) -> bool {
        keyword.matches_any([
            self.title.as_str(),
            self.description.as_str(),
            self.location.as_str(),
        ])
    }

    /// Like [`matches_text`](Self::matches_text), also looking at attendees.
    pub fn matches_keyword(&self, keyword: &Keyword) -> bool {
        self.matches_text(keyword) || keyword.matches_any(self.attendees.iter().map(String::as_str))
    }

    /// Builder method to set start and end.
    pub fn with_times(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Builder method to set only the start.
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method to mark as all-day.
    pub fn with_all_day(mut self, is_all_day: bool) -> Self {
        self.is_all_day = is_all_day;
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_recurrence_rule(mut self, rule: impl Into<String>) -> Self {
        self.recurrence_rule = Some(rule.into());
        self
    }

    /// Builder method to set attendees.
    pub fn with_attendees<I, S>(mut self, attendees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = attendees.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    /// Builder method to set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn june_meeting() -> CalendarEvent {
        CalendarEvent::new("e1", "Planning", Provider::Google)
            .with_times(utc(2024, 6, 15, 10, 0), utc(2024, 6, 15, 11, 0))
    }

    mod validity {
        use super::*;

        #[test]
        fn requires_id_title_and_start() {
            assert!(june_meeting().is_valid());
            assert!(!CalendarEvent::new("e1", "Planning", Provider::Google).is_valid());
            assert!(!CalendarEvent::new("", "Planning", Provider::Google)
                .with_start(utc(2024, 6, 15, 10, 0))
                .is_valid());
            assert!(!CalendarEvent::new("e1", "", Provider::Google)
                .with_start(utc(2024, 6, 15, 10, 0))
                .is_valid());
        }

        #[test]
        fn key_combines_id_and_provider() {
            assert_eq!(june_meeting().key(), EntityKey::new("e1", Provider::Google));
        }
    }

    mod date_range {
        use super::*;

        #[test]
        fn contained_in_june_not_july() {
            let event = june_meeting();
            assert!(event.is_in_date_range(&DateRange::new(date(2024, 6, 1), date(2024, 6, 30))));
            assert!(!event.is_in_date_range(&DateRange::new(date(2024, 7, 1), date(2024, 7, 31))));
        }

        #[test]
        fn missing_end_defaults_to_start() {
            let event =
                CalendarEvent::new("e1", "Call", Provider::Apple).with_start(utc(2024, 6, 30, 9, 0));
            assert_eq!(event.date_span(), Some((date(2024, 6, 30), date(2024, 6, 30))));
        }

        #[test]
        fn all_day_end_is_exclusive() {
            let event = CalendarEvent::new("e1", "Holiday", Provider::Google)
                .with_times(utc(2024, 6, 30, 0, 0), utc(2024, 7, 1, 0, 0))
                .with_all_day(true);
            assert_eq!(event.date_span(), Some((date(2024, 6, 30), date(2024, 6, 30))));
            assert!(!event.is_in_date_range(&DateRange::single_day(date(2024, 7, 1))));
        }

        #[test]
        fn multi_day_event_overlaps_partially() {
            let event = CalendarEvent::new("e1", "Offsite", Provider::Outlook)
                .with_times(utc(2024, 6, 28, 9, 0), utc(2024, 7, 2, 17, 0));
            assert!(event.is_in_date_range(&DateRange::new(date(2024, 7, 1), date(2024, 7, 31))));
        }

        #[test]
        fn no_start_never_in_range() {
            let event = CalendarEvent::new("e1", "Draft", Provider::Google);
            assert!(!event.is_in_date_range(&DateRange::new(date(2000, 1, 1), date(2100, 1, 1))));
        }
    }

    mod keyword {
        use super::*;

        #[test]
        fn matches_location_case_insensitively() {
            let event = june_meeting().with_location("Conference Room A");
            assert!(event.matches_text(&Keyword::new("conference")));
        }

        #[test]
        fn attendees_only_in_keyword_match() {
            let event = june_meeting().with_attendees(["alice@example.com"]);
            let keyword = Keyword::new("alice");
            assert!(!event.matches_text(&keyword));
            assert!(event.matches_keyword(&keyword));
        }
    }
}
