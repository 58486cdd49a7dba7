//! iCalendar payloads to raw entities.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::parser::{Component, Property, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use tracing::{debug, warn};

use crate::raw::{NativePriority, RawEvent, RawEventTime, RawTask};

fn text(component: &Component<'_>, name: &str) -> Option<String> {
    component
        .find_prop(name)
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|s| !s.is_empty())
}

/// Undoes RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}

fn strip_mailto(value: &str) -> String {
    let value = value.trim();
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => value[7..].to_string(),
        _ => value.to_string(),
    }
}

/// Parses a DATE or DATE-TIME property. TZID-qualified times are resolved
/// in their IANA zone; floating times and unknown zones are read as local
/// wall-clock time.
fn parse_time(prop: &Property<'_>) -> Option<RawEventTime> {
    let value = match DatePerhapsTime::try_from(prop) {
        Ok(value) => value,
        Err(e) => {
            debug!(name = %prop.name, value = %prop.val, error = e, "unparsable date");
            return None;
        }
    };
    let utc = match value {
        DatePerhapsTime::Date(date) => return Some(RawEventTime::Date(date)),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(utc)) => utc,
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => wall_clock(&Local, naive),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            match tzid.trim_start_matches('/').parse::<Tz>() {
                Ok(zone) => wall_clock(&zone, date_time),
                Err(_) => {
                    warn!(%tzid, "unknown time zone, reading as local");
                    wall_clock(&Local, date_time)
                }
            }
        }
    };
    Some(RawEventTime::DateTime(utc))
}

/// Resolves a wall-clock time in `zone`. Ambiguous times take the earlier
/// instant; times skipped by a DST jump fall back to UTC.
fn wall_clock<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> DateTime<Utc> {
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

fn parse_calendar(ics: &str) -> Option<Vec<Component<'_>>> {
    match read_calendar(ics) {
        Ok(calendar) => Some(calendar.components),
        Err(e) => {
            warn!(error = %e, "failed to parse calendar data");
            None
        }
    }
}

/// Extracts the `VEVENT`s of one calendar object. Cancelled events are
/// skipped; overridden instances get the recurrence id appended to the UID.
pub(crate) fn parse_events(ics: &str, owner: &str) -> Vec<RawEvent> {
    let unfolded = unfold(ics);
    let Some(calendar) = parse_calendar(&unfolded) else {
        return Vec::new();
    };

    calendar
        .iter()
        .filter(|c| c.name == "VEVENT")
        .filter_map(|event| {
            let status = event.find_prop("STATUS").map(|p| p.val.as_ref().to_string());
            if status.as_deref() == Some("CANCELLED") {
                return None;
            }
            let uid = text(event, "UID").unwrap_or_default();
            let id = match event.find_prop("RECURRENCE-ID") {
                Some(rid) => format!("{uid}/{}", rid.val.as_ref().trim()),
                None => uid,
            };

            Some(RawEvent {
                id,
                title: text(event, "SUMMARY").unwrap_or_default(),
                description: text(event, "DESCRIPTION"),
                location: text(event, "LOCATION"),
                start: event.find_prop("DTSTART").and_then(parse_time),
                end: event.find_prop("DTEND").and_then(parse_time),
                recurrence: event.find_prop("RRULE").map(|p| p.val.as_ref().to_string()),
                attendees: event
                    .properties
                    .iter()
                    .filter(|p| p.name == "ATTENDEE")
                    .map(|p| strip_mailto(p.val.as_ref()))
                    .filter(|a| !a.is_empty())
                    .collect(),
                owner_id: Some(
                    event
                        .find_prop("ORGANIZER")
                        .map(|p| strip_mailto(p.val.as_ref()))
                        .unwrap_or_else(|| owner.to_string()),
                ),
                color: text(event, "COLOR"),
            })
        })
        .collect()
}

/// Extracts the `VTODO`s of one calendar object.
pub(crate) fn parse_tasks(ics: &str, owner: &str) -> Vec<RawTask> {
    let unfolded = unfold(ics);
    let Some(calendar) = parse_calendar(&unfolded) else {
        return Vec::new();
    };

    calendar
        .iter()
        .filter(|c| c.name == "VTODO")
        .map(|todo| RawTask {
            id: text(todo, "UID").unwrap_or_default(),
            title: text(todo, "SUMMARY").unwrap_or_default(),
            notes: text(todo, "DESCRIPTION"),
            due: todo.find_prop("DUE").and_then(parse_time),
            completed: todo
                .find_prop("STATUS")
                .is_some_and(|p| p.val.as_ref().trim().eq_ignore_ascii_case("COMPLETED")),
            priority: todo
                .find_prop("PRIORITY")
                .and_then(|p| p.val.as_ref().trim().parse::<u8>().ok())
                .map(NativePriority::ICalendar)
                .unwrap_or_default(),
            tags: todo
                .properties
                .iter()
                .filter(|p| p.name == "CATEGORIES")
                .flat_map(|p| {
                    unescape_text(p.val.as_ref())
                        .split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                })
                .collect(),
            owner_id: Some(owner.to_string()),
        })
        .collect()
}
