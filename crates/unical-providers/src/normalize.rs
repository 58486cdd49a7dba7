//! Raw entity to unified entity conversion.
//!
//! Rules applied to every provider:
//!
//! - A date-only start marks the entry all-day; start and end are moved to
//!   UTC midnight of their dates.
//! - Timed values are already UTC by the time they reach here.
//! - Task priority is mapped into `1..=5` with a per-scale formula.
//! - Entities failing their validity check are dropped, not reported.

use tracing::debug;
use unical_core::task::{PRIORITY_DEFAULT, PRIORITY_HIGHEST, PRIORITY_LOWEST};
use unical_core::time::utc_midnight;
use unical_core::{CalendarEvent, Provider, Task};

use crate::raw::{NativePriority, RawEvent, RawEventTime, RawTask};

/// Maps an iCalendar `PRIORITY` (0-9) to `1..=5`.
///
/// 0 means undefined and maps to the default. Otherwise the 9-point scale is
/// compressed with `clamp(1, round((p + 1) / 2), 5)`.
pub fn map_ical_priority(native: u8) -> u8 {
    if native == 0 {
        return PRIORITY_DEFAULT;
    }
    let compressed = (f64::from(native) + 1.0) / 2.0;
    (compressed.round() as u8).clamp(PRIORITY_HIGHEST, PRIORITY_LOWEST)
}

/// Maps a Graph `importance` value to `1..=5`.
pub fn map_importance(importance: &str) -> u8 {
    match importance.to_ascii_lowercase().as_str() {
        "high" => PRIORITY_HIGHEST,
        "normal" => PRIORITY_DEFAULT,
        _ => PRIORITY_LOWEST,
    }
}

pub fn map_priority(native: &NativePriority) -> u8 {
    match native {
        NativePriority::Unspecified => PRIORITY_DEFAULT,
        NativePriority::ICalendar(p) => map_ical_priority(*p),
        NativePriority::Importance(value) => map_importance(value),
    }
}

fn to_instant(time: RawEventTime, all_day: bool) -> chrono::DateTime<chrono::Utc> {
    match time {
        RawEventTime::Date(date) => utc_midnight(date),
        RawEventTime::DateTime(dt) if all_day => utc_midnight(dt.date_naive()),
        RawEventTime::DateTime(dt) => dt,
    }
}

/// Converts one raw event, returning `None` if the result is invalid.
pub fn normalize_event(raw: RawEvent, provider: Provider) -> Option<CalendarEvent> {
    let is_all_day = raw.start.is_some_and(|s| s.is_all_day());
    let event = CalendarEvent {
        id: raw.id,
        title: raw.title.trim().to_string(),
        description: raw.description.unwrap_or_default(),
        location: raw.location.unwrap_or_default(),
        start: raw.start.map(|t| to_instant(t, is_all_day)),
        end: raw.end.map(|t| to_instant(t, is_all_day)),
        is_all_day,
        recurrence_rule: raw.recurrence.filter(|r| !r.is_empty()),
        attendees: raw.attendees,
        owner_id: raw.owner_id.unwrap_or_default(),
        color: raw.color,
        provider,
    };
    event.is_valid().then_some(event)
}

/// Converts one raw task, returning `None` if the result is invalid.
pub fn normalize_task(raw: RawTask, provider: Provider) -> Option<Task> {
    let task = Task {
        id: raw.id,
        title: raw.title.trim().to_string(),
        description: raw.notes.unwrap_or_default(),
        due: raw.due.map(|t| to_instant(t, t.is_all_day())),
        is_completed: raw.completed,
        priority: map_priority(&raw.priority),
        tags: raw.tags,
        owner_id: raw.owner_id.unwrap_or_default(),
        provider,
    };
    task.is_valid().then_some(task)
}

/// Converts a batch of raw events, silently dropping invalid ones.
pub fn normalize_events(raw: Vec<RawEvent>, provider: Provider) -> Vec<CalendarEvent> {
    let total = raw.len();
    let events: Vec<_> = raw
        .into_iter()
        .filter_map(|r| normalize_event(r, provider))
        .collect();
    if events.len() < total {
        debug!(%provider, dropped = total - events.len(), "dropped invalid events");
    }
    events
}

/// Converts a batch of raw tasks, silently dropping invalid ones.
pub fn normalize_tasks(raw: Vec<RawTask>, provider: Provider) -> Vec<Task> {
    let total = raw.len();
    let tasks: Vec<_> = raw
        .into_iter()
        .filter_map(|r| normalize_task(r, provider))
        .collect();
    if tasks.len() < total {
        debug!(%provider, dropped = total - tasks.len(), "dropped invalid tasks");
    }
    tasks
}
