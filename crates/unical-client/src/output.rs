//! Rendering of search results and sync signals.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use unical_core::{CalendarEvent, SearchResults, Task};
use unical_sync::{SyncEvent, SyncSummary};

fn local(time: DateTime<Utc>, all_day: bool) -> String {
    let time = time.with_timezone(&Local);
    if all_day {
        time.format("%Y-%m-%d").to_string()
    } else {
        time.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// One line per event: `start  [provider] title @ location`.
pub fn event_line(event: &CalendarEvent) -> String {
    let when = event
        .start
        .map(|s| local(s, event.is_all_day))
        .unwrap_or_default();
    let mut line = format!("{when:<16}  [{}] {}", event.provider, event.title);
    if !event.location.is_empty() {
        line.push_str(" @ ");
        line.push_str(&event.location);
    }
    line
}

/// One line per task: `[x] title (due ..., p2) [provider]`.
pub fn task_line(task: &Task) -> String {
    let mark = if task.is_completed { 'x' } else { ' ' };
    let mut details = vec![format!("p{}", task.priority)];
    if let Some(due) = task.due {
        details.insert(0, format!("due {}", local(due, false)));
    }
    let mut line = format!(
        "[{mark}] {} ({}) [{}]",
        task.title,
        details.join(", "),
        task.provider
    );
    if !task.tags.is_empty() {
        let tags: Vec<_> = task.tags.iter().map(|t| format!("#{t}")).collect();
        line.push(' ');
        line.push_str(&tags.join(" "));
    }
    line
}

pub fn render_results(results: &SearchResults) -> String {
    let mut out = String::new();
    if !results.events.is_empty() {
        out.push_str(&format!("Events ({})\n", results.events.len()));
        for event in &results.events {
            out.push_str("  ");
            out.push_str(&event_line(event));
            out.push('\n');
        }
    }
    if !results.tasks.is_empty() {
        out.push_str(&format!("Tasks ({})\n", results.tasks.len()));
        for task in &results.tasks {
            out.push_str("  ");
            out.push_str(&task_line(task));
            out.push('\n');
        }
    }
    if out.is_empty() {
        out.push_str("No matches\n");
    }
    out
}

pub fn render_summary(summary: &SyncSummary) -> String {
    format!(
        "synced {} adapter(s): {} event(s), {} task(s), {} error(s)",
        summary.adapters, summary.events, summary.tasks, summary.errors
    )
}

pub fn render_sync_event(event: &SyncEvent) -> String {
    match event {
        SyncEvent::Started => "sync started".to_string(),
        SyncEvent::Progress { provider, percent } => format!("{provider}: {percent}%"),
        SyncEvent::Completed { at } => format!("sync completed at {}", local(*at, false)),
        SyncEvent::Error { message, .. } => format!("error: {message}"),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}
