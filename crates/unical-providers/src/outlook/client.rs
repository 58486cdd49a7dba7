//! Microsoft Graph HTTP client.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use unical_core::Provider;

use crate::error::ProviderResult;
use crate::http;
use crate::raw::{NativePriority, RawEvent, RawEventTime, RawTask};

use super::config::OutlookConfig;

const PROVIDER: Provider = Provider::Outlook;

/// Asks Graph to express every `dateTime` in UTC.
const PREFER_UTC: &str = "outlook.timezone=\"UTC\"";

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid HTML tag regex"));

#[derive(Debug)]
pub(crate) struct OutlookClient {
    http: reqwest::Client,
    base: String,
    page_size: u32,
}

impl OutlookClient {
    pub(crate) fn new(config: &OutlookConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: http::build_client(config.timeout)?,
            base: config.api_base.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Prefer", PREFER_UTC)
            .query(query)
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, e))?;
        let response = http::check_status(PROVIDER, response).await?;
        http::read_json(PROVIDER, response).await
    }

    /// Fetches every page of a collection. `@odata.nextLink` is absolute and
    /// already carries the query.
    async fn get_all<T: DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Page<T> = self.get_json(token, url, query).await?;
        loop {
            items.append(&mut page.value);
            match page.next_link.take() {
                Some(next) => page = self.get_json(token, &next, &[]).await?,
                None => break,
            }
        }
        Ok(items)
    }

    pub(crate) async fn verify(&self, token: &str) -> ProviderResult<()> {
        let url = format!("{}/me", self.base);
        let _: serde_json::Value = self
            .get_json(token, &url, &[("$select", "id".to_string())])
            .await?;
        Ok(())
    }

    /// Expanded event instances overlapping `[start, end)`.
    pub(crate) async fn list_events(
        &self,
        token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        fallback_owner: &str,
    ) -> ProviderResult<Vec<RawEvent>> {
        let url = format!("{}/me/calendarView", self.base);
        let query = [
            ("startDateTime", start.to_rfc3339()),
            ("endDateTime", end.to_rfc3339()),
            ("$orderby", "start/dateTime".to_string()),
            ("$top", self.page_size.to_string()),
        ];
        let events: Vec<GraphEvent> = self.get_all(token, &url, &query).await?;
        let events: Vec<RawEvent> = events
            .into_iter()
            .filter_map(|e| convert_event(e, fallback_owner))
            .collect();
        debug!(count = events.len(), "fetched outlook events");
        Ok(events)
    }

    pub(crate) async fn list_calendars(&self, token: &str) -> ProviderResult<Vec<GraphCalendar>> {
        let url = format!("{}/me/calendars", self.base);
        self.get_all(token, &url, &[]).await
    }

    pub(crate) async fn list_task_lists(&self, token: &str) -> ProviderResult<Vec<GraphTaskList>> {
        let url = format!("{}/me/todo/lists", self.base);
        self.get_all(token, &url, &[]).await
    }

    pub(crate) async fn list_tasks(
        &self,
        token: &str,
        list_id: &str,
        owner: &str,
    ) -> ProviderResult<Vec<RawTask>> {
        let url = format!(
            "{}/me/todo/lists/{}/tasks",
            self.base,
            urlencoding::encode(list_id)
        );
        let query = [("$top", self.page_size.to_string())];
        let tasks: Vec<GraphTask> = self.get_all(token, &url, &query).await?;
        debug!(list_id, count = tasks.len(), "fetched outlook tasks");
        Ok(tasks.into_iter().map(|t| convert_task(t, owner)).collect())
    }
}

/// Removes markup from an HTML body and decodes the common entities.
pub(crate) fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, "");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

fn body_text(body: Option<GraphBody>) -> Option<String> {
    let body = body?;
    let text = if body.content_type.eq_ignore_ascii_case("html") {
        strip_html(&body.content)
    } else {
        body.content.trim().to_string()
    };
    (!text.is_empty()).then_some(text)
}

/// Parses a Graph `dateTimeTimeZone`. Requests carry the UTC preference, so
/// offset-less values are read as UTC.
fn parse_graph_time(time: &GraphDateTime, all_day: bool) -> Option<RawEventTime> {
    let value = time.date_time.trim();
    let naive = match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive,
        Err(_) => return RawEventTime::parse(value),
    };
    if all_day {
        return Some(RawEventTime::Date(naive.date()));
    }
    if !time.time_zone.is_empty() && !time.time_zone.eq_ignore_ascii_case("UTC") {
        warn!(time_zone = %time.time_zone, "graph time outside UTC, reading as UTC");
    }
    Some(RawEventTime::DateTime(naive.and_utc()))
}

pub(crate) fn convert_event(event: GraphEvent, fallback_owner: &str) -> Option<RawEvent> {
    if event.is_cancelled {
        return None;
    }
    let start = event
        .start
        .as_ref()
        .and_then(|t| parse_graph_time(t, event.is_all_day));
    let end = event
        .end
        .as_ref()
        .and_then(|t| parse_graph_time(t, event.is_all_day));

    let owner = event
        .organizer
        .and_then(|o| o.email_address)
        .and_then(|e| e.address)
        .unwrap_or_else(|| fallback_owner.to_string());

    Some(RawEvent {
        id: event.id,
        title: event.subject.unwrap_or_default(),
        description: body_text(event.body),
        location: event
            .location
            .and_then(|l| l.display_name)
            .filter(|l| !l.is_empty()),
        start,
        end,
        recurrence: event
            .recurrence
            .and_then(|r| r.pattern)
            .map(|p| p.pattern_type),
        attendees: event
            .attendees
            .into_iter()
            .filter_map(|a| a.email_address.and_then(|e| e.address))
            .collect(),
        owner_id: Some(owner),
        color: None,
    })
}

pub(crate) fn convert_task(task: GraphTask, owner: &str) -> RawTask {
    RawTask {
        id: task.id,
        title: task.title.unwrap_or_default(),
        notes: body_text(task.body),
        due: task.due_date_time.as_ref().and_then(|t| parse_graph_time(t, false)),
        completed: task.status.as_deref() == Some("completed"),
        priority: task
            .importance
            .map(NativePriority::Importance)
            .unwrap_or_default(),
        tags: task.categories.into_iter().collect(),
        owner_id: Some(owner.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Page<T> {
    #[serde(default)]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphEvent {
    id: String,
    subject: Option<String>,
    body: Option<GraphBody>,
    location: Option<GraphLocation>,
    start: Option<GraphDateTime>,
    end: Option<GraphDateTime>,
    #[serde(default)]
    is_all_day: bool,
    #[serde(default)]
    is_cancelled: bool,
    recurrence: Option<GraphRecurrence>,
    #[serde(default)]
    attendees: Vec<GraphRecipient>,
    organizer: Option<GraphRecipient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocation {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    #[serde(default)]
    time_zone: String,
}

#[derive(Debug, Deserialize)]
struct GraphRecurrence {
    pattern: Option<GraphPattern>,
}

#[derive(Debug, Deserialize)]
struct GraphPattern {
    /// `daily`, `weekly`, `absoluteMonthly`, ...
    #[serde(rename = "type")]
    pattern_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    email_address: Option<GraphEmail>,
}

#[derive(Debug, Deserialize)]
struct GraphEmail {
    address: Option<String>,
}

/// An entry of `/me/calendars`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphCalendar {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub hex_color: Option<String>,
    #[serde(default)]
    pub is_default_calendar: bool,
    #[serde(default)]
    pub can_edit: bool,
    pub owner: Option<GraphOwner>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GraphOwner {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphTaskList {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphTask {
    id: String,
    title: Option<String>,
    body: Option<GraphBody>,
    status: Option<String>,
    importance: Option<String>,
    due_date_time: Option<GraphDateTime>,
    #[serde(default)]
    categories: Vec<String>,
}
