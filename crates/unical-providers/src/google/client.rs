//! Google Calendar v3 and Tasks v1 HTTP client.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use unical_core::Provider;

use crate::error::ProviderResult;
use crate::http;
use crate::raw::{NativePriority, RawEvent, RawEventTime, RawTask};

use super::config::GoogleConfig;

const PROVIDER: Provider = Provider::Google;

/// Low-level client. Holds no credentials; every call takes a token.
#[derive(Debug)]
pub(crate) struct GoogleClient {
    http: reqwest::Client,
    calendar_base: String,
    tasks_base: String,
    page_size: u32,
}

impl GoogleClient {
    pub(crate) fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: http::build_client(config.timeout)?,
            calendar_base: config.calendar_api_base.trim_end_matches('/').to_string(),
            tasks_base: config.tasks_api_base.trim_end_matches('/').to_string(),
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
            .query(query)
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, e))?;
        let response = http::check_status(PROVIDER, response).await?;
        http::read_json(PROVIDER, response).await
    }

    /// Follows `nextPageToken` until the collection is exhausted. `query` is
    /// sent with every page.
    async fn get_all<T: DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = query.to_vec();
            if let Some(next) = page_token.take() {
                params.push(("pageToken", next));
            }
            let mut page: ListPage<T> = self.get_json(token, url, &params).await?;
            items.append(&mut page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(items)
    }

    /// Cheap authenticated call used to verify a token.
    pub(crate) async fn verify(&self, token: &str) -> ProviderResult<()> {
        let url = format!("{}/users/me/calendarList", self.calendar_base);
        let _: ListPage<CalendarListEntry> = self
            .get_json(token, &url, &[("maxResults", "1".to_string())])
            .await?;
        Ok(())
    }

    /// Lists expanded event instances in `[time_min, time_max)`, following
    /// every page.
    pub(crate) async fn list_events(
        &self,
        token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        fallback_owner: &str,
    ) -> ProviderResult<Vec<RawEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.calendar_base,
            urlencoding::encode(calendar_id)
        );
        let query = [
            ("timeMin", time_min.to_rfc3339()),
            ("timeMax", time_max.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", self.page_size.to_string()),
        ];
        let events: Vec<ApiEvent> = self.get_all(token, &url, &query).await?;
        let events: Vec<RawEvent> = events
            .into_iter()
            .filter_map(|e| convert_event(e, fallback_owner))
            .collect();
        debug!(calendar_id, count = events.len(), "fetched google events");
        Ok(events)
    }

    pub(crate) async fn list_calendars(&self, token: &str) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.calendar_base);
        let query = [("maxResults", self.page_size.min(250).to_string())];
        self.get_all(token, &url, &query).await
    }

    pub(crate) async fn list_task_lists(&self, token: &str) -> ProviderResult<Vec<TaskListEntry>> {
        let url = format!("{}/users/@me/lists", self.tasks_base);
        let query = [("maxResults", self.page_size.min(100).to_string())];
        self.get_all(token, &url, &query).await
    }

    /// Lists every task in `list_id`, completed and hidden ones included.
    pub(crate) async fn list_tasks(
        &self,
        token: &str,
        list_id: &str,
        owner: &str,
    ) -> ProviderResult<Vec<RawTask>> {
        let url = format!(
            "{}/lists/{}/tasks",
            self.tasks_base,
            urlencoding::encode(list_id)
        );
        let query = [
            ("showCompleted", "true".to_string()),
            ("showHidden", "true".to_string()),
            ("maxResults", self.page_size.min(100).to_string()),
        ];
        let tasks: Vec<ApiTask> = self.get_all(token, &url, &query).await?;
        debug!(list_id, count = tasks.len(), "fetched google tasks");
        Ok(tasks.into_iter().map(|t| convert_task(t, owner)).collect())
    }
}

fn parse_time(time: &ApiEventTime) -> Option<RawEventTime> {
    time.date_time
        .as_deref()
        .or(time.date.as_deref())
        .and_then(RawEventTime::parse)
}

/// Converts an API event. Cancelled instances are skipped.
pub(crate) fn convert_event(event: ApiEvent, fallback_owner: &str) -> Option<RawEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }
    let start = event.start.as_ref().and_then(parse_time);
    if start.is_none() {
        warn!(id = ?event.id, "google event has no usable start");
    }
    let end = event.end.as_ref().and_then(parse_time);

    let recurrence = event
        .recurrence
        .unwrap_or_default()
        .into_iter()
        .find(|line| line.starts_with("RRULE"));

    let owner = event
        .organizer
        .and_then(|o| o.email)
        .unwrap_or_else(|| fallback_owner.to_string());

    Some(RawEvent {
        id: event.id.unwrap_or_default(),
        title: event.summary.unwrap_or_default(),
        description: event.description,
        location: event.location,
        start,
        end,
        recurrence,
        attendees: event
            .attendees
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.email)
            .collect(),
        owner_id: Some(owner),
        color: event.color_id,
    })
}

pub(crate) fn convert_task(task: ApiTask, owner: &str) -> RawTask {
    RawTask {
        id: task.id.unwrap_or_default(),
        title: task.title.unwrap_or_default(),
        notes: task.notes,
        due: task.due.as_deref().and_then(RawEventTime::parse),
        completed: task.status.as_deref() == Some("completed"),
        priority: NativePriority::Unspecified,
        tags: Default::default(),
        owner_id: Some(owner.to_string()),
    }
}

/// One page of any Google list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: DeserializeOwned"))]
struct ListPage<T> {
    #[serde(default)]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    status: Option<String>,
    recurrence: Option<Vec<String>>,
    attendees: Option<Vec<ApiAttendee>>,
    organizer: Option<ApiPerson>,
    color_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAttendee {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPerson {
    email: Option<String>,
}

/// An entry of `users/me/calendarList`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
    /// `owner`, `writer`, `reader` or `freeBusyReader`.
    pub access_role: Option<String>,
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskListEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTask {
    id: Option<String>,
    title: Option<String>,
    notes: Option<String>,
    status: Option<String>,
    due: Option<String>,
}
