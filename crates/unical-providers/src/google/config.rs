//! Google adapter configuration.

use std::time::Duration;

/// Configuration for the Google Calendar + Google Tasks adapter.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Calendars to read events from. Defaults to `primary`.
    pub calendar_ids: Vec<String>,
    /// Owner recorded on entities that do not name an organizer.
    pub owner_id: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Base URL of the Calendar v3 API.
    pub calendar_api_base: String,
    /// Base URL of the Tasks v1 API.
    pub tasks_api_base: String,
    /// Page size requested from list endpoints.
    pub page_size: u32,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            calendar_ids: vec!["primary".to_string()],
            owner_id: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            calendar_api_base: Self::CALENDAR_API_BASE.to_string(),
            tasks_api_base: Self::TASKS_API_BASE.to_string(),
            page_size: 250,
        }
    }
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const CALENDAR_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";
    pub const TASKS_API_BASE: &'static str = "https://tasks.googleapis.com/tasks/v1";

    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the calendar list.
    pub fn with_calendar_ids(mut self, ids: Vec<String>) -> Self {
        self.calendar_ids = ids;
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Points both APIs at another host, e.g. a test server.
    pub fn with_api_bases(mut self, calendar: impl Into<String>, tasks: impl Into<String>) -> Self {
        self.calendar_api_base = calendar.into();
        self.tasks_api_base = tasks.into();
        self
    }

    /// Checks the configuration for obvious mistakes.
    pub fn validate(&self) -> Result<(), String> {
        if self.calendar_ids.iter().any(|id| id.trim().is_empty()) {
            return Err("calendar ids must not be empty".to_string());
        }
        if self.calendar_ids.is_empty() {
            return Err("at least one calendar id is required".to_string());
        }
        for base in [&self.calendar_api_base, &self.tasks_api_base] {
            url::Url::parse(base).map_err(|e| format!("invalid API base {base}: {e}"))?;
        }
        if self.page_size == 0 {
            return Err("page size must be greater than zero".to_string());
        }
        Ok(())
    }
}
