//! CalDAV adapter configuration.

use std::fmt;
use std::time::Duration;

use url::Url;

/// Configuration for the Apple (CalDAV) adapter.
#[derive(Clone)]
pub struct CalDavConfig {
    /// Discovery starting point.
    pub server_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Calendar home collection. Skips principal discovery when set.
    pub calendar_home: Option<String>,
    /// Collections to read events from. Discovered when empty.
    pub event_collections: Vec<String>,
    /// Collections to read reminders from. Discovered when empty.
    pub task_collections: Vec<String>,
    /// Owner recorded on entities. Defaults to the username.
    pub owner_id: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for CalDavConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalDavConfig")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("calendar_home", &self.calendar_home)
            .field("event_collections", &self.event_collections)
            .field("task_collections", &self.task_collections)
            .field("owner_id", &self.owner_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self {
            server_url: Self::ICLOUD_URL.to_string(),
            username: None,
            password: None,
            calendar_home: None,
            event_collections: Vec::new(),
            task_collections: Vec::new(),
            owner_id: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CalDavConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const ICLOUD_URL: &'static str = "https://caldav.icloud.com/";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_calendar_home(mut self, home: impl Into<String>) -> Self {
        self.calendar_home = Some(home.into());
        self
    }

    pub fn with_event_collections(mut self, collections: Vec<String>) -> Self {
        self.event_collections = collections;
        self
    }

    pub fn with_task_collections(mut self, collections: Vec<String>) -> Self {
        self.task_collections = collections;
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

    /// True when both username and password are present and non-empty.
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.username, &self.password),
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        )
    }

    /// The owner recorded on fetched entities.
    pub fn owner(&self) -> String {
        self.owner_id
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), String> {
        let base = Url::parse(&self.server_url)
            .map_err(|e| format!("invalid server URL {}: {e}", self.server_url))?;
        if base.cannot_be_a_base() {
            return Err(format!("server URL {} cannot be a base", self.server_url));
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
