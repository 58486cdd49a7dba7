use tokio::sync::broadcast;
use tracing::debug;
use unical_core::{CalendarEvent, DateRange, Provider, Task};

use crate::adapter::{BoxFuture, CalendarAdapter, CalendarInfo};
use crate::auth::{AuthEvent, BearerSession, TokenSource};
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::{normalize_events, normalize_tasks};

use super::client::GoogleClient;
use super::config::GoogleConfig;

/// Google Calendar events and Google Tasks.
pub struct GoogleAdapter {
    config: GoogleConfig,
    client: GoogleClient,
    session: BearerSession,
}

impl std::fmt::Debug for GoogleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAdapter")
            .field("calendar_ids", &self.config.calendar_ids)
            .field("authenticated", &self.session.state().is_authenticated())
            .finish()
    }
}

impl GoogleAdapter {
    /// Creates an unauthenticated adapter.
    pub fn new(config: GoogleConfig, tokens: Box<dyn TokenSource>) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::configuration(e).with_provider(Provider::Google))?;
        let client = GoogleClient::new(&config)?;
        Ok(Self {
            config,
            client,
            session: BearerSession::new(Provider::Google, tokens),
        })
    }

    fn owner_for(&self, calendar_id: &str) -> String {
        match &self.config.owner_id {
            Some(owner) => owner.clone(),
            None if calendar_id != "primary" => calendar_id.to_string(),
            None => String::new(),
        }
    }

    async fn authenticate_impl(&self) -> ProviderResult<()> {
        self.session
            .authenticate(|token| async move {
                self.client.verify(&token).await?;
                Ok(token)
            })
            .await
    }

    async fn fetch_events_impl(&self, range: DateRange) -> ProviderResult<Vec<CalendarEvent>> {
        let token = self.session.token().await?;
        let (time_min, time_max) = range.to_local_utc_bounds();

        let mut raw = Vec::new();
        for calendar_id in &self.config.calendar_ids {
            let owner = self.owner_for(calendar_id);
            let events = self
                .client
                .list_events(&token, calendar_id, time_min, time_max, &owner)
                .await;
            raw.extend(self.session.observe(events)?);
        }
        Ok(normalize_events(raw, Provider::Google))
    }

    async fn fetch_tasks_impl(&self) -> ProviderResult<Vec<Task>> {
        let token = self.session.token().await?;
        let lists = self.session.observe(self.client.list_task_lists(&token).await)?;
        let Some(list) = lists.first() else {
            debug!("no google task lists");
            return Ok(Vec::new());
        };
        let owner = self.config.owner_id.clone().unwrap_or_default();
        let raw = self.session.observe(self.client.list_tasks(&token, &list.id, &owner).await)?;
        Ok(normalize_tasks(raw, Provider::Google))
    }

    async fn fetch_shared_calendars_impl(&self) -> ProviderResult<Vec<CalendarInfo>> {
        let token = self.session.token().await?;
        let calendars = self.session.observe(self.client.list_calendars(&token).await)?;
        Ok(calendars
            .into_iter()
            .map(|c| {
                let is_shared = !c.primary && c.access_role.as_deref() != Some("owner");
                let owner = if c.primary {
                    self.config.owner_id.clone().unwrap_or_default()
                } else {
                    c.id.clone()
                };
                let mut info = CalendarInfo::new(c.id, c.summary)
                    .with_owner(owner)
                    .with_shared(is_shared);
                info.color = c.background_color;
                info
            })
            .collect())
    }
}

impl CalendarAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(self.authenticate_impl())
    }

    fn is_authenticated(&self) -> bool {
        self.session.state().is_authenticated()
    }

    fn logout(&self) {
        self.session.logout();
    }

    fn fetch_events(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(self.fetch_events_impl(range))
    }

    fn fetch_tasks(&self) -> BoxFuture<'_, ProviderResult<Vec<Task>>> {
        Box::pin(self.fetch_tasks_impl())
    }

    fn fetch_shared_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        Box::pin(self.fetch_shared_calendars_impl())
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.state().subscribe()
    }
}
