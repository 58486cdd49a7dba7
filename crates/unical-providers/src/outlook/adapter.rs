use tokio::sync::broadcast;
use tracing::debug;
use unical_core::{CalendarEvent, DateRange, Provider, Task};

use crate::adapter::{BoxFuture, CalendarAdapter, CalendarInfo};
use crate::auth::{AuthEvent, BearerSession, TokenSource};
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::{normalize_events, normalize_tasks};

use super::client::OutlookClient;
use super::config::OutlookConfig;

/// Outlook calendar events and Microsoft To Do tasks.
pub struct OutlookAdapter {
    config: OutlookConfig,
    client: OutlookClient,
    session: BearerSession,
}

impl std::fmt::Debug for OutlookAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutlookAdapter")
            .field("api_base", &self.config.api_base)
            .field("authenticated", &self.session.state().is_authenticated())
            .finish()
    }
}

impl OutlookAdapter {
    pub fn new(config: OutlookConfig, tokens: Box<dyn TokenSource>) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::configuration(e).with_provider(Provider::Outlook))?;
        let client = OutlookClient::new(&config)?;
        Ok(Self {
            config,
            client,
            session: BearerSession::new(Provider::Outlook, tokens),
        })
    }

    fn owner(&self) -> String {
        self.config.owner_id.clone().unwrap_or_default()
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
        let (start, end) = range.to_local_utc_bounds();
        let raw = self
            .session
            .observe(self.client.list_events(&token, start, end, &self.owner()).await)?;
        Ok(normalize_events(raw, Provider::Outlook))
    }

    async fn fetch_tasks_impl(&self) -> ProviderResult<Vec<Task>> {
        let token = self.session.token().await?;
        let lists = self.session.observe(self.client.list_task_lists(&token).await)?;
        let Some(list) = lists.first() else {
            debug!("no outlook task lists");
            return Ok(Vec::new());
        };
        debug!(list = %list.display_name, "reading outlook task list");
        let raw = self
            .session
            .observe(self.client.list_tasks(&token, &list.id, &self.owner()).await)?;
        Ok(normalize_tasks(raw, Provider::Outlook))
    }

    async fn fetch_shared_calendars_impl(&self) -> ProviderResult<Vec<CalendarInfo>> {
        let token = self.session.token().await?;
        let calendars = self.session.observe(self.client.list_calendars(&token).await)?;
        let me = self.config.owner_id.as_deref();
        Ok(calendars
            .into_iter()
            .map(|c| {
                let owner = c.owner.and_then(|o| o.address).unwrap_or_default();
                let owned = c.is_default_calendar || me.is_some_and(|me| me == owner);
                let mut info = CalendarInfo::new(c.id, c.name)
                    .with_owner(owner)
                    .with_shared(!owned && !c.can_edit);
                info.color = c.hex_color.filter(|h| !h.is_empty());
                info
            })
            .collect())
    }
}

impl CalendarAdapter for OutlookAdapter {
    fn provider(&self) -> Provider {
        Provider::Outlook
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
