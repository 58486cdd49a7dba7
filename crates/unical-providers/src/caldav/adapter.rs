use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info};
use unical_core::{CalendarEvent, DateRange, Provider, Task};

use crate::adapter::{BoxFuture, CalendarAdapter, CalendarInfo, require_auth};
use crate::auth::{AuthEvent, AuthState};
use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::normalize::{normalize_events, normalize_tasks};

use super::client::CalDavClient;
use super::config::CalDavConfig;
use super::ics::{parse_events, parse_tasks};
use super::xml::{
    DiscoveredCalendar, calendar_query_body, calendars_body, home_set_body,
    parse_calendar_objects, parse_calendars, parse_home_set,
};

const PROVIDER: Provider = Provider::Apple;

/// iCloud calendars and reminders over CalDAV.
pub struct AppleAdapter {
    config: CalDavConfig,
    client: CalDavClient,
    /// Absolute URL of the calendar home, set by `authenticate`.
    home: RwLock<Option<String>>,
    auth: AuthState,
}

impl std::fmt::Debug for AppleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppleAdapter")
            .field("server_url", &self.config.server_url)
            .field("authenticated", &self.auth.is_authenticated())
            .finish()
    }
}

impl AppleAdapter {
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::configuration(e).with_provider(PROVIDER))?;
        let client = CalDavClient::new(&config)?;
        Ok(Self {
            config,
            client,
            home: RwLock::new(None),
            auth: AuthState::new(PROVIDER),
        })
    }

    fn observe<T>(&self, result: ProviderResult<T>) -> ProviderResult<T> {
        if let Err(e) = &result
            && e.code() == ProviderErrorCode::AuthenticationFailed
        {
            self.auth.mark_failed(e.message());
        }
        result.map_err(|e| e.with_provider(PROVIDER))
    }

    /// Principal, then calendar home. A configured home skips the walk but
    /// is still probed so bad credentials surface here.
    async fn discover_home(&self) -> ProviderResult<String> {
        let body = home_set_body()?;
        if let Some(home) = &self.config.calendar_home {
            let home = self.client.resolve(home)?;
            self.client.propfind(&home, &body, 0).await?;
            return Ok(home);
        }

        let base = self.client.base().to_string();
        let found = parse_home_set(&self.client.propfind(&base, &body, 0).await?)?;
        if let Some(home) = found.calendar_home {
            return self.client.resolve(&home);
        }
        if let Some(principal) = found.principal {
            let principal = self.client.resolve(&principal)?;
            debug!(%principal, "resolving calendar home from principal");
            let found = parse_home_set(&self.client.propfind(&principal, &body, 0).await?)?;
            if let Some(home) = found.calendar_home {
                return self.client.resolve(&home);
            }
        }
        debug!("no calendar home advertised, using server URL");
        Ok(base)
    }

    async fn authenticate_impl(&self) -> ProviderResult<()> {
        if !self.config.has_credentials() {
            let err = ProviderError::authentication("credentials not configured");
            self.auth.mark_failed(err.message());
            return Err(err.with_provider(PROVIDER));
        }
        match self.discover_home().await {
            Ok(home) => {
                info!(%home, "apple account authenticated");
                *self.home.write().unwrap_or_else(PoisonError::into_inner) = Some(home);
                self.auth.mark_authenticated();
                Ok(())
            }
            Err(e) => {
                self.auth.mark_failed(e.message());
                Err(e.with_provider(PROVIDER))
            }
        }
    }

    async fn current_home(&self) -> ProviderResult<String> {
        require_auth(&self.auth, PROVIDER)?;
        self.home
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderError::not_authenticated().with_provider(PROVIDER))
    }

    async fn discover_calendars(&self, home: &str) -> ProviderResult<Vec<DiscoveredCalendar>> {
        let body = calendars_body()?;
        let calendars = parse_calendars(&self.client.propfind(home, &body, 1).await?)?;
        debug!(count = calendars.len(), "discovered caldav calendars");
        Ok(calendars)
    }

    /// Configured collections, or the discovered ones holding `component`.
    async fn collections(&self, configured: &[String], component: &str) -> ProviderResult<Vec<String>> {
        if !configured.is_empty() {
            return configured.iter().map(|c| self.client.resolve(c)).collect();
        }
        let home = self.current_home().await?;
        self.discover_calendars(&home)
            .await?
            .into_iter()
            .filter(|c| c.supports(component))
            .map(|c| self.client.resolve(&c.href))
            .collect()
    }

    async fn fetch_events_impl(&self, range: DateRange) -> ProviderResult<Vec<CalendarEvent>> {
        require_auth(&self.auth, PROVIDER)?;
        let owner = self.config.owner();
        let window = range.to_local_utc_bounds();
        let body = calendar_query_body("VEVENT", Some(window))?;

        let collections = self.observe(self.collections(&self.config.event_collections, "VEVENT").await)?;
        let mut raw = Vec::new();
        for collection in collections {
            let response = self.observe(self.client.report(&collection, &body).await)?;
            for object in parse_calendar_objects(&response)? {
                raw.extend(parse_events(&object.data, &owner));
            }
        }
        Ok(normalize_events(raw, PROVIDER))
    }

    async fn fetch_tasks_impl(&self) -> ProviderResult<Vec<Task>> {
        require_auth(&self.auth, PROVIDER)?;
        let owner = self.config.owner();
        let body = calendar_query_body("VTODO", None)?;

        let collections = self.observe(self.collections(&self.config.task_collections, "VTODO").await)?;
        let mut raw = Vec::new();
        for collection in collections {
            let response = self.observe(self.client.report(&collection, &body).await)?;
            for object in parse_calendar_objects(&response)? {
                raw.extend(parse_tasks(&object.data, &owner));
            }
        }
        Ok(normalize_tasks(raw, PROVIDER))
    }

    async fn fetch_shared_calendars_impl(&self) -> ProviderResult<Vec<CalendarInfo>> {
        let home = self.current_home().await?;
        let calendars = self.observe(self.discover_calendars(&home).await)?;
        let me = self.config.owner();
        calendars
            .into_iter()
            .map(|c| {
                let id = self.client.resolve(&c.href)?;
                let name = c.display_name.unwrap_or_else(|| c.href.clone());
                let owner = match (&c.owner, c.is_shared) {
                    (Some(owner), true) => owner.clone(),
                    _ => me.clone(),
                };
                let mut info = CalendarInfo::new(id, name)
                    .with_owner(owner)
                    .with_shared(c.is_shared);
                info.color = c.color;
                Ok(info)
            })
            .collect()
    }
}

impl CalendarAdapter for AppleAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(self.authenticate_impl())
    }

    fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    fn logout(&self) {
        *self.home.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.auth.clear();
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
        self.auth.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credentials_fail_authentication() {
        let adapter = AppleAdapter::new(CalDavConfig::new()).unwrap();
        let mut rx = adapter.subscribe_auth();

        let err = adapter.authenticate().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some(Provider::Apple));
        assert!(!adapter.is_authenticated());
        assert!(matches!(
            rx.try_recv().unwrap(),
            AuthEvent::AuthenticationFailed { provider: Provider::Apple, .. }
        ));
    }

    #[tokio::test]
    async fn logout_forgets_the_calendar_home() {
        let adapter =
            AppleAdapter::new(CalDavConfig::new().with_credentials("me", "pw")).unwrap();
        *adapter.home.write().unwrap() = Some("https://caldav.example.com/home/".into());
        adapter.auth.mark_authenticated();
        assert!(adapter.current_home().await.is_ok());

        adapter.logout();
        assert!(!adapter.is_authenticated());
        adapter.auth.mark_authenticated();
        let err = adapter.current_home().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotAuthenticated);
    }

    #[tokio::test]
    async fn fetches_require_authentication() {
        let adapter =
            AppleAdapter::new(CalDavConfig::new().with_credentials("me", "pw")).unwrap();
        let err = adapter.fetch_tasks().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotAuthenticated);
        let err = adapter.fetch_shared_calendars().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotAuthenticated);
    }

    #[test]
    fn invalid_server_url_is_configuration_error() {
        let err = AppleAdapter::new(CalDavConfig::new().with_server_url("::")).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Configuration);
    }
}
