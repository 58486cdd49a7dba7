//! The adapter contract every calendar backend implements.
//!
//! An adapter owns its credentials and knows how to talk to one provider.
//! It hands back normalized [`CalendarEvent`]s and [`Task`]s; it never
//! touches the aggregate store.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use tokio::sync::broadcast;
use unical_core::{CalendarEvent, DateRange, Provider, Task};

use crate::auth::{AuthEvent, AuthState};
use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};

/// A boxed future so [`CalendarAdapter`] stays object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A calendar discovered through [`CalendarAdapter::fetch_shared_calendars`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    /// Who owns the calendar, when the provider says.
    pub owner_id: String,
    /// True if the calendar belongs to somebody else.
    pub is_shared: bool,
    pub color: Option<String>,
}

impl CalendarInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: String::new(),
            is_shared: false,
            color: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    pub fn with_shared(mut self, is_shared: bool) -> Self {
        self.is_shared = is_shared;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// The capability set of a provider adapter.
///
/// # Contract
///
/// - `authenticate` ends in exactly one [`AuthEvent`]: `Authenticated` or
///   `AuthenticationFailed`. Calling it again while authenticated is allowed.
/// - `is_authenticated` only reads cached state.
/// - `fetch_events` and `fetch_tasks` fail with
///   [`ProviderErrorCode::NotAuthenticated`] without any network I/O when
///   the adapter is not authenticated.
/// - Fetches return only valid entities; items that fail validation are
///   dropped, never reported as errors.
/// - Each fetch resolves exactly once, even when it needs several requests.
pub trait CalendarAdapter: Send + Sync {
    /// The provider this adapter speaks to.
    fn provider(&self) -> Provider;

    /// Verifies credentials with the provider.
    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<()>>;

    fn is_authenticated(&self) -> bool;

    /// Clears cached credentials. Safe to call when not authenticated.
    fn logout(&self);

    /// Fetches events overlapping the date range. Dates are interpreted in
    /// local time; the adapter expands them to full-day UTC bounds.
    fn fetch_events(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>>;

    /// Fetches every task, with no date bound.
    fn fetch_tasks(&self) -> BoxFuture<'_, ProviderResult<Vec<Task>>>;

    /// Best-effort discovery of shared calendars.
    fn fetch_shared_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    /// Subscribes to authentication state changes.
    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Returns the standard `NotAuthenticated` error for `provider`.
pub(crate) fn require_auth(state: &AuthState, provider: Provider) -> ProviderResult<()> {
    if state.is_authenticated() {
        Ok(())
    } else {
        Err(ProviderError::not_authenticated().with_provider(provider))
    }
}

/// An adapter that can never authenticate.
///
/// Stands in for a provider whose configuration is broken, so the failure
/// shows up through the normal error paths instead of at startup.
#[derive(Debug)]
pub struct ErrorAdapter {
    provider: Provider,
    code: ProviderErrorCode,
    message: String,
    auth: AuthState,
}

impl ErrorAdapter {
    pub fn new(provider: Provider, error: &ProviderError) -> Self {
        Self {
            provider,
            code: error.code(),
            message: error.message().to_string(),
            auth: AuthState::new(provider),
        }
    }

    fn error(&self) -> ProviderError {
        ProviderError::new(self.code, self.message.clone()).with_provider(self.provider)
    }
}

impl CalendarAdapter for ErrorAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move {
            self.auth.mark_failed(self.message.clone());
            Err(self.error())
        })
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn logout(&self) {}

    fn fetch_events(&self, _range: DateRange) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn fetch_tasks(&self) -> BoxFuture<'_, ProviderResult<Vec<Task>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn calendar_info_builder() {
        let info = CalendarInfo::new("cal-1", "Team")
            .with_owner("boss@example.com")
            .with_shared(true)
            .with_color("#ff0000");
        assert_eq!(info.owner_id, "boss@example.com");
        assert!(info.is_shared);
        assert_eq!(info.color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn require_auth_rejects_without_io() {
        let state = AuthState::new(Provider::Outlook);
        let err = require_auth(&state, Provider::Outlook).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotAuthenticated);
        state.mark_authenticated();
        assert!(require_auth(&state, Provider::Outlook).is_ok());
    }

    #[tokio::test]
    async fn error_adapter_always_fails() {
        let adapter = ErrorAdapter::new(
            Provider::Apple,
            &ProviderError::configuration("missing password"),
        );
        let mut rx = adapter.subscribe_auth();
        assert!(!adapter.is_authenticated());

        let err = adapter.authenticate().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Configuration);
        assert!(matches!(
            rx.try_recv().unwrap(),
            AuthEvent::AuthenticationFailed { provider: Provider::Apple, .. }
        ));

        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(adapter.fetch_events(DateRange::single_day(day)).await.is_err());
        assert!(adapter.fetch_tasks().await.is_err());
        assert!(adapter.fetch_shared_calendars().await.unwrap().is_empty());
    }
}
