//! Builds the orchestrator and adapters from a [`ClientConfig`].
//!
//! A provider section that cannot be turned into a working adapter (bad
//! URL, unresolvable secret) still registers an [`ErrorAdapter`], so the
//! problem shows up as an authentication failure for that provider alone.

use std::sync::Arc;

use tracing::{debug, warn};
use unical_core::{AggregateStore, Provider};
use unical_providers::{CalendarAdapter, ErrorAdapter, ProviderError, ProviderResult};
use unical_sync::SyncOrchestrator;

use crate::config::ClientConfig;

/// Creates every configured adapter, unauthenticated.
pub fn build_adapters(config: &ClientConfig) -> Vec<Arc<dyn CalendarAdapter>> {
    let mut adapters: Vec<Arc<dyn CalendarAdapter>> = Vec::new();

    #[cfg(feature = "google")]
    if let Some(google) = &config.google {
        adapters.push(or_error(Provider::Google, build_google(google)));
    }

    #[cfg(feature = "outlook")]
    if let Some(outlook) = &config.outlook {
        adapters.push(or_error(Provider::Outlook, build_outlook(outlook)));
    }

    #[cfg(feature = "caldav")]
    if let Some(apple) = &config.apple {
        adapters.push(or_error(Provider::Apple, build_apple(apple)));
    }

    adapters
}

/// Builds the orchestrator and registers every configured adapter, without
/// authenticating. Subscribe to auth events before [`authenticate_all`] to
/// see the initial outcome of each adapter.
pub fn register(config: &ClientConfig) -> SyncOrchestrator {
    let orchestrator =
        SyncOrchestrator::new(AggregateStore::new(), config.sync.to_sync_config());
    for adapter in build_adapters(config) {
        orchestrator.register_adapter(adapter);
    }
    orchestrator
}

/// Authenticates every registered adapter, in provider order.
///
/// Failures are logged and leave that adapter out of sync cycles; they never
/// fail the whole setup.
pub async fn authenticate_all(orchestrator: &SyncOrchestrator) {
    for provider in orchestrator.providers() {
        let Some(adapter) = orchestrator.adapter(provider) else {
            continue;
        };
        match adapter.authenticate().await {
            Ok(()) => debug!(%provider, "adapter ready"),
            Err(e) => warn!(%provider, error = %e, "authentication failed"),
        }
    }
}

/// [`register`] followed by [`authenticate_all`].
pub async fn connect(config: &ClientConfig) -> SyncOrchestrator {
    let orchestrator = register(config);
    authenticate_all(&orchestrator).await;
    orchestrator
}

fn or_error<A>(provider: Provider, built: ProviderResult<A>) -> Arc<dyn CalendarAdapter>
where
    A: CalendarAdapter + 'static,
{
    match built {
        Ok(adapter) => Arc::new(adapter),
        Err(e) => {
            warn!(%provider, error = %e, "adapter configuration rejected");
            Arc::new(ErrorAdapter::new(provider, &e))
        }
    }
}

#[cfg(feature = "google")]
fn build_google(
    settings: &crate::config::GoogleSettings,
) -> ProviderResult<unical_providers::GoogleAdapter> {
    let token = settings.token().map_err(ProviderError::configuration)?;
    unical_providers::GoogleAdapter::new(
        settings.to_provider_config(),
        Box::new(unical_providers::StaticToken::new(token)),
    )
}

#[cfg(feature = "outlook")]
fn build_outlook(
    settings: &crate::config::OutlookSettings,
) -> ProviderResult<unical_providers::OutlookAdapter> {
    let token = settings.token().map_err(ProviderError::configuration)?;
    unical_providers::OutlookAdapter::new(
        settings.to_provider_config(),
        Box::new(unical_providers::StaticToken::new(token)),
    )
}

#[cfg(feature = "caldav")]
fn build_apple(
    settings: &crate::config::AppleSettings,
) -> ProviderResult<unical_providers::AppleAdapter> {
    let config = settings
        .to_provider_config()
        .map_err(ProviderError::configuration)?;
    unical_providers::AppleAdapter::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sections_no_adapters() {
        let config = ClientConfig::default();
        assert!(build_adapters(&config).is_empty());
    }

    #[cfg(feature = "google")]
    #[test]
    fn unresolvable_secret_becomes_error_adapter() {
        let config = ClientConfig::parse(
            r#"
            [google]
            access_token = "env::_UNICAL_MISSING_TOKEN_4242"
            "#,
        )
        .unwrap();
        let adapters = build_adapters(&config);
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].provider(), Provider::Google);
        assert!(!adapters[0].is_authenticated());
    }

    #[cfg(feature = "google")]
    #[tokio::test]
    async fn error_adapter_fails_authentication() {
        let config = ClientConfig::parse(
            r#"
            [google]
            access_token = "t"
            calendar_ids = []
            "#,
        )
        .unwrap();
        let orchestrator = connect(&config).await;
        let adapter = orchestrator.adapter(Provider::Google).unwrap();
        assert!(!adapter.is_authenticated());
        assert!(orchestrator.sync_platform(Provider::Google).await.is_err());
    }

    #[cfg(feature = "google")]
    #[tokio::test]
    async fn initial_auth_outcome_reaches_subscribers() {
        use std::time::Duration;
        use unical_providers::AuthEvent;

        let config = ClientConfig::parse(
            r#"
            [google]
            access_token = "t"
            calendar_ids = []
            "#,
        )
        .unwrap();
        let orchestrator = register(&config);
        let mut auth = orchestrator.subscribe_auth();
        authenticate_all(&orchestrator).await;

        let event = tokio::time::timeout(Duration::from_secs(1), auth.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            AuthEvent::AuthenticationFailed {
                provider: Provider::Google,
                ..
            }
        ));
    }
}
