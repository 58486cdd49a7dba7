//! Authentication state shared by every adapter.
//!
//! Credential acquisition itself (OAuth consent screens, keychain prompts)
//! happens outside unical. Adapters receive a [`TokenSource`] and only track
//! whether the credentials it hands out are currently accepted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, warn};
use unical_core::Provider;

use crate::adapter::BoxFuture;
use crate::error::ProviderResult;

#[cfg(any(feature = "google", feature = "outlook"))]
use std::future::Future;
#[cfg(any(feature = "google", feature = "outlook"))]
use std::sync::{PoisonError, RwLock};
#[cfg(any(feature = "google", feature = "outlook"))]
use tracing::info;
#[cfg(any(feature = "google", feature = "outlook"))]
use crate::error::{ProviderError, ProviderErrorCode};

const AUTH_CHANNEL_CAPACITY: usize = 16;

/// An authentication state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    Authenticated(Provider),
    AuthenticationFailed { provider: Provider, reason: String },
    LoggedOut(Provider),
}

impl AuthEvent {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Authenticated(p) | Self::LoggedOut(p) => *p,
            Self::AuthenticationFailed { provider, .. } => *provider,
        }
    }
}

/// Cached authentication flag plus a channel announcing transitions.
#[derive(Debug)]
pub struct AuthState {
    provider: Provider,
    authenticated: AtomicBool,
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthState {
    pub fn new(provider: Provider) -> Self {
        let (sender, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Self {
            provider,
            authenticated: AtomicBool::new(false),
            sender,
        }
    }

    /// Current cached state. Never performs I/O.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Records a successful authentication.
    pub fn mark_authenticated(&self) {
        self.authenticated.store(true, Ordering::SeqCst);
        debug!(provider = %self.provider, "authenticated");
        let _ = self.sender.send(AuthEvent::Authenticated(self.provider));
    }

    /// Records a rejected authentication attempt.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.authenticated.store(false, Ordering::SeqCst);
        warn!(provider = %self.provider, %reason, "authentication failed");
        let _ = self.sender.send(AuthEvent::AuthenticationFailed {
            provider: self.provider,
            reason,
        });
    }

    /// Forgets the authenticated state. Announces `LoggedOut` only if the
    /// adapter was authenticated.
    pub fn clear(&self) {
        if self.authenticated.swap(false, Ordering::SeqCst) {
            let _ = self.sender.send(AuthEvent::LoggedOut(self.provider));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}

/// Supplies bearer tokens to the HTTP adapters.
pub trait TokenSource: Send + Sync {
    /// Returns a currently valid access token.
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>>;

    /// Drops any cached token. Called on logout.
    fn invalidate(&self) {}
}

/// A fixed token, typically read from configuration.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
        let token = self.0.clone();
        Box::pin(async move { Ok(token) })
    }
}

/// Bearer-token bookkeeping shared by the REST adapters.
#[cfg(any(feature = "google", feature = "outlook"))]
pub(crate) struct BearerSession {
    provider: Provider,
    source: Box<dyn TokenSource>,
    token: RwLock<Option<String>>,
    state: AuthState,
}

#[cfg(any(feature = "google", feature = "outlook"))]
impl BearerSession {
    pub(crate) fn new(provider: Provider, source: Box<dyn TokenSource>) -> Self {
        Self {
            provider,
            source,
            token: RwLock::new(None),
            state: AuthState::new(provider),
        }
    }

    pub(crate) fn state(&self) -> &AuthState {
        &self.state
    }

    /// Obtains a token and checks it with `verify`. Ends in exactly one of
    /// `Authenticated` or `AuthenticationFailed`.
    pub(crate) async fn authenticate<F, Fut>(&self, verify: F) -> ProviderResult<()>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ProviderResult<String>>,
    {
        let result = match self.source.access_token().await {
            Ok(token) => verify(token).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(token) => {
                *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
                self.state.mark_authenticated();
                info!(provider = %self.provider, "account authenticated");
                Ok(())
            }
            Err(e) => {
                self.state.mark_failed(e.message());
                Err(e.with_provider(self.provider))
            }
        }
    }

    /// The cached token, or `NotAuthenticated` without touching the network.
    pub(crate) async fn token(&self) -> ProviderResult<String> {
        if !self.state.is_authenticated() {
            return Err(ProviderError::not_authenticated().with_provider(self.provider));
        }
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderError::not_authenticated().with_provider(self.provider))
    }

    /// Tags errors with the provider and drops the authenticated state
    /// when the provider rejects the token.
    pub(crate) fn observe<T>(&self, result: ProviderResult<T>) -> ProviderResult<T> {
        result.map_err(|e| {
            if e.code() == ProviderErrorCode::AuthenticationFailed {
                self.state.mark_failed(e.message());
            }
            e.with_provider(self.provider)
        })
    }

    pub(crate) fn logout(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.source.invalidate();
        self.state.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_announced() {
        let state = AuthState::new(Provider::Google);
        let mut rx = state.subscribe();

        state.mark_authenticated();
        assert!(state.is_authenticated());
        state.clear();
        assert!(!state.is_authenticated());
        state.mark_failed("bad token");

        assert_eq!(rx.try_recv().unwrap(), AuthEvent::Authenticated(Provider::Google));
        assert_eq!(rx.try_recv().unwrap(), AuthEvent::LoggedOut(Provider::Google));
        assert_eq!(
            rx.try_recv().unwrap(),
            AuthEvent::AuthenticationFailed {
                provider: Provider::Google,
                reason: "bad token".into()
            }
        );
    }

    #[test]
    fn clear_when_logged_out_is_silent() {
        let state = AuthState::new(Provider::Apple);
        let mut rx = state.subscribe();
        state.clear();
        assert!(rx.try_recv().is_err());
    }

    #[cfg(any(feature = "google", feature = "outlook"))]
    #[tokio::test]
    async fn session_authenticates_through_verifier() {
        let session = BearerSession::new(Provider::Outlook, Box::new(StaticToken::new("abc")));
        let mut rx = session.state().subscribe();
        assert_eq!(
            session.token().await.unwrap_err().code(),
            ProviderErrorCode::NotAuthenticated
        );

        session.authenticate(|t| async move { Ok(t) }).await.unwrap();
        assert_eq!(session.token().await.unwrap(), "abc");
        assert_eq!(rx.try_recv().unwrap(), AuthEvent::Authenticated(Provider::Outlook));

        session.logout();
        assert!(session.token().await.is_err());
        assert_eq!(rx.try_recv().unwrap(), AuthEvent::LoggedOut(Provider::Outlook));
    }

    #[cfg(any(feature = "google", feature = "outlook"))]
    #[tokio::test]
    async fn session_rejection_marks_failed() {
        let session = BearerSession::new(Provider::Google, Box::new(StaticToken::new("abc")));
        let mut rx = session.state().subscribe();
        let err = session
            .authenticate(|_| async { Err(ProviderError::authentication("revoked")) })
            .await
            .unwrap_err();
        assert_eq!(err.provider(), Some(Provider::Google));
        assert!(matches!(
            rx.try_recv().unwrap(),
            AuthEvent::AuthenticationFailed { .. }
        ));
        assert!(!session.state().is_authenticated());
    }

    #[cfg(any(feature = "google", feature = "outlook"))]
    #[tokio::test]
    async fn observe_drops_auth_on_rejection() {
        let session = BearerSession::new(Provider::Google, Box::new(StaticToken::new("abc")));
        session.authenticate(|t| async move { Ok(t) }).await.unwrap();
        let result: ProviderResult<()> =
            session.observe(Err(ProviderError::authentication("expired")));
        assert_eq!(result.unwrap_err().provider(), Some(Provider::Google));
        assert!(!session.state().is_authenticated());
    }

    #[cfg(any(feature = "google", feature = "outlook"))]
    #[tokio::test]
    async fn logout_waits_for_readers_then_drops_token() {
        use std::sync::{Arc, mpsc};
        use std::time::Duration;

        let session = Arc::new(BearerSession::new(
            Provider::Google,
            Box::new(StaticToken::new("abc")),
        ));
        session.authenticate(|t| async move { Ok(t) }).await.unwrap();

        let (held, wait) = mpsc::channel();
        let reader = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || {
                let guard = session.token.read().unwrap();
                held.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
                drop(guard);
            })
        };
        wait.recv().unwrap();
        session.logout();
        reader.join().unwrap();

        session.state().mark_authenticated();
        assert_eq!(
            session.token().await.unwrap_err().code(),
            ProviderErrorCode::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn static_token_returns_value() {
        let token = StaticToken::new("abc");
        assert_eq!(token.access_token().await.unwrap(), "abc");
        assert_eq!(format!("{token:?}"), "StaticToken(***)");
    }
}
