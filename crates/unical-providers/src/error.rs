//! Error types for adapter operations.

use std::fmt;

use thiserror::Error;
use unical_core::Provider;

/// The category of an adapter error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// An operation needing credentials was attempted before authenticating.
    NotAuthenticated,
    /// The credential flow was rejected, or credentials expired.
    AuthenticationFailed,
    /// Connection failure, timeout, DNS resolution.
    Transport,
    /// Too many requests.
    RateLimited,
    /// The provider answered with a 5xx status.
    Server,
    /// The response could not be parsed or had an unexpected shape.
    InvalidResponse,
    /// Missing or invalid adapter configuration.
    Configuration,
    /// Unexpected state inside the adapter.
    Internal,
}

impl ProviderErrorCode {
    /// Returns true if the operation may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::RateLimited | Self::Server)
    }

    /// Returns true for the authentication family of errors.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::AuthenticationFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Transport => "transport_error",
            Self::RateLimited => "rate_limited",
            Self::Server => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by a [`CalendarAdapter`](crate::CalendarAdapter).
///
/// Carries a code for programmatic handling, a reason string suitable for
/// the sync error signal, and optionally the provider and underlying cause.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    provider: Option<Provider>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    pub fn not_authenticated() -> Self {
        Self::new(ProviderErrorCode::NotAuthenticated, "not authenticated")
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Transport, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Server, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Configuration, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Internal, message)
    }

    /// Sets the provider this error came from.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// The reason string, without code or provider prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<Provider> {
        self.provider
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result alias for adapter operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
