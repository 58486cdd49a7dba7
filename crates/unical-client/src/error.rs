//! Client error types.

use std::fmt;

use unical_sync::SyncError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug)]
pub enum ClientError {
    /// Configuration file missing, unreadable or invalid.
    Config(String),
    /// An adapter could not be built or authenticated.
    Provider(String),
    /// A sync could not start.
    Sync(SyncError),
    /// Bad command-line arguments.
    Usage(String),
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Provider(msg) => write!(f, "provider error: {msg}"),
            Self::Sync(err) => write!(f, "sync error: {err}"),
            Self::Usage(msg) => write!(f, "invalid arguments: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<SyncError> for ClientError {
    fn from(err: SyncError) -> Self {
        Self::Sync(err)
    }
}

impl From<unical_providers::ProviderError> for ClientError {
    fn from(err: unical_providers::ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}
