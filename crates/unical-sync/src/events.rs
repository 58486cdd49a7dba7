//! Sync lifecycle signals.

use chrono::{DateTime, Utc};
use serde::Serialize;
use unical_core::Provider;

/// A sync lifecycle notification.
///
/// `Progress` is advisory. Only `Completed` marks the end of a cycle, and
/// it fires exactly once per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Started,
    Progress { provider: Provider, percent: u8 },
    Completed { at: DateTime<Utc> },
    Error { provider: Provider, message: String },
}

impl SyncEvent {
    pub(crate) fn error(provider: Provider, message: impl std::fmt::Display) -> Self {
        Self::Error {
            provider,
            message: format!("{provider}: {message}"),
        }
    }
}

/// What one completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Adapters that were dispatched.
    pub adapters: usize,
    /// Fetch operations issued, two per adapter.
    pub operations: usize,
    pub events: usize,
    pub tasks: usize,
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_prefixed() {
        let event = SyncEvent::error(Provider::Outlook, "request timeout");
        assert_eq!(
            event,
            SyncEvent::Error {
                provider: Provider::Outlook,
                message: "outlook: request timeout".into()
            }
        );
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_string(&SyncEvent::Progress {
            provider: Provider::Google,
            percent: 50,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"progress","provider":"google","percent":50}"#);
    }
}
