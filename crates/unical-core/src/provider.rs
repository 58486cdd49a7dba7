//! Provider tags and entity identity.
//!
//! Every stored entity is identified by the pair `(id, Provider)`: the same
//! id coming from two different providers names two distinct entities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The external calendar system an entity originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Calendar and Google Tasks.
    Google,
    /// Microsoft Outlook calendar and Microsoft To Do (Graph API).
    Outlook,
    /// Apple iCloud calendars and reminders (CalDAV).
    Apple,
}

impl Provider {
    /// All known providers, in display order.
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Outlook, Provider::Apple];

    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Outlook => "outlook",
            Self::Apple => "apple",
        }
    }

    /// Returns a human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Outlook => "Outlook",
            Self::Apple => "Apple",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "outlook" | "microsoft" => Ok(Self::Outlook),
            "apple" | "icloud" => Ok(Self::Apple),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// The identity key of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Provider-assigned identifier.
    pub id: String,
    /// Origin of the entity.
    pub provider: Provider,
}

impl EntityKey {
    /// Creates a new identity key.
    pub fn new(id: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            provider,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}
