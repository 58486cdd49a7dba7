//! Client configuration.
//!
//! Everything lives in one `config.toml`, by default
//! `~/.config/unical/config.toml`. A provider is enabled by the presence of
//! its section:
//!
//! ```toml
//! [google]
//! access_token = "pass::google/unical"
//! calendar_ids = ["primary", "team@example.com"]
//!
//! [outlook]
//! access_token = "env::GRAPH_TOKEN"
//!
//! [apple]
//! username = "me@icloud.com"
//! password = "pass::icloud/app-password"
//!
//! [sync]
//! interval_minutes = 15
//! ```
//!
//! Credential values accept secret references (see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use unical_sync::SyncConfig;

#[cfg(any(feature = "google", feature = "outlook", feature = "caldav"))]
use crate::secret;

/// Configuration for the `unical` CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[cfg(feature = "google")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleSettings>,

    #[cfg(feature = "outlook")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlook: Option<OutlookSettings>,

    #[cfg(feature = "caldav")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple: Option<AppleSettings>,

    pub sync: SyncSettings,
}

impl ClientConfig {
    /// Loads the default file, or defaults if it does not exist.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse config: {e}"))
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("unical")
            .join("config.toml")
    }

    /// True when no provider section is present.
    pub fn has_no_providers(&self) -> bool {
        let mut none = true;
        #[cfg(feature = "google")]
        {
            none &= self.google.is_none();
        }
        #[cfg(feature = "outlook")]
        {
            none &= self.outlook.is_none();
        }
        #[cfg(feature = "caldav")]
        {
            none &= self.apple.is_none();
        }
        none
    }
}

/// `[sync]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Auto-sync period used by `unical watch`.
    pub interval_minutes: u64,
    pub months_back: u32,
    pub months_ahead: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_minutes: SyncConfig::DEFAULT_INTERVAL_SECS / 60,
            months_back: 1,
            months_ahead: 1,
        }
    }
}

impl SyncSettings {
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_auto_sync_interval(Duration::from_secs(self.interval_minutes * 60))
            .with_window(self.months_back, self.months_ahead)
    }
}

/// `[google]`
#[cfg(feature = "google")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSettings {
    /// OAuth access token (supports `pass::` and `env::`).
    pub access_token: String,

    #[serde(default = "default_calendar_ids")]
    pub calendar_ids: Vec<String>,

    pub owner: Option<String>,

    pub timeout_secs: Option<u64>,
}

#[cfg(feature = "google")]
fn default_calendar_ids() -> Vec<String> {
    vec!["primary".to_string()]
}

#[cfg(feature = "google")]
impl GoogleSettings {
    pub fn token(&self) -> Result<String, String> {
        secret::resolve(&self.access_token)
    }

    pub fn to_provider_config(&self) -> unical_providers::GoogleConfig {
        let mut config =
            unical_providers::GoogleConfig::new().with_calendar_ids(self.calendar_ids.clone());
        if let Some(owner) = &self.owner {
            config = config.with_owner(owner);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// `[outlook]`
#[cfg(feature = "outlook")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlookSettings {
    /// Microsoft Graph access token (supports `pass::` and `env::`).
    pub access_token: String,

    pub owner: Option<String>,

    pub timeout_secs: Option<u64>,
}

#[cfg(feature = "outlook")]
impl OutlookSettings {
    pub fn token(&self) -> Result<String, String> {
        secret::resolve(&self.access_token)
    }

    pub fn to_provider_config(&self) -> unical_providers::OutlookConfig {
        let mut config = unical_providers::OutlookConfig::new();
        if let Some(owner) = &self.owner {
            config = config.with_owner(owner);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// `[apple]`
#[cfg(feature = "caldav")]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleSettings {
    /// Defaults to iCloud.
    pub server_url: Option<String>,
    pub username: String,
    /// App-specific password (supports `pass::` and `env::`).
    pub password: String,
    pub calendar_home: Option<String>,
    pub event_collections: Vec<String>,
    pub task_collections: Vec<String>,
    pub owner: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[cfg(feature = "caldav")]
impl AppleSettings {
    /// Builds the adapter config, resolving the password reference.
    pub fn to_provider_config(&self) -> Result<unical_providers::CalDavConfig, String> {
        let password = secret::resolve(&self.password)?;
        let mut config = unical_providers::CalDavConfig::new()
            .with_credentials(&self.username, password)
            .with_event_collections(self.event_collections.clone())
            .with_task_collections(self.task_collections.clone());
        if let Some(url) = &self.server_url {
            config = config.with_server_url(url);
        }
        if let Some(home) = &self.calendar_home {
            config = config.with_calendar_home(home);
        }
        if let Some(owner) = &self.owner {
            config = config.with_owner(owner);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert!(config.has_no_providers());
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(
            config.sync.to_sync_config().auto_sync_interval,
            Duration::from_secs(15 * 60)
        );
    }

    #[test]
    fn sync_section() {
        let config = ClientConfig::parse(
            r#"
            [sync]
            interval_minutes = 5
            months_back = 2
            "#,
        )
        .unwrap();
        let sync = config.sync.to_sync_config();
        assert_eq!(sync.auto_sync_interval, Duration::from_secs(300));
        assert_eq!(sync.months_back, 2);
        assert_eq!(sync.months_ahead, 1);
    }

    #[test]
    fn zero_interval_keeps_default() {
        let config = ClientConfig::parse("[sync]\ninterval_minutes = 0\n").unwrap();
        assert_eq!(
            config.sync.to_sync_config().auto_sync_interval,
            Duration::from_secs(SyncConfig::DEFAULT_INTERVAL_SECS)
        );
    }

    #[cfg(feature = "google")]
    #[test]
    fn google_section() {
        let config = ClientConfig::parse(
            r#"
            [google]
            access_token = "abc"
            owner = "me@example.com"
            "#,
        )
        .unwrap();
        let google = config.google.as_ref().unwrap();
        assert_eq!(google.calendar_ids, vec!["primary".to_string()]);
        assert_eq!(google.token().unwrap(), "abc");
        let provider = google.to_provider_config();
        assert_eq!(provider.owner_id.as_deref(), Some("me@example.com"));
        assert!(!config.has_no_providers());
    }

    #[cfg(feature = "caldav")]
    #[test]
    fn apple_section() {
        let config = ClientConfig::parse(
            r#"
            [apple]
            username = "me@icloud.com"
            password = "app-pass"
            event_collections = ["https://caldav.example.com/cal/home/"]
            "#,
        )
        .unwrap();
        let apple = config.apple.unwrap().to_provider_config().unwrap();
        assert!(apple.has_credentials());
        assert_eq!(apple.owner(), "me@icloud.com");
        assert_eq!(apple.event_collections.len(), 1);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nmonths_ahead = 3").unwrap();
        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.sync.months_ahead, 3);
    }

    #[test]
    fn bad_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync\ninterval_minutes = ").unwrap();
        let err = ClientConfig::load_from(file.path()).unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[test]
    fn default_path_ends_in_unical() {
        let path = ClientConfig::default_path();
        assert!(path.ends_with("unical/config.toml"));
    }
}
