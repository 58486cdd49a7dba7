//! Outlook adapter configuration.

use std::time::Duration;

/// Configuration for the Microsoft Graph adapter.
#[derive(Debug, Clone)]
pub struct OutlookConfig {
    /// Owner recorded on entities without an organizer.
    pub owner_id: Option<String>,
    pub timeout: Duration,
    /// Base URL of Graph, without trailing slash.
    pub api_base: String,
    /// `$top` sent to list endpoints.
    pub page_size: u32,
}

impl Default for OutlookConfig {
    fn default() -> Self {
        Self {
            owner_id: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            api_base: Self::GRAPH_API_BASE.to_string(),
            page_size: 100,
        }
    }
}

impl OutlookConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const GRAPH_API_BASE: &'static str = "https://graph.microsoft.com/v1.0";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.api_base)
            .map_err(|e| format!("invalid API base {}: {e}", self.api_base))?;
        if self.page_size == 0 {
            return Err("page size must be greater than zero".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
