//! `unical config`

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

pub fn path(config_path: &Path) -> ClientResult<()> {
    println!("config: {}", config_path.display());
    Ok(())
}

/// Prints the effective configuration. Secret references are printed as
/// written; inline secrets are masked.
pub fn dump(config: &ClientConfig, config_path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&masked(config))
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {e}")))?;
    println!("# config.toml ({})", config_path.display());
    println!("{toml_str}");
    Ok(())
}

/// Checks every provider section, resolving secret references.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    for line in check(config)? {
        println!("{line}");
    }
    println!("Configuration is valid.");
    Ok(())
}

fn check(config: &ClientConfig) -> ClientResult<Vec<String>> {
    let mut report = Vec::new();
    if config.has_no_providers() {
        report.push("No provider sections configured.".to_string());
    }

    #[cfg(feature = "google")]
    if let Some(google) = &config.google {
        google
            .token()
            .map_err(|e| ClientError::Config(format!("google access_token: {e}")))?;
        google
            .to_provider_config()
            .validate()
            .map_err(|e| ClientError::Config(format!("google: {e}")))?;
        report.push("google: ok".to_string());
    }

    #[cfg(feature = "outlook")]
    if let Some(outlook) = &config.outlook {
        outlook
            .token()
            .map_err(|e| ClientError::Config(format!("outlook access_token: {e}")))?;
        outlook
            .to_provider_config()
            .validate()
            .map_err(|e| ClientError::Config(format!("outlook: {e}")))?;
        report.push("outlook: ok".to_string());
    }

    #[cfg(feature = "caldav")]
    if let Some(apple) = &config.apple {
        let provider = apple
            .to_provider_config()
            .map_err(|e| ClientError::Config(format!("apple password: {e}")))?;
        if !provider.has_credentials() {
            return Err(ClientError::Config(
                "apple: username and password are required".to_string(),
            ));
        }
        provider
            .validate()
            .map_err(|e| ClientError::Config(format!("apple: {e}")))?;
        report.push("apple: ok".to_string());
    }

    let sync = config.sync.to_sync_config();
    report.push(format!(
        "sync: every {} min, window -{}/+{} months",
        sync.auto_sync_interval.as_secs() / 60,
        sync.months_back,
        sync.months_ahead
    ));
    Ok(report)
}

fn masked(config: &ClientConfig) -> ClientConfig {
    #[allow(unused_mut)]
    let mut config = config.clone();
    #[cfg(feature = "google")]
    if let Some(google) = config.google.as_mut() {
        google.access_token = mask(&google.access_token);
    }
    #[cfg(feature = "outlook")]
    if let Some(outlook) = config.outlook.as_mut() {
        outlook.access_token = mask(&outlook.access_token);
    }
    #[cfg(feature = "caldav")]
    if let Some(apple) = config.apple.as_mut() {
        apple.password = mask(&apple.password);
    }
    config
}

#[cfg(any(feature = "google", feature = "outlook", feature = "caldav"))]
fn mask(value: &str) -> String {
    if crate::secret::is_reference(value) {
        value.to_string()
    } else {
        "***".to_string()
    }
}
