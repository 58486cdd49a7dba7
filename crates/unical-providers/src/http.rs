//! HTTP plumbing shared by the REST and CalDAV adapters.

use std::time::Duration;

use reqwest::{Response, StatusCode};
#[cfg(any(feature = "google", feature = "outlook"))]
use serde::de::DeserializeOwned;
use unical_core::Provider;

use crate::error::{ProviderError, ProviderResult};

/// Builds a client with the adapter's request timeout.
pub(crate) fn build_client(timeout: Duration) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("unical/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::configuration("failed to create HTTP client").with_source(e))
}

/// Maps a failed send into a transport error.
pub(crate) fn send_error(provider: Provider, err: reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        "request timeout".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    };
    ProviderError::transport(message)
        .with_provider(provider)
        .with_source(err)
}

/// Maps a non-success status into an error.
pub(crate) fn error_for_status(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED => ProviderError::authentication("credentials expired or invalid"),
        StatusCode::FORBIDDEN => ProviderError::authentication("access denied"),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {s} seconds"))
                .unwrap_or_default()
        )),
        s if s.is_server_error() => ProviderError::server(format!("server error ({s})")),
        s => ProviderError::invalid_response(format!("request rejected ({s}): {}", truncate(body))),
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Passes successful responses through and turns the rest into errors.
pub(crate) async fn check_status(provider: Provider, response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() || status == StatusCode::MULTI_STATUS {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status, retry_after, &body).with_provider(provider))
}

/// Reads the body as text.
pub(crate) async fn read_text(provider: Provider, response: Response) -> ProviderResult<String> {
    response.text().await.map_err(|e| {
        ProviderError::transport(format!("failed to read response: {e}"))
            .with_provider(provider)
            .with_source(e)
    })
}

/// Reads the body and parses it as JSON.
#[cfg(any(feature = "google", feature = "outlook"))]
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    response: Response,
) -> ProviderResult<T> {
    let body = read_text(provider, response).await?;
    parse_json(provider, &body)
}

#[cfg(any(feature = "google", feature = "outlook"))]
pub(crate) fn parse_json<T: DeserializeOwned>(provider: Provider, body: &str) -> ProviderResult<T> {
    serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {e}"))
            .with_provider(provider)
            .with_source(e)
    })
}
