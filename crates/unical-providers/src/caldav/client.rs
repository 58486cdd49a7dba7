//! WebDAV transport: PROPFIND and REPORT with Basic credentials.

use base64::Engine;
use reqwest::Method;
use tracing::trace;
use unical_core::Provider;
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::http;

use super::config::CalDavConfig;

const PROVIDER: Provider = Provider::Apple;

/// Builds an HTTP Basic `Authorization` value.
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

pub(crate) struct CalDavClient {
    http: reqwest::Client,
    base: Url,
    authorization: Option<String>,
}

impl std::fmt::Debug for CalDavClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl CalDavClient {
    pub(crate) fn new(config: &CalDavConfig) -> ProviderResult<Self> {
        let base = Url::parse(&config.server_url).map_err(|e| {
            ProviderError::configuration(format!("invalid server URL: {e}")).with_provider(PROVIDER)
        })?;
        let authorization = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some(basic_auth(user, pass)),
            _ => None,
        };
        Ok(Self {
            http: http::build_client(config.timeout)?,
            base,
            authorization,
        })
    }

    pub(crate) fn base(&self) -> &str {
        self.base.as_str()
    }

    /// Resolves a server-relative href against the server URL.
    pub(crate) fn resolve(&self, href: &str) -> ProviderResult<String> {
        self.base.join(href).map(String::from).map_err(|e| {
            ProviderError::invalid_response(format!("unusable href {href}: {e}"))
                .with_provider(PROVIDER)
        })
    }

    pub(crate) async fn propfind(&self, url: &str, body: &str, depth: u8) -> ProviderResult<String> {
        self.request("PROPFIND", url, body, depth).await
    }

    pub(crate) async fn report(&self, url: &str, body: &str) -> ProviderResult<String> {
        self.request("REPORT", url, body, 1).await
    }

    async fn request(&self, method: &str, url: &str, body: &str, depth: u8) -> ProviderResult<String> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| {
            ProviderError::internal(format!("invalid HTTP method: {method}")).with_provider(PROVIDER)
        })?;

        let mut request = self
            .http
            .request(method.clone(), url)
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", depth.to_string())
            .body(body.to_string());
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }

        trace!(%method, url, "sending caldav request");
        let response = request
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, e))?;
        let response = http::check_status(PROVIDER, response).await?;
        http::read_text(PROVIDER, response).await
    }
}
