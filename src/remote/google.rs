//! Shared HTTP plumbing for the Google REST clients.

use crate::config::GoogleConfig;
use crate::error::RemoteError;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Authenticated HTTP client shared by the Sheets and Drive clients.
pub struct ApiClient {
    http: Client,
    config: GoogleConfig,
}

impl ApiClient {
    pub fn new(config: GoogleConfig) -> Result<Self, RemoteError> {
        // Resumable uploads answer 308 without a Location header.
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("facesheet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// `base` joined with percent-encoded path `segments`.
    pub fn url(&self, base: &str, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(base)
            .map_err(|e| RemoteError::Transport(format!("bad base URL '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("base URL '{base}' cannot have a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.http.get(url).bearer_auth(&self.config.access_token)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.http.post(url).bearer_auth(&self.config.access_token)
    }

    pub fn put(&self, url: Url) -> RequestBuilder {
        self.http.put(url).bearer_auth(&self.config.access_token)
    }

    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.http.delete(url).bearer_auth(&self.config.access_token)
    }

    /// Send and deserialise a JSON body, mapping non-2xx to [`RemoteError::Http`].
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = check(request.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Pass 2xx responses through; turn anything else into [`RemoteError::Http`].
pub async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), "remote call failed: {}", body);
    Err(RemoteError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Quote a literal for a Drive `q` expression.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
