//! Authenticated REST client for a Databricks workspace.

use std::sync::Arc;
use std::time::Duration;

use lakedash_core::config::DatabricksConfig;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::auth::{Credentials, TokenSource};
use crate::error::WarehouseError;

/// Upper bound on establishing a TCP/TLS connection to the workspace.
/// Whole-request bounds come from the caller's query timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over `reqwest` that knows the workspace URL and how to
/// authenticate. Cheap to clone; clones share the HTTP pool and token cache.
#[derive(Clone)]
pub struct WorkspaceClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenSource>,
}

impl WorkspaceClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: Arc::new(TokenSource::new(credentials)),
        }
    }

    pub fn from_config(config: &DatabricksConfig) -> Result<Self, WarehouseError> {
        let base_url = config.base_url()?;
        let credentials = Credentials::from_config(config)?;
        Ok(Self::new(base_url, credentials))
    }

    /// Same workspace, different identity (used for forwarded user tokens).
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            tokens: Arc::new(TokenSource::new(Credentials::Token(token.into()))),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, WarehouseError> {
        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| WarehouseError::Connection(format!("invalid workspace URL: {}", e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WarehouseError> {
        self.get_with_headers(path, query).await.map(|(body, _)| body)
    }

    /// GET returning the decoded body together with the response headers.
    pub async fn get_with_headers<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<(T, HeaderMap), WarehouseError> {
        let url = self.url(path, query)?;
        debug!(url = %url, "GET");
        self.send(self.http.get(url)).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, WarehouseError> {
        let url = self.url(path, &[])?;
        debug!(url = %url, "POST");
        self.send(self.http.post(url).json(body)).await.map(|(body, _)| body)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<(T, HeaderMap), WarehouseError> {
        let token = self.tokens.bearer(&self.http, &self.base_url).await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(WarehouseError::from_transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(WarehouseError::from_transport)?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        // Some endpoints (cancel, delete) answer with an empty body.
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        let body = serde_json::from_str(text)?;
        Ok((body, headers))
    }
}

/// Append `segment` to `path` as a single percent-encoded path segment, so
/// names containing `/`, `?` or `#` address one resource.
pub fn segment_path(path: &str, segment: &str) -> Result<String, WarehouseError> {
    let mut url = Url::parse("http://workspace.invalid")
        .and_then(|base| base.join(path))
        .map_err(|e| WarehouseError::Connection(format!("invalid API path {}: {}", path, e)))?;
    url.path_segments_mut()
        .map_err(|_| WarehouseError::Connection(format!("invalid API path {}", path)))?
        .pop_if_empty()
        .push(segment);
    Ok(url.path().to_string())
}

/// Pull `message` out of a Databricks error payload, falling back to the raw body.
pub(crate) fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn classify_status(status: StatusCode, body: &str) -> WarehouseError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => WarehouseError::Connection(format!(
            "authentication failed ({}): {}",
            status.as_u16(),
            api_message(body)
        )),
        _ => WarehouseError::Api {
            status: status.as_u16(),
            body: api_message(body),
        },
    }
}
