//! Workspace credentials: personal access tokens and OAuth machine-to-machine.

use std::time::{Duration, Instant};

use lakedash_core::config::DatabricksConfig;
use lakedash_core::ConfigError;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::WarehouseError;

/// Refresh OAuth tokens this long before they actually expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub enum Credentials {
    /// Personal access token (or a forwarded user token).
    Token(String),
    /// Service principal credentials exchanged at `/oidc/v1/token`.
    OAuthM2m {
        client_id: String,
        client_secret: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Credentials::Token(***)"),
            Credentials::OAuthM2m { client_id, .. } => {
                write!(f, "Credentials::OAuthM2m {{ client_id: {} }}", client_id)
            }
        }
    }
}

impl Credentials {
    /// Pick credentials from config: a token wins over client credentials.
    pub fn from_config(config: &DatabricksConfig) -> Result<Self, ConfigError> {
        if let Some(token) = &config.token {
            return Ok(Credentials::Token(token.clone()));
        }
        match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => Ok(Credentials::OAuthM2m {
                client_id: id.clone(),
                client_secret: secret.clone(),
            }),
            _ => Err(ConfigError::MissingCredentials),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Hands out bearer tokens, exchanging and caching OAuth tokens as needed.
pub(crate) struct TokenSource {
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub(crate) fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub(crate) async fn bearer(
        &self,
        http: &reqwest::Client,
        base_url: &str,
    ) -> Result<String, WarehouseError> {
        let (client_id, client_secret) = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::OAuthM2m { client_id, client_secret } => (client_id, client_secret),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!("{}/oidc/v1/token", base_url);
        debug!(url = %url, client_id = %client_id, "Requesting OAuth token");

        let response = http
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")])
            .send()
            .await
            .map_err(WarehouseError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Connection(format!(
                "OAuth token request failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(WarehouseError::from_transport)?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        info!(expires_in_s = lifetime.as_secs(), "OAuth token acquired");

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        });
        Ok(access_token)
    }
}
