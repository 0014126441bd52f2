use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub databricks: DatabricksConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LAKEDASH_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LAKEDASH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            databricks: DatabricksConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  databricks:  host={}, auth={}",
            self.databricks.host.as_deref().unwrap_or("(none)"),
            self.databricks.auth_kind()
        );
        tracing::info!(
            "  warehouse:   {}",
            self.databricks.warehouse_id.as_deref().unwrap_or("(auto-discover)")
        );
        tracing::info!("  timeouts:    query={}s", self.databricks.query_timeout_seconds);
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "databricks": {
                "host": self.databricks.host,
                "auth": self.databricks.auth_kind(),
                "warehouse_id": self.databricks.warehouse_id,
                "query_timeout_seconds": self.databricks.query_timeout_seconds,
                "configured": self.databricks.is_configured(),
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    /// Idle lifetime of a catalog browser session before it is swept.
    pub catalog_session_ttl_seconds: u64,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        // Databricks Apps injects DATABRICKS_APP_PORT; PORT is the local fallback.
        let port = profiled_env_opt(p, "DATABRICKS_APP_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| profiled_env_u16(p, "PORT", 8080));
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port,
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            catalog_session_ttl_seconds: profiled_env_u64(p, "CATALOG_SESSION_TTL_SECONDS", 1800),
        }
    }
}

// ── Databricks workspace ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabricksConfig {
    /// Workspace URL, e.g. `https://adb-123.4.azuredatabricks.net`.
    pub host: Option<String>,
    /// Personal access token.
    pub token: Option<String>,
    /// OAuth service principal (machine-to-machine) credentials.
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Pinned SQL warehouse; skips discovery when set.
    pub warehouse_id: Option<String>,
    pub query_timeout_seconds: u64,
}

impl DatabricksConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_opt(p, "DATABRICKS_HOST"),
            token: profiled_env_opt(p, "DATABRICKS_TOKEN"),
            client_id: profiled_env_opt(p, "DATABRICKS_CLIENT_ID"),
            client_secret: profiled_env_opt(p, "DATABRICKS_CLIENT_SECRET"),
            warehouse_id: profiled_env_opt(p, "DATABRICKS_WAREHOUSE_ID"),
            query_timeout_seconds: profiled_env_u64(p, "QUERY_TIMEOUT_SECONDS", 120),
        }
    }

    /// Workspace base URL with an `https://` scheme and no trailing slash.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let host = self.host.as_deref().ok_or(ConfigError::MissingHost)?;
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if host.starts_with("https://") || host.starts_with("http://") {
            Ok(host.to_string())
        } else {
            Ok(format!("https://{}", host))
        }
    }

    /// Which credential flavour will be used ("pat", "oauth-m2m" or "none").
    pub fn auth_kind(&self) -> &'static str {
        if self.token.is_some() {
            "pat"
        } else if self.client_id.is_some() && self.client_secret.is_some() {
            "oauth-m2m"
        } else {
            "none"
        }
    }

    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.auth_kind() != "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        let keys = [
            "LAKEDASH_PROFILE",
            "DATABRICKS_HOST",
            "DATABRICKS_TOKEN",
            "DATABRICKS_CLIENT_ID",
            "DATABRICKS_CLIENT_SECRET",
            "DATABRICKS_WAREHOUSE_ID",
            "DATABRICKS_APP_PORT",
            "PORT",
            "QUERY_TIMEOUT_SECONDS",
            "TEST_DATABRICKS_HOST",
            "TEST_DATABRICKS_WAREHOUSE_ID",
        ];
        for k in keys {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.catalog_session_ttl_seconds, 1800);
        assert_eq!(cfg.databricks.query_timeout_seconds, 120);
        assert!(cfg.databricks.warehouse_id.is_none());
        assert!(!cfg.databricks.is_configured());
        assert_eq!(cfg.databricks.auth_kind(), "none");
    }

    #[test]
    fn app_port_takes_precedence_over_port() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("PORT", "3000");
        assert_eq!(Config::for_profile("").server.port, 3000);

        env::set_var("DATABRICKS_APP_PORT", "8000");
        assert_eq!(Config::for_profile("").server.port, 8000);

        clear_env();
    }

    #[test]
    fn profiled_env_takes_precedence() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("DATABRICKS_WAREHOUSE_ID", "base");
        env::set_var("TEST_DATABRICKS_WAREHOUSE_ID", "pinned");

        let cfg = Config::for_profile("test");
        assert_eq!(cfg.profile, "TEST");
        assert_eq!(cfg.databricks.warehouse_id.as_deref(), Some("pinned"));

        let cfg = Config::for_profile("");
        assert_eq!(cfg.databricks.warehouse_id.as_deref(), Some("base"));

        clear_env();
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("DATABRICKS_WAREHOUSE_ID", "");
        let cfg = Config::for_profile("");
        assert!(cfg.databricks.warehouse_id.is_none());

        clear_env();
    }

    #[test]
    fn base_url_normalizes_scheme_and_slash() {
        let mut cfg = DatabricksConfig {
            host: Some("adb-1.2.azuredatabricks.net/".into()),
            token: None,
            client_id: None,
            client_secret: None,
            warehouse_id: None,
            query_timeout_seconds: 120,
        };
        assert_eq!(cfg.base_url().unwrap(), "https://adb-1.2.azuredatabricks.net");

        cfg.host = Some("http://localhost:9999".into());
        assert_eq!(cfg.base_url().unwrap(), "http://localhost:9999");

        cfg.host = None;
        assert!(matches!(cfg.base_url(), Err(ConfigError::MissingHost)));
    }

    #[test]
    fn auth_kind_prefers_token() {
        let cfg = DatabricksConfig {
            host: Some("h".into()),
            token: Some("dapi".into()),
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            warehouse_id: None,
            query_timeout_seconds: 1,
        };
        assert_eq!(cfg.auth_kind(), "pat");

        let m2m = DatabricksConfig { token: None, ..cfg.clone() };
        assert_eq!(m2m.auth_kind(), "oauth-m2m");
        assert!(m2m.is_configured());

        let half = DatabricksConfig { token: None, client_secret: None, ..cfg };
        assert_eq!(half.auth_kind(), "none");
    }

    #[test]
    fn redacted_summary_has_no_secrets() {
        let cfg = Config {
            profile: String::new(),
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8080,
                cors_origin: "*".into(),
                catalog_session_ttl_seconds: 60,
            },
            databricks: DatabricksConfig {
                host: Some("https://h".into()),
                token: Some("dapi-secret-value".into()),
                client_id: None,
                client_secret: None,
                warehouse_id: Some("w1".into()),
                query_timeout_seconds: 30,
            },
        };
        let text = cfg.redacted_summary().to_string();
        assert!(!text.contains("dapi-secret-value"));
        assert!(text.contains("\"pat\""));
        assert!(text.contains("w1"));
    }
}
