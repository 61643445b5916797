use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::federation::GoogleConfig;

/// Access token lifetime used when `JWT_EXPIRATION` is missing or unparsable.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Which adapter backs the session store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    pub jwt_secret: String,
    /// Go-style duration string such as `24h` or `1h30m`.
    #[serde(default)]
    pub jwt_expiration: String,

    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: String,
    #[serde(default = "default_google_auth_url")]
    pub google_auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub google_token_url: String,
    #[serde(default = "default_google_userinfo_url")]
    pub google_userinfo_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    pub database_url: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,

    #[serde(default)]
    pub session_backend: SessionBackend,
    pub redis_url: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: Option<u16>,
    pub redis_password: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_google_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_google_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    /// Access (and refresh) token lifetime. Falls back to 24 hours.
    pub fn token_ttl(&self) -> Duration {
        parse_go_duration(&self.jwt_expiration)
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(DEFAULT_TOKEN_TTL)
    }

    pub fn google(&self) -> GoogleConfig {
        GoogleConfig {
            client_id: self.google_client_id.clone(),
            client_secret: self.google_client_secret.clone(),
            redirect_url: self.google_redirect_url.clone(),
            auth_url: self.google_auth_url.clone(),
            token_url: self.google_token_url.clone(),
            userinfo_url: self.google_userinfo_url.clone(),
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            timeout: Duration::from_secs(self.provider_timeout_secs),
        }
    }

    /// Connection string for the user database, either given verbatim or
    /// assembled from the `DB_*` parts.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_string());
        }
        let host = self
            .db_host
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("DATABASE_URL or DB_HOST must be set".into()))?;
        let name = self
            .db_name
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("DB_NAME must be set".into()))?;
        let user = self.db_user.as_deref().unwrap_or("postgres");
        let port = self.db_port.unwrap_or(5432);
        let credentials = match self.db_password.as_deref() {
            Some(password) if !password.is_empty() => format!("{user}:{password}"),
            _ => user.to_string(),
        };
        Ok(format!("postgres://{credentials}@{host}:{port}/{name}"))
    }

    pub fn redis_url(&self) -> String {
        if let Some(url) = self.redis_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        let host = self.redis_host.as_deref().unwrap_or("127.0.0.1");
        let port = self.redis_port.unwrap_or(6379);
        match self.redis_password.as_deref() {
            Some(password) if !password.is_empty() => {
                format!("redis://:{password}@{host}:{port}/0")
            }
            _ => format!("redis://{host}:{port}/0"),
        }
    }
}

/// Parse a Go `time.ParseDuration` style string (`300ms`, `1.5h`, `2h45m`).
///
/// Returns `None` for anything that is empty, negative or malformed.
pub fn parse_go_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if s == "0" {
        return Some(Duration::ZERO);
    }

    let mut rest = s.strip_prefix('+').unwrap_or(s);
    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * nanos_per_unit;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos as u64))
}

/// Build the configuration from an already assembled `config::Config`.
pub fn from_config(cfg: config::Config) -> Result<AppConfig, ConfigError> {
    let app: AppConfig = cfg.try_deserialize()?;

    if app.jwt_secret.is_empty() {
        return Err(ConfigError::Validation("JWT_SECRET must not be empty".into()));
    }
    if app.port == 0 {
        return Err(ConfigError::Validation("PORT must be > 0".into()));
    }
    if app.provider_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "PROVIDER_TIMEOUT_SECS must be > 0".into(),
        ));
    }
    if app.jwt_secret.len() < 32 {
        tracing::warn!("JWT_SECRET is shorter than 32 bytes; use a longer secret in production");
    }

    Ok(app)
}

/// Load application configuration from an optional `config.yaml` plus the
/// process environment (`JWT_SECRET`, `GOOGLE_CLIENT_ID`, ...).
///
/// Environment keys are matched case-insensitively against the field names,
/// so `JWT_EXPIRATION` overrides `jwt_expiration` from the file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default().try_parsing(true))
        .build()?;

    from_config(cfg)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
