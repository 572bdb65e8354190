//! Process configuration parsed from environment variables.
//!
//! `main` loads `.env` (if present) through `dotenvy` before calling
//! `AppConfig::from_env`. Optional integrations stay disabled when their
//! variables are missing.

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Gmail send credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailConfig {
    pub access_token: String,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Upstream AI workflow websocket. `agui:start` is refused without it.
    pub agui_backend_url: Option<String>,
    pub gmail: Option<GmailConfig>,
    pub stripe_webhook_secret: Option<String>,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `AGUI_BACKEND_URL`: `ws://` or `wss://` URL of the workflow backend
    /// - `GMAIL_ACCESS_TOKEN` + `GMAIL_SENDER`: both required to enable email
    /// - `STRIPE_WEBHOOK_SECRET`: enables webhook signature checks
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required var is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Used by tests.
    ///
    /// # Errors
    ///
    /// See `from_env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), DEFAULT_DB_MAX_CONNECTIONS)?;

        let agui_backend_url = get("AGUI_BACKEND_URL");
        if let Some(url) = &agui_backend_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::Invalid { var: "AGUI_BACKEND_URL", value: url.clone() });
            }
        }

        let gmail = match (get("GMAIL_ACCESS_TOKEN"), get("GMAIL_SENDER")) {
            (Some(access_token), Some(sender)) => Some(GmailConfig { access_token, sender }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port,
            db_max_connections,
            agui_backend_url,
            gmail,
            stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
        })
    }
}

fn parse_or<T: std::str::FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

/// Parse a boolean-ish env var (`1/true/yes/on`, `0/false/no/off`).
#[must_use]
pub fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
