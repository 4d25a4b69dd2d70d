//! API server configuration.

use std::time::Duration;

use reddkit_core::oauth::OAuthConfig;
use thiserror::Error;

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// Reddit OAuth client settings.
    pub oauth: OAuthConfig,
    /// Base URL of the proxied API.
    pub api_base: String,
    /// Deadline for each upstream call. `None` waits indefinitely.
    pub upstream_timeout: Option<Duration>,
    /// Sessions unused for longer than this are evicted. `None` keeps them forever.
    pub session_idle_ttl: Option<Duration>,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                 | Default                                      |
    /// |--------------------------|----------------------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:3000`                             |
    /// | `REDDIT_CLIENT_ID`       | required                                     |
    /// | `REDDIT_CLIENT_SECRET`   | required                                     |
    /// | `REDDIT_REDIRECT_URI`    | `http://localhost:3000/callback`             |
    /// | `REDDIT_SCOPES`          | `identity read mysubreddits`                 |
    /// | `REDDIT_AUTH_URL`        | `https://www.reddit.com/api/v1/authorize`    |
    /// | `REDDIT_TOKEN_URL`       | `https://www.reddit.com/api/v1/access_token` |
    /// | `REDDIT_API_BASE`        | `https://oauth.reddit.com`                   |
    /// | `USER_AGENT`             | `ReddKit/1.0.0`                              |
    /// | `UPSTREAM_TIMEOUT_SECS`  | unset                                        |
    /// | `SESSION_IDLE_TTL_SECS`  | unset                                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: var_or("BIND_ADDR", "127.0.0.1:3000"),
            oauth: OAuthConfig {
                client_id: required("REDDIT_CLIENT_ID")?,
                client_secret: required("REDDIT_CLIENT_SECRET")?,
                auth_url: var_or("REDDIT_AUTH_URL", "https://www.reddit.com/api/v1/authorize"),
                token_url: var_or("REDDIT_TOKEN_URL", "https://www.reddit.com/api/v1/access_token"),
                redirect_uri: var_or("REDDIT_REDIRECT_URI", "http://localhost:3000/callback"),
                scopes: var_or("REDDIT_SCOPES", "identity read mysubreddits"),
                user_agent: var_or("USER_AGENT", "ReddKit/1.0.0"),
            },
            api_base: var_or("REDDIT_API_BASE", "https://oauth.reddit.com"),
            upstream_timeout: seconds("UPSTREAM_TIMEOUT_SECS")?,
            session_idle_ttl: seconds("SESSION_IDLE_TTL_SECS")?,
        })
    }
}

fn var_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.into())
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn seconds(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => parse_seconds(var, &v).map(Some),
        _ => Ok(None),
    }
}

fn parse_seconds(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            value: value.to_string(),
        })
}
