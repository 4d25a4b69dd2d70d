//! Upstream forwarding for read-only API calls.

use std::time::Instant;

use reqwest::header::{AUTHORIZATION, USER_AGENT};
use thiserror::Error;
use tracing::{debug, warn};

/// Forwarding failures.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Upstream answered with an error status and a body worth relaying.
    #[error("Upstream HTTP {status}")]
    Upstream { status: u16, body: Vec<u8> },

    /// Upstream answered with an error status and nothing to relay.
    #[error("Upstream HTTP {status} with empty body")]
    EmptyUpstreamError { status: u16 },

    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Issues GET requests against the upstream API on behalf of a session.
#[derive(Clone, Debug)]
pub struct ProxyDispatcher {
    http: reqwest::Client,
    api_base: String,
    user_agent: String,
}

impl ProxyDispatcher {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, user_agent: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    /// API base + path + `?query`, concatenated without re-encoding.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}{}?{}", self.api_base, path, q),
            None => format!("{}{}", self.api_base, path),
        }
    }

    /// Forward a GET with the session's bearer credential. Returns the upstream body on 2xx.
    ///
    /// Only `Authorization` and `User-Agent` are sent; no retries.
    pub async fn forward(
        &self,
        path: &str,
        query: Option<&str>,
        access_token: &str,
    ) -> Result<Vec<u8>, ProxyError> {
        let url = self.upstream_url(path, query);
        let started = Instant::now();

        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?.to_vec();
        debug!(
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream responded"
        );

        if status.is_success() {
            return Ok(body);
        }

        warn!(path, status = status.as_u16(), "upstream returned error");
        if body.iter().all(u8::is_ascii_whitespace) {
            Err(ProxyError::EmptyUpstreamError {
                status: status.as_u16(),
            })
        } else {
            Err(ProxyError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }
}
