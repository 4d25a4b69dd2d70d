//! Reddit OAuth2 client.
//!
//! Builds the authorize redirect, exchanges authorization codes, and refreshes
//! access credentials. Every token endpoint call authenticates with the
//! application's client id/secret over HTTP Basic.

use chrono::Utc;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::session::AccessGrant;

/// OAuth client errors. Each one aborts the current exchange without retry.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Token endpoint unreachable: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Token endpoint HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Invalid authorize URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Application-wide OAuth settings, loaded once at startup.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where the browser is sent to grant access.
    pub auth_url: String,
    /// Token endpoint for code and refresh-token grants.
    pub token_url: String,
    pub redirect_uri: String,
    /// Space-separated scope list.
    pub scopes: String,
    /// Client identifier sent as `User-Agent` on every upstream call.
    pub user_agent: String,
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a grant whose expiry counts from now.
    pub fn into_grant(self) -> Result<AccessGrant, OAuthError> {
        let expires_in = self.expires_in;
        AccessGrant::from_expires_in(self.access_token, expires_in, Utc::now())
            .ok_or_else(|| OAuthError::InvalidResponse(format!("expires_in out of range: {expires_in}")))
    }
}

/// Token endpoint client bound to the application's credentials.
#[derive(Clone, Debug)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Authorize URL the user is redirected to, carrying the CSRF `state`.
    pub fn authorize_url(&self, state: &str) -> Result<Url, OAuthError> {
        let mut url = Url::parse(&self.config.auth_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("state", state)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("duration", "permanent")
            .append_pair("scope", &self.config.scopes);
        Ok(url)
    }

    /// Exchange an authorization code for the initial token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.token_request(&params).await
    }

    /// Refresh-token grant. Yields the new access credential and its expiry together.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessGrant, OAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.token_request(&params).await?.into_grant()
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let resp = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(USER_AGENT, &self.config.user_agent)
            .form(params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            warn!(status, "token endpoint rejected grant");
            return Err(OAuthError::Status { status, body });
        }

        // Reddit answers some failures with 200 and an `error` field.
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;
        if let Some(error) = body.get("error") {
            return Err(OAuthError::InvalidResponse(format!("token endpoint error: {error}")));
        }
        serde_json::from_value(body).map_err(|e| OAuthError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-abc".into(),
            client_secret: "secret".into(),
            auth_url: "https://www.reddit.com/api/v1/authorize".into(),
            token_url: "https://www.reddit.com/api/v1/access_token".into(),
            redirect_uri: "http://localhost:3000/callback".into(),
            scopes: "identity read".into(),
            user_agent: "ReddKit/1.0.0".into(),
        }
    }

    #[test]
    fn authorize_url_carries_all_parameters() {
        let client = OAuthClient::new(reqwest::Client::new(), config());
        let url = client.authorize_url("xyz").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.host_str(), Some("www.reddit.com"));
        assert!(pairs.contains(&("client_id".into(), "client-abc".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "http://localhost:3000/callback".into())));
        assert!(pairs.contains(&("duration".into(), "permanent".into())));
        assert!(pairs.contains(&("scope".into(), "identity read".into())));
    }

    #[test]
    fn authorize_url_rejects_bad_base() {
        let mut cfg = config();
        cfg.auth_url = "not a url".into();
        let client = OAuthClient::new(reqwest::Client::new(), cfg);
        assert!(matches!(client.authorize_url("s"), Err(OAuthError::InvalidUrl(_))));
    }

    #[test]
    fn token_response_tolerates_missing_optionals() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3600}"#).unwrap();
        assert_eq!(parsed.access_token, "a");
        assert!(parsed.refresh_token.is_none());
        let grant = parsed.into_grant().unwrap();
        assert!(!grant.is_stale_at(Utc::now()));
    }

    #[test]
    fn token_response_requires_expiry() {
        assert!(serde_json::from_str::<TokenResponse>(r#"{"access_token":"a"}"#).is_err());
    }
}
