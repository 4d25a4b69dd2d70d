//! Request and response bodies.

use serde::{Deserialize, Serialize};

/// Error body returned for every failure that is not an upstream passthrough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Issued once the login callback has created a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Application token to send as `Authorization: Bearer <token>`.
    pub token: String,
    /// Upstream credential expiry, milliseconds since the Unix epoch.
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}
