//! Application error types.

use axum::{
    Json,
    body::Body,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use reddkit_core::oauth::OAuthError;
use reddkit_core::proxy::ProxyError;
use reddkit_core::session::SessionError;
use serde::de::IgnoredAny;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// Callers only ever see the generic message; details stay in the logs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Authentication expired")]
    AuthExpired,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream error relayed with its own status and body.
    #[error("Upstream HTTP {status}")]
    Upstream { status: StatusCode, body: Vec<u8> },

    #[error("API request failed")]
    ProxyFailed { status: StatusCode },

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::AuthExpired => (
                StatusCode::UNAUTHORIZED,
                "Authentication expired".to_string(),
            ),
            AppError::LoginFailed(detail) => {
                warn!(%detail, "login failed");
                (StatusCode::UNAUTHORIZED, "Login failed".to_string())
            }
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            AppError::Upstream { status, body } => return relay_json(status, body),
            AppError::ProxyFailed { status } => (status, "API request failed".to_string()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong!".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Relay an upstream body as JSON. Valid JSON passes through byte for byte,
/// anything else is wrapped as a JSON string.
pub fn relay_json(status: StatusCode, body: Vec<u8>) -> Response {
    if serde_json::from_slice::<IgnoredAny>(&body).is_ok() {
        return Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|_| status.into_response());
    }
    let text = String::from_utf8_lossy(&body).into_owned();
    (status, Json(text)).into_response()
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Unauthorized => AppError::Unauthorized,
            SessionError::Expired(_) => AppError::AuthExpired,
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::Upstream { status, body } => AppError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                body,
            },
            ProxyError::EmptyUpstreamError { status } => AppError::ProxyFailed {
                status: StatusCode::from_u16(status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            },
            ProxyError::Transport(e) => {
                error!(error = %e, "API proxy error");
                AppError::ProxyFailed {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                }
            }
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::InvalidUrl(e) => AppError::Internal(e.to_string()),
            other => AppError::LoginFailed(other.to_string()),
        }
    }
}
