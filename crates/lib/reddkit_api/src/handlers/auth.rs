//! Login handshake and session management handlers.
//!
//! `GET /login` redirects to Reddit's consent page, `GET /callback` exchanges
//! the code and opens a session, `POST /refresh` forces a credential refresh,
//! `POST /logout` drops the session.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use reddkit_core::auth::lookup;
use reddkit_core::login::{generate_application_token, generate_state};
use reddkit_core::session::{Session, SessionError};
use tracing::{info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::application_token;
use crate::models::{LoginResponse, RefreshResponse};

/// Query parameters Reddit appends to the redirect URI.
#[derive(Debug, serde::Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET /login` — start the OAuth handshake.
pub async fn login_handler(State(state): State<AppState>) -> AppResult<Redirect> {
    let csrf = generate_state();
    let url = state.oauth.authorize_url(&csrf)?;
    state.pending_logins.insert(csrf);
    Ok(Redirect::to(url.as_str()))
}

/// `GET /callback` — finish the handshake and issue an application token.
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Json<LoginResponse>> {
    if let Some(error) = params.error {
        warn!(%error, "authorization denied upstream");
        return Err(AppError::Validation(format!("Authorization failed: {error}")));
    }

    let csrf = params
        .state
        .ok_or_else(|| AppError::Validation("Missing state".into()))?;
    if !state.pending_logins.take(&csrf) {
        return Err(AppError::Validation("Invalid or expired state".into()));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::Validation("Missing code".into()))?;

    let tokens = state.oauth.exchange_code(&code).await?;
    let refresh_token = tokens
        .refresh_token
        .clone()
        .ok_or_else(|| AppError::LoginFailed("token response has no refresh_token".into()))?;
    let grant = tokens.into_grant()?;
    let expires_at = grant.expires_at.timestamp_millis();

    let application_token = generate_application_token();
    state.sessions.insert(Session::new(
        application_token.clone(),
        refresh_token,
        Some(grant),
    ));
    info!(sessions = state.sessions.len(), "session created");

    Ok(Json(LoginResponse {
        token: application_token,
        expires_at,
    }))
}

/// `POST /refresh` — refresh the upstream credential regardless of staleness.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<RefreshResponse>> {
    let session = lookup(&state.sessions, application_token(&headers))?;
    let grant = session
        .force_refresh(&state.oauth)
        .await
        .map_err(SessionError::from)?;

    Ok(Json(RefreshResponse {
        expires_at: grant.expires_at.timestamp_millis(),
    }))
}

/// `POST /logout` — drop the caller's session.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let token = application_token(&headers).ok_or(AppError::Unauthorized)?;
    state
        .sessions
        .remove(token)
        .ok_or(AppError::Unauthorized)?;
    info!(sessions = state.sessions.len(), "session closed");
    Ok(StatusCode::NO_CONTENT)
}
