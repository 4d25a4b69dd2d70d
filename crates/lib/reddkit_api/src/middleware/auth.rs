//! Session middleware: bearer application token lookup and credential refresh.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use reddkit_core::auth::{Authenticated, authenticate, bearer_token};

use crate::AppState;
use crate::error::AppError;

/// Stored in request extensions once the session is resolved and fresh.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession(pub Authenticated);

/// Bearer application token from the request headers, if well-formed.
pub fn application_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))
}

/// Axum middleware: resolves `Authorization: Bearer <application token>`,
/// refreshes the upstream credential when it is near expiry, and injects
/// `AuthenticatedSession` into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = application_token(request.headers()).map(str::to_owned);

    let authenticated = authenticate(&state.sessions, &state.oauth, token.as_deref()).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedSession(authenticated));

    Ok(next.run(request).await)
}
