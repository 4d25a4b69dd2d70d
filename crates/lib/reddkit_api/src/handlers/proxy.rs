//! API proxy handler — relays read-only calls to the upstream API with the
//! session's bearer credential.
//!
//! `GET /api/{*path}` is forwarded to `<api base>/{path}?<query>`. The session
//! middleware has already resolved the caller and refreshed a stale credential.

use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::Response;

use crate::AppState;
use crate::error::{AppResult, relay_json};
use crate::middleware::auth::AuthenticatedSession;

/// Mount point stripped from the inbound path before forwarding.
pub const API_PREFIX: &str = "/api";

/// Inbound path with the mount prefix removed; the bare mount maps to `/`.
fn upstream_path(path: &str) -> &str {
    match path.strip_prefix(API_PREFIX) {
        Some("") | None => "/",
        Some(rest) => rest,
    }
}

/// `GET /api/{*path}` — forward to the upstream API.
pub async fn proxy_handler(
    State(state): State<AppState>,
    axum::Extension(AuthenticatedSession(auth)): axum::Extension<AuthenticatedSession>,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let path = upstream_path(uri.path());
    let body = state
        .proxy
        .forward(path, uri.query(), &auth.grant.access_token)
        .await?;

    Ok(relay_json(StatusCode::OK, body))
}
