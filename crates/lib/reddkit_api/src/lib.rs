//! # reddkit_api
//!
//! HTTP API library for ReddKit.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::any::Any;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use reddkit_core::login::PendingLoginStore;
use reddkit_core::oauth::OAuthClient;
use reddkit_core::proxy::ProxyDispatcher;
use reddkit_core::session::SessionStore;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, proxy};
use crate::models::ErrorResponse;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Live sessions keyed by application token.
    pub sessions: Arc<SessionStore>,
    /// Login `state` values awaiting their callback.
    pub pending_logins: Arc<PendingLoginStore>,
    /// Token endpoint client (code exchange and refresh).
    pub oauth: Arc<OAuthClient>,
    /// Upstream API forwarder.
    pub proxy: Arc<ProxyDispatcher>,
}

impl AppState {
    /// Builds the shared HTTP client and the core components from `config`.
    pub fn new(config: ApiConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            sessions: Arc::new(SessionStore::new(config.session_idle_ttl)),
            pending_logins: Arc::new(PendingLoginStore::new()),
            oauth: Arc::new(OAuthClient::new(http.clone(), config.oauth.clone())),
            proxy: Arc::new(ProxyDispatcher::new(
                http,
                config.api_base.clone(),
                config.oauth.user_agent.clone(),
            )),
            config,
        })
    }
}

/// Catch-all for panics inside a handler: generic 500, detail only in the log.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(%detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Something went wrong!".into(),
        }),
    )
        .into_response()
}

async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".into(),
        }),
    )
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    // Handshake routes (no session required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/login", get(auth::login_handler))
        .route("/callback", get(auth::callback_handler))
        .route("/refresh", post(auth::refresh_handler))
        .route("/logout", post(auth::logout_handler));

    // Forwarding routes (require a live session)
    let api = Router::new()
        .route(proxy::API_PREFIX, get(proxy::proxy_handler))
        .route("/api/", get(proxy::proxy_handler))
        .route("/api/{*path}", get(proxy::proxy_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_session,
        ));

    Router::new()
        .merge(public)
        .merge(api)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
