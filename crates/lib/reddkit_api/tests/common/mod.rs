//! Shared fixtures: a mock Reddit upstream and a router wired against it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Form, State};
use axum::http::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use axum::http::{HeaderMap, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use chrono::{TimeDelta, Utc};
use reddkit_api::AppState;
use reddkit_api::config::ApiConfig;
use reddkit_core::oauth::OAuthConfig;
use reddkit_core::session::{AccessGrant, Session};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const USER_AGENT_VALUE: &str = "ReddKit/1.0.0";

/// Simulated token endpoint latency, wide enough for concurrent callers to overlap.
const REFRESH_LATENCY: Duration = Duration::from_millis(50);

/// One API call as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub cookie: Option<String>,
}

#[derive(Clone, Default)]
pub struct UpstreamState {
    pub refresh_calls: Arc<AtomicU32>,
    pub code_exchanges: Arc<AtomicU32>,
    pub api_requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl UpstreamState {
    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn api_requests(&self) -> Vec<SeenRequest> {
        self.api_requests.lock().unwrap().clone()
    }
}

pub struct MockUpstream {
    pub base_url: String,
    pub state: UpstreamState,
}

fn header(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn token_endpoint(
    State(state): State<UpstreamState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}"))
    );
    if header(&headers, AUTHORIZATION).as_deref() != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"}))).into_response();
    }

    match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => {
            let n = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(REFRESH_LATENCY).await;
            match form.get("refresh_token").map(String::as_str) {
                Some("revoked-refresh") => {
                    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response()
                }
                Some("malformed-refresh") => Json(json!({"unexpected": true})).into_response(),
                Some(_) => Json(json!({
                    "access_token": format!("refreshed-{n}"),
                    "token_type": "bearer",
                    "expires_in": 3600,
                    "scope": "*"
                }))
                .into_response(),
                None => {
                    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_request"}))).into_response()
                }
            }
        }
        Some("authorization_code") => {
            state.code_exchanges.fetch_add(1, Ordering::SeqCst);
            match form.get("code").map(String::as_str) {
                Some("good-code") => Json(json!({
                    "access_token": "initial-access",
                    "token_type": "bearer",
                    "expires_in": 3600,
                    "refresh_token": "refresh-from-code",
                    "scope": "identity"
                }))
                .into_response(),
                Some("temporary-code") => Json(json!({
                    "access_token": "initial-access",
                    "token_type": "bearer",
                    "expires_in": 3600
                }))
                .into_response(),
                _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response(),
            }
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "unsupported_grant_type"}))).into_response(),
    }
}

async fn api_endpoint(State(state): State<UpstreamState>, uri: Uri, headers: HeaderMap) -> Response {
    state.api_requests.lock().unwrap().push(SeenRequest {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_owned),
        authorization: header(&headers, AUTHORIZATION),
        user_agent: header(&headers, USER_AGENT),
        cookie: header(&headers, COOKIE),
    });

    match uri.path() {
        "/user/me" => Json(json!({"name": "tester"})).into_response(),
        "/missing" => (StatusCode::NOT_FOUND, r#"{"message":"not found"}"#).into_response(),
        "/empty-error" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "/plain" => "hello".into_response(),
        other => Json(json!({"path": other})).into_response(),
    }
}

/// Start the mock upstream on an ephemeral port.
pub async fn spawn_upstream() -> MockUpstream {
    let state = UpstreamState::default();
    let app = Router::new()
        .route("/api/v1/access_token", post(token_endpoint))
        .fallback(api_endpoint)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock upstream serve");
    });

    MockUpstream {
        base_url: format!("http://{addr}"),
        state,
    }
}

/// Config pointing every upstream URL at `base_url`.
pub fn test_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        oauth: OAuthConfig {
            client_id: CLIENT_ID.into(),
            client_secret: CLIENT_SECRET.into(),
            auth_url: format!("{base_url}/api/v1/authorize"),
            token_url: format!("{base_url}/api/v1/access_token"),
            redirect_uri: "http://localhost:3000/callback".into(),
            scopes: "identity read".into(),
            user_agent: USER_AGENT_VALUE.into(),
        },
        api_base: base_url.into(),
        upstream_timeout: Some(Duration::from_secs(5)),
        session_idle_ttl: None,
    }
}

pub fn test_state(config: ApiConfig) -> AppState {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    AppState::new(config).expect("build app state")
}

/// Insert a session whose grant expires `expires_in` from now (`None` = never refreshed).
pub fn insert_session(
    state: &AppState,
    token: &str,
    refresh_token: &str,
    access: Option<(&str, TimeDelta)>,
) -> Arc<Session> {
    let grant = access.map(|(access_token, expires_in)| AccessGrant {
        access_token: access_token.into(),
        expires_at: Utc::now() + expires_in,
    });
    state
        .sessions
        .insert(Session::new(token.into(), refresh_token.into(), grant))
}

/// Issue one request against the router and return status plus raw body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, HeaderMap) {
    let resp = app.clone().oneshot(request).await.expect("request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, body.to_vec(), headers)
}

/// `GET uri` with an optional bearer token; body parsed as JSON.
pub async fn get_json(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let (status, body, _) = send(app, builder.body(Body::empty()).unwrap()).await;
    let json = serde_json::from_slice(&body).expect("parse JSON");
    (status, json)
}

/// `POST uri` with an optional bearer token.
pub async fn post_with_token(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let (status, body, _) = send(app, builder.body(Body::empty()).unwrap()).await;
    (status, body)
}
