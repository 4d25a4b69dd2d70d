//! Session authentication: application token lookup plus conditional refresh.

use std::sync::Arc;

use tracing::warn;

use crate::oauth::OAuthClient;
use crate::session::{AccessGrant, Session, SessionError, SessionStore};

/// A session resolved for one request, with a grant outside the staleness margin.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub session: Arc<Session>,
    pub grant: AccessGrant,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Look up a session by application token without refreshing it.
pub fn lookup(store: &SessionStore, application_token: Option<&str>) -> Result<Arc<Session>, SessionError> {
    application_token
        .and_then(|token| store.get(token))
        .ok_or(SessionError::Unauthorized)
}

/// Resolve the session for `application_token`, refreshing its grant when stale.
///
/// Fails with [`SessionError::Unauthorized`] for a missing or unknown token and
/// [`SessionError::Expired`] when the refresh fails; the stored grant is then
/// unchanged and the next request retries the refresh.
pub async fn authenticate(
    store: &SessionStore,
    oauth: &OAuthClient,
    application_token: Option<&str>,
) -> Result<Authenticated, SessionError> {
    let session = lookup(store, application_token)?;
    let grant = session.ensure_fresh(oauth).await.inspect_err(|e| {
        warn!(error = %e, "session refresh failed");
    })?;
    Ok(Authenticated { session, grant })
}
