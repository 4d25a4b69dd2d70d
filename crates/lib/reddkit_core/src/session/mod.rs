//! Upstream sessions keyed by application token.
//!
//! A [`Session`] links one end user to their Reddit credentials. The access
//! credential and its expiry live together in an [`AccessGrant`] guarded by a
//! per-session async mutex, so both fields always change in one assignment and
//! at most one refresh per session is in flight.

pub mod store;

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::oauth::{OAuthClient, OAuthError};

pub use store::SessionStore;

/// Refresh the access credential when fewer than 5 minutes remain.
pub const STALENESS_MARGIN_MS: i64 = 300_000;

/// Session lookup and refresh errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown or missing application token")]
    Unauthorized,

    #[error("Token refresh failed: {0}")]
    Expired(#[from] OAuthError),
}

/// An upstream access credential and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    /// Build a grant from a token endpoint's `expires_in` (seconds), counted from `now`.
    ///
    /// Returns `None` when the lifetime does not fit a timestamp.
    pub fn from_expires_in(access_token: String, expires_in: i64, now: DateTime<Utc>) -> Option<Self> {
        let lifetime = TimeDelta::try_seconds(expires_in)?;
        Some(Self {
            access_token,
            expires_at: now.checked_add_signed(lifetime)?,
        })
    }

    /// Milliseconds left before expiry (negative once expired).
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_milliseconds()
    }

    /// Whether the grant is within the staleness margin at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining_ms(now) < STALENESS_MARGIN_MS
    }
}

/// One authenticated end user's link to the upstream service.
#[derive(Debug)]
pub struct Session {
    application_token: String,
    refresh_token: String,
    grant: Mutex<Option<AccessGrant>>,
    last_used_ms: AtomicI64,
}

impl Session {
    pub fn new(application_token: String, refresh_token: String, grant: Option<AccessGrant>) -> Self {
        Self {
            application_token,
            refresh_token,
            grant: Mutex::new(grant),
            last_used_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn application_token(&self) -> &str {
        &self.application_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Snapshot of the current grant, `None` if the session was never refreshed.
    ///
    /// Waits for an in-flight refresh to finish.
    pub async fn grant(&self) -> Option<AccessGrant> {
        self.grant.lock().await.clone()
    }

    /// Return a grant that is outside the staleness margin, refreshing first if needed.
    ///
    /// The grant lock is held across the upstream call: concurrent callers for
    /// the same session queue behind it and re-check staleness once they get
    /// the lock, so a stale session triggers a single refresh. On failure the
    /// stored grant is left untouched.
    pub async fn ensure_fresh(&self, oauth: &OAuthClient) -> Result<AccessGrant, OAuthError> {
        let mut grant = self.grant.lock().await;
        if let Some(current) = grant.as_ref()
            && !current.is_stale_at(Utc::now())
        {
            return Ok(current.clone());
        }

        debug!(
            remaining_ms = grant.as_ref().map(|g| g.remaining_ms(Utc::now())),
            "access credential stale, refreshing"
        );
        let fresh = oauth.refresh(&self.refresh_token).await?;
        *grant = Some(fresh.clone());
        info!(expires_at = %fresh.expires_at, "access credential refreshed");
        Ok(fresh)
    }

    /// Refresh unconditionally. Same locking and failure semantics as [`Session::ensure_fresh`].
    pub async fn force_refresh(&self, oauth: &OAuthClient) -> Result<AccessGrant, OAuthError> {
        let mut grant = self.grant.lock().await;
        let fresh = oauth.refresh(&self.refresh_token).await?;
        *grant = Some(fresh.clone());
        info!(expires_at = %fresh.expires_at, "access credential refreshed on request");
        Ok(fresh)
    }

    pub(crate) fn touch(&self, now: DateTime<Utc>) {
        self.last_used_ms
            .fetch_max(now.timestamp_millis(), Ordering::Relaxed);
    }

    pub(crate) fn idle_ms(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.last_used_ms.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn set_last_used(&self, at: DateTime<Utc>) {
        self.last_used_ms
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }
}
