//! In-memory session store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Session;

/// How often the background task sweeps idle sessions.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Process-wide map from application token to [`Session`].
///
/// Sessions live until logout, idle eviction (when an idle TTL is set) or
/// [`SessionStore::shutdown`].
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<Session>>,
    idle_ttl: Option<Duration>,
    shutdown: CancellationToken,
}

impl SessionStore {
    /// Create an empty store. `idle_ttl = None` keeps sessions for the process lifetime.
    pub fn new(idle_ttl: Option<Duration>) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_ttl,
            shutdown: CancellationToken::new(),
        }
    }

    /// Insert a session, replacing any session with the same application token.
    pub fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .insert(session.application_token().to_string(), Arc::clone(&session));
        debug!(sessions = self.sessions.len(), "session stored");
        session
    }

    /// Look up a session and mark it used. Idle-expired sessions are dropped and reported absent.
    pub fn get(&self, application_token: &str) -> Option<Arc<Session>> {
        self.get_at(application_token, Utc::now())
    }

    fn get_at(&self, application_token: &str, now: DateTime<Utc>) -> Option<Arc<Session>> {
        // Clone out of the map before any removal; holding the shard guard would deadlock.
        let session = self
            .sessions
            .get(application_token)
            .map(|entry| Arc::clone(entry.value()))?;

        // Re-check under the shard lock so a concurrent touch wins over eviction.
        if self
            .sessions
            .remove_if(application_token, |_, s| self.is_idle(s, now))
            .is_some()
        {
            debug!("dropped idle session on lookup");
            return None;
        }
        session.touch(now);
        Some(session)
    }

    /// Remove a session (logout).
    pub fn remove(&self, application_token: &str) -> Option<Arc<Session>> {
        self.sessions
            .remove(application_token)
            .map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    fn is_idle(&self, session: &Session, now: DateTime<Utc>) -> bool {
        match self.idle_ttl {
            Some(ttl) => session.idle_ms(now) > i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            None => false,
        }
    }

    /// Evict sessions idle longer than the TTL. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Utc::now())
    }

    fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        if self.idle_ttl.is_none() {
            return 0;
        }
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_idle(session, now));
        before.saturating_sub(self.sessions.len())
    }

    /// Spawn the periodic eviction sweep. A no-op task when no idle TTL is configured.
    ///
    /// The task stops when [`SessionStore::shutdown`] is called.
    pub fn spawn_eviction_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            if store.idle_ttl.is_none() {
                return;
            }
            let mut interval = tokio::time::interval(EVICTION_INTERVAL);
            loop {
                tokio::select! {
                    _ = store.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = store.evict_idle();
                        if evicted > 0 {
                            info!(evicted, remaining = store.len(), "evicted idle sessions");
                        }
                    }
                }
            }
        })
    }

    /// Stop background work and drop every session.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let dropped = self.sessions.len();
        self.sessions.clear();
        info!(dropped, "session store shut down");
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}
