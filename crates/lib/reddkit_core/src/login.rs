//! Login handshake state: CSRF `state` values and application token minting.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tokio_util::sync::CancellationToken;

/// TTL for pending login entries (10 minutes).
const STATE_TTL: Duration = Duration::from_secs(600);

/// Length of minted application tokens.
const APPLICATION_TOKEN_LEN: usize = 64;

/// Generate a cryptographic state parameter (CSRF token).
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Mint an opaque application token (64 alphanumeric chars).
pub fn generate_application_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(APPLICATION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// In-memory store of login `state` values awaiting their callback.
#[derive(Debug, Default)]
pub struct PendingLoginStore {
    states: DashMap<String, Instant>,
    shutdown: CancellationToken,
}

impl PendingLoginStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a state value issued at `/login`.
    pub fn insert(&self, state: String) {
        self.states.insert(state, Instant::now());
    }

    /// Consume a state value. `false` if unknown, already used, or expired.
    pub fn take(&self, state: &str) -> bool {
        match self.states.remove(state) {
            Some((_, created_at)) => created_at.elapsed() <= STATE_TTL,
            None => false,
        }
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        self.states
            .retain(|_, created_at| created_at.elapsed() <= STATE_TTL);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Spawn a periodic cleanup task. It stops when [`PendingLoginStore::shutdown`] is called.
    pub fn spawn_cleanup_task(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = store.shutdown.cancelled() => break,
                    _ = interval.tick() => store.cleanup(),
                }
            }
        })
    }

    /// Stop the cleanup task and forget every pending state.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.states.clear();
    }

    #[cfg(test)]
    fn insert_at(&self, state: String, created_at: Instant) {
        self.states.insert(state, created_at);
    }
}
