//! Anti-forgery state store
//!
//! Every login attempt gets a random state value. The value is recorded here
//! together with its PKCE verifier and may be redeemed once, before it expires.

use crate::error::{HelperError, Result};
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

const STATE_LEN: usize = 32;

/// Interval between sweeps of expired states.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
struct PendingLogin {
    code_verifier: String,
    issued_at: Instant,
}

/// Outstanding login attempts keyed by state value.
pub struct StateStore {
    pending: Mutex<HashMap<String, PendingLogin>>,
    ttl: Duration,
}

impl StateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Mint a state value bound to `code_verifier`
    pub fn issue(&self, code_verifier: String) -> String {
        let state = generate_state();
        let login = PendingLogin {
            code_verifier,
            issued_at: Instant::now(),
        };

        self.lock().insert(state.clone(), login);
        state
    }

    /// Redeem a state value, returning its PKCE verifier.
    ///
    /// The record is removed whether or not it was still fresh.
    pub fn consume(&self, state: &str) -> Result<String> {
        let login = self.lock().remove(state).ok_or(HelperError::InvalidState)?;

        if login.issued_at.elapsed() > self.ttl {
            debug!("Rejecting expired login state");
            return Err(HelperError::InvalidState);
        }

        Ok(login.code_verifier)
    }

    /// Drop every expired record, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, login| login.issued_at.elapsed() <= ttl);
        before - pending.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingLogin>> {
        // The map holds no invariants a panicking writer could break.
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Periodically sweep expired states so abandoned logins don't pile up.
pub fn spawn_cleanup_task(store: Arc<StateStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = store.evict_expired();
            if evicted > 0 {
                debug!(evicted, pending = store.len(), "Evicted expired login states");
            }
        }
    })
}

/// Generate a random state parameter for CSRF protection
fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}
