//! Rotating credential pool with per-credential rate-limit cooldown.

use crate::clock::Clock;
use crate::defaults;
use crate::error::{OverscribeError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

struct CredentialState {
    key: String,
    cooldown_until: Option<Instant>,
}

struct PoolInner {
    credentials: Vec<CredentialState>,
    cursor: usize,
}

/// A credential handed out by [`CredentialPool::acquire`].
///
/// Leases are reported back to the pool so a rate-limited key starts its
/// cooldown and a successful key stays in rotation.
#[derive(Debug, Clone)]
pub struct CredentialLease {
    index: usize,
    pub key: String,
}

/// Fixed set of API credentials rotated round-robin.
///
/// A credential reported rate-limited is skipped until its cooldown
/// expires. When every credential is cooling, `acquire` reports how long
/// until the earliest one becomes eligible again so callers can wait
/// instead of busy-polling. Time comes from the injected [`Clock`].
pub struct CredentialPool {
    inner: Mutex<PoolInner>,
    cooldown: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl CredentialPool {
    /// Create a pool over the given keys.
    ///
    /// # Errors
    /// Returns `OverscribeError::NoCredentials` if `keys` is empty.
    pub fn new(
        keys: Vec<String>,
        cooldown: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if keys.is_empty() {
            return Err(OverscribeError::NoCredentials {
                prefix: defaults::API_KEY_ENV_PREFIX.to_string(),
            });
        }

        let credentials = keys
            .into_iter()
            .map(|key| CredentialState {
                key,
                cooldown_until: None,
            })
            .collect();

        Ok(Self {
            inner: Mutex::new(PoolInner {
                credentials,
                cursor: 0,
            }),
            cooldown,
            clock,
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire the next eligible credential, round-robin.
    ///
    /// # Errors
    /// `AllCredentialsCooling { retry_after }` when every credential is on
    /// cooldown; `retry_after` is the time until the earliest expiry.
    pub fn acquire(&self) -> Result<CredentialLease> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let count = inner.credentials.len();

        for _ in 0..count {
            let index = inner.cursor % count;
            inner.cursor = (inner.cursor + 1) % count;

            let credential = &inner.credentials[index];
            if credential.cooldown_until.is_none_or(|until| until <= now) {
                return Ok(CredentialLease {
                    index,
                    key: credential.key.clone(),
                });
            }
        }

        let earliest = inner
            .credentials
            .iter()
            .filter_map(|c| c.cooldown_until)
            .min()
            .unwrap_or(now);

        Err(OverscribeError::AllCredentialsCooling {
            retry_after: earliest.saturating_duration_since(now),
        })
    }

    /// Start the cooldown for a credential the service rate-limited.
    pub fn report_rate_limited(&self, lease: &CredentialLease) {
        let until = self.clock.now() + self.cooldown;
        let mut inner = self.lock();
        if let Some(credential) = inner.credentials.get_mut(lease.index) {
            credential.cooldown_until = Some(until);
            eprintln!(
                "overscribe: credential {} rate limited, cooling down {}s",
                preview(&credential.key),
                self.cooldown.as_secs()
            );
        }
    }

    /// Acknowledge a successful call.
    ///
    /// State-neutral: a cooldown always runs its full window. Round-robin
    /// can hand the same key to two callers, so a success reported on a
    /// stale lease must not revive a key that was just rate-limited.
    pub fn report_success(&self, _lease: &CredentialLease) {}

    /// Whether at least one credential is currently eligible.
    pub fn has_available(&self) -> bool {
        let now = self.clock.now();
        self.lock()
            .credentials
            .iter()
            .any(|c| c.cooldown_until.is_none_or(|until| until <= now))
    }

    /// Total number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Short key prefix safe to log.
fn preview(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{}...", prefix)
}
