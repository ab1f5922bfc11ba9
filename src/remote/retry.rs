//! Retry orchestration over the credential pool and remote service.

use crate::defaults;
use crate::error::{FailureClass, OverscribeError, Result};
use crate::remote::credentials::CredentialPool;
use crate::remote::service::{Operation, Payload, RemoteService};
use std::sync::Arc;
use std::time::Duration;

/// Backoff and budget knobs for [`RetryingClient`].
///
/// Tests shrink the backoffs to milliseconds; production uses the
/// defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed attempts tolerated before giving up.
    pub max_retries: u32,
    /// Pause after a rate limit when no other credential is eligible.
    pub rate_limit_backoff: Duration,
    /// Pause after a transient network failure.
    pub transient_backoff: Duration,
    /// Cap on how long to sleep waiting for a cooldown to expire.
    pub acquire_poll: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            rate_limit_backoff: defaults::RATE_LIMIT_BACKOFF,
            transient_backoff: defaults::TRANSIENT_BACKOFF,
            acquire_poll: defaults::ACQUIRE_POLL,
        }
    }
}

/// Remote-call driver: credential rotation plus bounded classified retry.
///
/// Each call acquires a credential, invokes the service, and reacts to the
/// failure class: rate limits cool the credential and rotate to the next
/// one, transient failures back off briefly, rejections fail immediately.
/// All three operations share this logic.
pub struct RetryingClient {
    service: Arc<dyn RemoteService>,
    pool: Arc<CredentialPool>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(
        service: Arc<dyn RemoteService>,
        pool: Arc<CredentialPool>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            service,
            pool,
            policy,
        }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Perform one operation with retries.
    ///
    /// # Errors
    /// `RetryBudgetExhausted` once failures exceed the budget, carrying the
    /// last failure's class; `NonRetryable` failures surface immediately.
    pub fn call(&self, op: Operation, payload: &Payload) -> Result<String> {
        let mut failures: u32 = 0;

        loop {
            let lease = match self.pool.acquire() {
                Ok(lease) => lease,
                Err(OverscribeError::AllCredentialsCooling { retry_after }) => {
                    failures += 1;
                    if failures > self.policy.max_retries {
                        return Err(OverscribeError::RetryBudgetExhausted {
                            attempts: failures,
                            last: FailureClass::RateLimited,
                        });
                    }
                    std::thread::sleep(retry_after.min(self.policy.acquire_poll));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let error = match self.service.call(op, payload, &lease.key) {
                Ok(text) => {
                    self.pool.report_success(&lease);
                    return Ok(text);
                }
                Err(e) => e,
            };

            let class = match error.failure_class() {
                Some(class) => class,
                None => return Err(error),
            };

            if class == FailureClass::NonRetryable {
                return Err(error);
            }

            failures += 1;
            eprintln!(
                "overscribe: {} attempt {} failed: {}",
                op, failures, error
            );
            if failures > self.policy.max_retries {
                return Err(OverscribeError::RetryBudgetExhausted {
                    attempts: failures,
                    last: class,
                });
            }

            match class {
                FailureClass::RateLimited => {
                    self.pool.report_rate_limited(&lease);
                    // Rotate immediately when another key is eligible
                    if !self.pool.has_available() {
                        std::thread::sleep(self.policy.rate_limit_backoff);
                    }
                }
                FailureClass::Transient => {
                    std::thread::sleep(self.policy.transient_backoff);
                }
                FailureClass::NonRetryable => unreachable!("handled above"),
            }
        }
    }
}
