//! Fixed-interval retry executor for verification checks.
//!
//! Convergence lag differs per resource kind, so every call site picks its own
//! [`RetryPolicy`]. The executor re-invokes a single-attempt check until it
//! passes, fails with a non-transient failure, or runs out of attempts. There
//! is no backoff and no jitter: the interval is the same between every pair of
//! attempts, so the worst-case wait of a stage is `interval * (max_attempts - 1)`.
//!
//! # Example
//!
//! ```ignore
//! use chainverify::retry::{retry_check, RetryPolicy};
//!
//! let confirmed = retry_check(&RetryPolicy::new(Duration::from_secs(1), 5), Stage::RoutingInstance, || {
//!     create::verify_routing_instance(inventory, &iface, &network, reserved)
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::verify::{Stage, StageFailure};

/// How often and how many times a check is attempted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Delay between attempts, in milliseconds
    pub interval_ms: u64,
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy from an interval and an attempt budget
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            max_attempts,
        }
    }

    /// Single attempt, no polling
    pub fn once() -> Self {
        Self {
            interval_ms: 0,
            max_attempts: 1,
        }
    }

    /// Delay between attempts
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Longest time the executor can spend sleeping under this policy
    pub fn max_wait(&self) -> Duration {
        self.interval() * self.max_attempts.saturating_sub(1)
    }
}

/// Run `check` until it passes or the policy's attempt budget is spent.
///
/// Transient failures are logged and retried after the policy interval.
/// Invariant violations are returned immediately since polling cannot change a
/// structural mismatch. When the budget runs out, the last failure is returned
/// marked as exhausted, so its detail still names the offending resource.
///
/// # Arguments
/// * `policy` - Interval and attempt budget
/// * `stage` - Stage being polled, for logging
/// * `check` - Single-attempt verification
pub async fn retry_check<F, Fut, T>(
    policy: &RetryPolicy,
    stage: Stage,
    mut check: F,
) -> Result<T, StageFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StageFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match check().await {
            Ok(confirmed) => {
                if attempt > 1 {
                    debug!(stage = %stage, attempt, "Check converged after retry");
                }
                return Ok(confirmed);
            }
            Err(failure) if !failure.is_transient() => return Err(failure),
            Err(failure) => {
                if attempt >= max_attempts {
                    error!(
                        stage = %stage,
                        attempt,
                        reason = %failure.reason,
                        "Check did not converge within retry budget"
                    );
                    return Err(failure.exhausted(attempt));
                }

                warn!(
                    stage = %stage,
                    attempt,
                    max_attempts,
                    reason = %failure.reason,
                    delay_ms = policy.interval_ms,
                    "Check not converged, retrying"
                );

                tokio::time::sleep(policy.interval()).await;
            }
        }
    }
}
