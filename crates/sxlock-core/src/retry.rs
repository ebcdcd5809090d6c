//! Bounded retry with a fixed sleep between attempts

use std::thread;
use std::time::Duration;

/// Default number of attempts per resource
pub const DEFAULT_ATTEMPTS: u32 = 1000;

/// Default pause between two attempts
pub const DEFAULT_INTERVAL: Duration = Duration::from_micros(50);

/// Attempt budget and pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, at least one is always made
    pub attempts: u32,
    /// Sleep between two consecutive attempts
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a custom budget and interval
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Result of a bounded retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The operation succeeded on the given attempt (1-based)
    Succeeded { attempts: u32 },
    /// Every attempt in the budget failed
    Exhausted { attempts: u32 },
}

impl RetryOutcome {
    /// Whether the operation eventually succeeded
    pub fn succeeded(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }
}

/// Runs `attempt` until it reports success or the budget is spent.
///
/// `attempt` returns `Ok(true)` on success and `Ok(false)` when the resource
/// is still busy; an `Err` aborts the retry immediately.
pub fn retry_bounded<E, F>(policy: RetryPolicy, mut attempt: F) -> Result<RetryOutcome, E>
where
    F: FnMut() -> Result<bool, E>,
{
    let budget = policy.attempts.max(1);

    for n in 1..=budget {
        if attempt()? {
            return Ok(RetryOutcome::Succeeded { attempts: n });
        }
        if n < budget && !policy.interval.is_zero() {
            thread::sleep(policy.interval);
        }
    }

    Ok(RetryOutcome::Exhausted { attempts: budget })
}
