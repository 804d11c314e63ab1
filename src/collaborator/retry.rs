// Retry with exponential backoff for idempotent collaborator calls

use crate::error::CollaboratorError;
use std::time::Duration;

/// How often and how patiently to repeat a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Wait before retry number `retry` (0 = first retry): base * 2^retry, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// Only transient errors are retried. `sleep` is called between attempts.
    pub fn run<T, F, S>(&self, mut op: F, sleep: S) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Result<T, CollaboratorError>,
        S: Fn(Duration),
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "Attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        err,
                        delay
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250), Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(40), Duration::from_secs(2));
    }

    #[test]
    fn test_transient_error_retried_until_success() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);
        let sleeps = RefCell::new(Vec::new());

        let result = policy.run(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(CollaboratorError::Transport("reset".into()))
                } else {
                    Ok(42)
                }
            },
            |d| sleeps.borrow_mut().push(d),
        );

        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 3);
        assert_eq!(
            *sleeps.borrow(),
            vec![Duration::from_millis(250), Duration::from_millis(500)]
        );
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);

        let result: Result<(), _> = policy.run(
            || {
                calls.set(calls.get() + 1);
                Err(CollaboratorError::Status {
                    code: 503,
                    message: "busy".into(),
                })
            },
            |_| {},
        );

        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);

        let result: Result<(), _> = policy.run(
            || {
                calls.set(calls.get() + 1);
                Err(CollaboratorError::Unauthorized)
            },
            |_| {},
        );

        assert_eq!(result, Err(CollaboratorError::Unauthorized));
        assert_eq!(calls.get(), 1);
    }
}
