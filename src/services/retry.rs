//! Bounded retry with backoff
//!
//! Shared by the interface configurator, the wifi connector and the hotspot
//! manager. Attempts are always bounded by `max_attempts`; there is no
//! infinite polling.

use log::debug;
use std::{future::Future, time::Duration};
use tokio::time::sleep;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// Delay grows by one step per failed attempt.
    Linear(Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

/// Every attempt failed; carries the last failure.
#[derive(Debug, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt without any delay, used in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::Fixed(Duration::ZERO))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failed `attempt` (1-based) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(attempt),
        }
    }

    /// Run `attempt` until it succeeds or the budget is exhausted.
    ///
    /// After every failed attempt except the last, `recover` is awaited and the
    /// backoff delay elapses before the next attempt starts.
    pub async fn run<T, E, Attempt, AttemptFut, Recover, RecoverFut>(
        &self,
        label: &str,
        mut attempt: Attempt,
        mut recover: Recover,
    ) -> Result<(T, u32), RetryExhausted<E>>
    where
        E: std::fmt::Display,
        Attempt: FnMut(u32) -> AttemptFut,
        AttemptFut: Future<Output = Result<T, E>>,
        Recover: FnMut(u32) -> RecoverFut,
        RecoverFut: Future<Output = ()>,
    {
        let mut current = 1;

        loop {
            match attempt(current).await {
                Ok(value) => return Ok((value, current)),
                Err(e) if current >= self.max_attempts => {
                    debug!("{label}: attempt {current}/{} failed: {e}", self.max_attempts);
                    return Err(RetryExhausted {
                        attempts: current,
                        last_error: e,
                    });
                }
                Err(e) => {
                    debug!(
                        "{label}: attempt {current}/{} failed, retrying: {e}",
                        self.max_attempts
                    );
                    recover(current).await;
                    sleep(self.delay_after(current)).await;
                    current += 1;
                }
            }
        }
    }
}
