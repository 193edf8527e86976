//! The exponential backoff policy shared by the fetcher, the sender, and the
//! HTTP North reference plugin's retry loop.
//!
//! `SPEC_FULL.md` §4.4 is explicit that both coroutines "share the identical
//! policy": start at a per-task initial sleep, double after every idle/fail
//! sleep, cap after `TASK_SLEEP_MAX_INCREMENTS` doublings, then reset. This
//! type captures that policy once so fetcher, sender, and plugin backoff
//! cannot drift apart.

use std::time::Duration;

/// Number of doublings after which backoff stops growing and resets.
pub const TASK_SLEEP_MAX_INCREMENTS: u32 = 4;

/// A single task's exponential backoff counter.
///
/// Mirrors the teacher's `RetryConfig` (initial delay + multiplier + cap) but
/// adds the reset-after-cap behaviour the spec requires instead of clamping
/// forever at the max delay.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    increments: u32,
}

impl Backoff {
    /// Creates a new backoff counter starting at `initial` (e.g. 0.5s).
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            increments: 0,
        }
    }

    /// The delay to sleep for *this* idle/fail cycle, then advances state for
    /// the next call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.initial * 2u32.pow(self.increments);
        if self.increments >= TASK_SLEEP_MAX_INCREMENTS {
            self.increments = 0;
        } else {
            self.increments += 1;
        }
        delay
    }

    /// Resets the counter to its initial state (called after a success).
    pub fn reset(&mut self) {
        self.increments = 0;
    }
}

/// `max_attempts` encoding used by the HTTP North plugin: `-1` retries
/// forever, `0` performs no retry, `N` allows `N` additional attempts beyond
/// the first. See `SPEC_FULL.md` §4.1 and §9 ("Retry state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAttempts {
    Forever,
    None,
    Limited(u32),
}

impl From<i64> for MaxAttempts {
    fn from(value: i64) -> Self {
        match value {
            i64::MIN..=-1 => MaxAttempts::Forever,
            0 => MaxAttempts::None,
            n => MaxAttempts::Limited(n as u32),
        }
    }
}

impl MaxAttempts {
    /// Whether another attempt is permitted after `attempts_so_far` failures.
    pub fn allows_retry(self, attempts_so_far: u32) -> bool {
        match self {
            MaxAttempts::Forever => true,
            MaxAttempts::None => false,
            MaxAttempts::Limited(n) => attempts_so_far < n,
        }
    }
}

/// Exponential backoff schedule used by a single retry loop (e.g. the HTTP
/// North plugin): starts at `initial`, doubles every attempt, with no cap
/// other than `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct RetrySchedule {
    pub initial: Duration,
    pub max_attempts: MaxAttempts,
}

impl RetrySchedule {
    pub fn new(initial: Duration, max_attempts: MaxAttempts) -> Self {
        Self {
            initial,
            max_attempts,
        }
    }

    /// Delay before the `attempt`-th retry (0-indexed: the first retry is
    /// attempt 0, delayed by `initial`; the second is `initial * 2`, etc).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial * 2u32.pow(attempt)
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// No idle/fail sleep ever exceeds `initial * 2^TASK_SLEEP_MAX_INCREMENTS`,
        /// regardless of how many cycles a fetcher or sender has been idle.
        #[test]
        fn backoff_never_exceeds_bound(initial_ms in 1u64..5_000, cycles in 0u32..64) {
            let initial = Duration::from_millis(initial_ms);
            let mut backoff = Backoff::new(initial);
            let bound = initial * 2u32.pow(TASK_SLEEP_MAX_INCREMENTS);
            for _ in 0..cycles {
                let delay = backoff.next_delay();
                prop_assert!(delay <= bound);
            }
        }

        /// A reset always brings the next delay back down to `initial`,
        /// no matter how many doublings preceded it.
        #[test]
        fn reset_restores_initial_delay(initial_ms in 1u64..5_000, cycles in 0u32..64) {
            let initial = Duration::from_millis(initial_ms);
            let mut backoff = Backoff::new(initial);
            for _ in 0..cycles {
                backoff.next_delay();
            }
            backoff.reset();
            prop_assert_eq!(backoff.next_delay(), initial);
        }
    }
}
