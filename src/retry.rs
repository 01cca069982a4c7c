//! Retry decisions with capped exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::{ClientOptions, GeoApiError, Verdict};

// Upper bound on the doubling exponent; the delay cap applies long before.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Mutable bookkeeping for one in-flight call.
#[derive(Debug)]
pub struct RetryState {
    attempts: u32,
    started_at: Option<Instant>,
    last_error: Option<String>,
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            started_at: None,
            last_error: None,
        }
    }

    /// Number of dispatches made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time since the first dispatch; zero before it.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|started_at| started_at.elapsed())
            .unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn record_attempt(&mut self) {
        self.started_at.get_or_insert_with(Instant::now);
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn record_failure(&mut self, error: &GeoApiError) {
        self.last_error = Some(error.to_string());
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a retry decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Surface the failure that was just observed.
    Stop,
    /// Dispatch again after the given delay.
    RetryAfter(Duration),
}

/// Decides whether and when a failed call is dispatched again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    enabled: bool,
    max_retries: Option<u32>,
    retry_timeout: Option<Duration>,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            enabled: options.retries_enabled,
            max_retries: options.max_retries,
            retry_timeout: options.retry_timeout,
            base_delay: options.retry_backoff,
            max_delay: options.max_retry_delay,
        }
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Decides what happens after the attempt recorded in `state` failed.
    pub fn decide(&self, state: &RetryState, verdict: Verdict) -> RetryDecision {
        if !self.enabled || !verdict.is_retryable() {
            return RetryDecision::Stop;
        }

        let retries_used = state.attempts().saturating_sub(1);
        if self.max_retries.is_some_and(|max| retries_used >= max) {
            return RetryDecision::Stop;
        }
        if self
            .retry_timeout
            .is_some_and(|timeout| state.elapsed() >= timeout)
        {
            return RetryDecision::Stop;
        }

        RetryDecision::RetryAfter(self.delay_for(state.attempts()))
    }

    /// Capped exponential delay before the retry that follows `attempt`.
    ///
    /// Jitter adds up to half of the capped delay, so the result never
    /// exceeds `1.5 * max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        let jitter_ms = (backoff.as_millis() as u64) / 2;
        if jitter_ms == 0 {
            return backoff;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        backoff + Duration::from_millis(jitter)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}
