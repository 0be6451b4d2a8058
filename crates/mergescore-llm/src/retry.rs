// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Bounded retry with exponential backoff
//!
//! Only `RateLimited` and `Transient` failures are retried. `Auth` and
//! `Malformed` are returned on the first occurrence.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ScoringError;
use crate::rubric::Prompt;
use crate::scorer::Scorer;

/// Attempt budget and delay schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Factor applied to the delay after every retry
    pub multiplier: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `retries` retries after the first attempt
    #[must_use]
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Self::default()
        }
    }

    /// A policy that never sleeps
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based), ignoring any server hint
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Wraps a scorer with a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryingScorer<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Scorer> RetryingScorer<S> {
    /// Wrap `inner`
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped scorer
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The policy in use
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl<S: Scorer> Scorer for RetryingScorer<S> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    fn complete(&self, prompt: &Prompt) -> Result<String, ScoringError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut retry = 0;

        loop {
            match self.inner.complete(prompt) {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_retryable() && retry + 1 < attempts => {
                    let mut delay = self.policy.delay(retry);
                    if let ScoringError::RateLimited {
                        retry_after: Some(hint),
                    } = &e
                    {
                        delay = (*hint).min(self.policy.max_delay).max(delay);
                    }
                    warn!(
                        attempt = retry + 1,
                        of = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Scoring attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    retry += 1;
                }
                Err(e) => {
                    debug!(attempts = retry + 1, kind = e.kind(), "Giving up on scoring request");
                    return Err(e);
                }
            }
        }
    }
}
