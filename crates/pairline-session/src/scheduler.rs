// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnection scheduling: backoff delay and strategy rotation.
//!
//! One scheduler lives inside each connection actor. It counts failed
//! attempts since the last successful connection, rotates through the
//! strategy catalog on abnormal disconnects and enforces the retry caps.

use std::time::Duration;

use pairline_config::model::ReconnectConfig;
use pairline_core::types::{ErrorClass, FailureReason};
use rand::Rng;
use tokio::time::Instant;

/// Exponential backoff with a ceiling and symmetric jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Fraction of the nominal delay added or removed at random.
    pub jitter_ratio: f64,
}

impl BackoffPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            max: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// `min(base * 2^attempts, max)`, without jitter.
    pub fn nominal_delay(&self, attempts: u32) -> Duration {
        let factor = 2u32.checked_pow(attempts).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// `nominal` scaled by a random factor in `[1 - ratio, 1 + ratio]`.
    pub fn jittered(&self, nominal: Duration) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return nominal;
        }
        let factor = rand::thread_rng().gen_range(-self.jitter_ratio..=self.jitter_ratio);
        nominal.mul_f64(1.0 + factor)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Wait `delay`, then try again with the strategy at `strategy_index`.
    Retry {
        delay: Duration,
        strategy_index: usize,
    },
    /// Stop retrying. The session goes to `Failed`.
    GiveUp(FailureReason),
}

/// Per-tenant retry bookkeeping.
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    policy: BackoffPolicy,
    catalog_len: usize,
    max_attempts: u32,
    max_elapsed: Duration,
    max_strategy_cycles: u32,
    attempts: u32,
    strategy_index: usize,
    /// Strategy advances since the last successful connection.
    advances: u32,
    window_started: Option<Instant>,
}

impl ReconnectScheduler {
    pub fn new(config: &ReconnectConfig, catalog_len: usize) -> Self {
        Self {
            policy: BackoffPolicy::from_config(config),
            catalog_len: catalog_len.max(1),
            max_attempts: config.max_attempts,
            max_elapsed: Duration::from_secs(config.max_elapsed_secs),
            max_strategy_cycles: config.max_strategy_cycles,
            attempts: 0,
            strategy_index: 0,
            advances: 0,
            window_started: None,
        }
    }

    /// Failed attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Index of the strategy the next attempt should use.
    pub fn strategy_index(&self) -> usize {
        self.strategy_index
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// The nominal delay the next failure would wait.
    pub fn next_nominal_delay(&self) -> Duration {
        self.policy.nominal_delay(self.attempts)
    }

    /// A connection succeeded. The working strategy is kept.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.advances = 0;
        self.window_started = None;
    }

    /// Back to a fresh pairing on the first strategy.
    pub fn reset(&mut self) {
        self.on_connected();
        self.strategy_index = 0;
    }

    /// Record a failed attempt of class `class` and decide what happens next.
    ///
    /// `LoggedOut` never reaches the scheduler; the actor handles it without
    /// retrying.
    pub fn on_failure(&mut self, class: ErrorClass) -> RetryDecision {
        let now = Instant::now();
        let window_started = *self.window_started.get_or_insert(now);
        let nominal = self.policy.nominal_delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);

        match class {
            ErrorClass::Abnormal => {
                self.strategy_index = (self.strategy_index + 1) % self.catalog_len;
                self.advances = self.advances.saturating_add(1);
                // A cycle is a full pass starting from wherever the last
                // connection succeeded.
                let cycles = self.advances / self.catalog_len as u32;
                if cycles >= self.max_strategy_cycles {
                    return RetryDecision::GiveUp(FailureReason::StrategyExhausted);
                }
            }
            ErrorClass::CredentialCorrupt => self.strategy_index = 0,
            ErrorClass::Transient | ErrorClass::LoggedOut => {}
        }

        if self.attempts >= self.max_attempts
            || now.duration_since(window_started) >= self.max_elapsed
        {
            return RetryDecision::GiveUp(FailureReason::RetryBudgetExhausted);
        }

        RetryDecision::Retry {
            delay: self.policy.jittered(nominal),
            strategy_index: self.strategy_index,
        }
    }
}
