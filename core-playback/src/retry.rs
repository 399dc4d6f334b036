//! # Retry/Backoff Policy
//!
//! Decides what happens to a failure reported by a backend:
//!
//! | Kind                                   | Class       | Outcome                           |
//! |----------------------------------------|-------------|-----------------------------------|
//! | `Timeout`, `NetworkReset`, `Io`        | Retryable   | retry last source with backoff    |
//! | `BackendFault`                         | Fault       | switch to fallback backend        |
//! | everything else                        | Fatal       | surface immediately               |
//!
//! The same classification applies to every backend; adapters only differ in
//! how they map native codes onto [`BackendErrorKind`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::traits::{BackendError, BackendErrorKind, PlaybackSource};

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

/// How the delay grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base_delay * attempt`
    #[default]
    Linear,
    /// `base_delay * 2^(attempt - 1)`
    Exponential,
}

/// Bounded retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Automatic retries per failure streak.
    ///
    /// Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    ///
    /// Default: 1 second.
    #[serde(default = "default_base_delay")]
    pub base_delay: Duration,

    /// Upper bound applied to every computed delay.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,

    #[serde(default)]
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            strategy: BackoffStrategy::default(),
        }
    }
}

/// How a failure is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Fatal,
    /// Engine crash: replace the backend rather than retry it.
    Fault,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn classify(&self, error: &BackendError) -> ErrorClass {
        match error.kind {
            BackendErrorKind::Timeout | BackendErrorKind::NetworkReset | BackendErrorKind::Io => {
                ErrorClass::Retryable
            }
            BackendErrorKind::BackendFault => ErrorClass::Fault,
            BackendErrorKind::UnsupportedFormat
            | BackendErrorKind::MalformedSource
            | BackendErrorKind::SourceRejected
            | BackendErrorKind::Unknown => ErrorClass::Fatal,
        }
    }

    /// Delay before retry number `attempt` (1-based), clamped to `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.strategy {
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be > 0".to_string());
        }
        if self.base_delay.is_zero() {
            return Err("retry.base_delay must be > 0".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("retry.max_delay cannot be less than retry.base_delay".to_string());
        }
        Ok(())
    }
}

/// Outcome of feeding a failure into [`RetryState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-prepare the last source after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Replace the backend.
    Fallback,
    /// Surface the error and stop.
    GiveUp { exhausted: bool },
}

/// Per-session retry bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    attempt: u32,
    last_source: Option<PlaybackSource>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_source(&self) -> Option<&PlaybackSource> {
        self.last_source.as_ref()
    }

    /// A new (user-initiated) prepare: remember the source, fresh budget.
    pub fn reset_for(&mut self, source: PlaybackSource) {
        self.last_source = Some(source);
        self.attempt = 0;
    }

    /// The stream became ready again.
    pub fn on_recovered(&mut self) {
        self.attempt = 0;
    }

    pub fn on_failure(&mut self, policy: &RetryPolicy, error: &BackendError) -> RetryDecision {
        match policy.classify(error) {
            ErrorClass::Fault => RetryDecision::Fallback,
            ErrorClass::Fatal => RetryDecision::GiveUp { exhausted: false },
            ErrorClass::Retryable if self.last_source.is_none() => {
                RetryDecision::GiveUp { exhausted: false }
            }
            ErrorClass::Retryable if self.attempt >= policy.max_attempts => {
                RetryDecision::GiveUp { exhausted: true }
            }
            ErrorClass::Retryable => {
                self.attempt += 1;
                RetryDecision::Retry {
                    attempt: self.attempt,
                    delay: policy.delay_for(self.attempt),
                }
            }
        }
    }
}
