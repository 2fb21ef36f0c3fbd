//! Retry policy for power activities

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::POWER_ACTIVITY_TIMEOUT;
use crate::error::{ExecutionError, PowerError};

/// How often and how patiently a power activity is attempted
///
/// The default makes a single attempt, leaving retries to whoever schedules
/// the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(with = "duration_secs")]
    pub initial_backoff: Duration,

    /// Upper bound on the delay between attempts
    #[serde(with = "duration_secs")]
    pub max_backoff: Duration,

    /// Start-to-close timeout of each attempt
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            timeout: POWER_ACTIVITY_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay after the given failed attempt (1-based), doubling each time
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether another attempt may follow the given failed attempt
    pub fn should_retry(&self, attempt: u32, err: &PowerError) -> bool {
        attempt < self.max_attempts.max(1) && is_retryable(err)
    }
}

/// Activity failures are retryable; wrong power states and bad requests are not
fn is_retryable(err: &PowerError) -> bool {
    match err {
        PowerError::Resolution(_) => true,
        PowerError::Execution(ExecutionError::Cancelled { .. }) => false,
        PowerError::Execution(_) => true,
        PowerError::WrongPowerState { .. } | PowerError::InvalidRequest(_) => false,
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
