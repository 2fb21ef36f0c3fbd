//! Activity execution context
//!
//! Carries the deadline and cancellation signal handed down by whatever
//! schedules the power activity.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Start-to-close timeout of a single power activity
pub const POWER_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Context provided to power activities during execution
#[derive(Debug, Clone)]
pub struct ActivityContext {
    /// Deadline for one activity attempt
    timeout: Duration,

    /// Signalled when the caller abandons the activity
    cancellation: CancellationToken,
}

impl Default for ActivityContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityContext {
    /// Create a context with the default power activity timeout
    pub fn new() -> Self {
        Self {
            timeout: POWER_ACTIVITY_TIMEOUT,
            cancellation: CancellationToken::new(),
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel the activity and anything still running under it
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}
