//! Persistent-backoff retry policy and attempt-scoped timeouts
//!
//! Reconnection follows one named, deliberate strategy: **persistent
//! backoff**. Delays grow exponentially up to a ceiling and then hold at the
//! ceiling forever; the retry loop never gives up on its own. The only
//! things that end it are an explicit `stop()` (or STOP command) and a
//! terminal device failure. This is a policy, not a bug: an unattended
//! broadcasting client must come back on its own after an outage of any
//! length.
//!
//! The retry position lives in one explicit [`RetryState`] value owned by a
//! single scheduler task, rather than in a chain of nested timer callbacks.
//! It resets to attempt zero on every explicit stop()/start() cycle.
//!
//! # Examples
//!
//! ```rust
//! use roomcast_client_core::retry::{RetryConfig, RetryState};
//! use std::time::Duration;
//!
//! let config = RetryConfig {
//!     initial_delay: Duration::from_secs(1),
//!     max_delay: Duration::from_secs(30),
//!     backoff_multiplier: 2.0,
//!     use_jitter: false,
//! };
//!
//! let mut state = RetryState::new(&config);
//! assert_eq!(state.attempt, 0);
//! assert_eq!(state.next_delay(), Duration::from_secs(1));
//! assert_eq!(state.next_delay(), Duration::from_secs(2));
//! assert_eq!(state.next_delay(), Duration::from_secs(4));
//!
//! // The delay saturates at the ceiling and stays there.
//! for _ in 0..10 {
//!     state.next_delay();
//! }
//! assert_eq!(state.next_delay(), Duration::from_secs(30));
//! assert_eq!(state.next_delay(), Duration::from_secs(30));
//! ```

use std::future::Future;
use std::time::Duration;
use tracing::error;

use crate::error::{ControllerError, ControllerResult};

/// Configuration for the persistent-backoff retry strategy
///
/// There is no maximum attempt count on purpose; see the module docs.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry attempt
    pub initial_delay: Duration,
    /// Ceiling the delay grows to and then holds at
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
    /// Whether to add ±10% jitter to each scheduled delay
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Apply configured jitter to a scheduled delay.
    ///
    /// Jitter spreads simultaneous reconnect storms from many clients after
    /// a shared outage. The underlying backoff sequence stays monotonic;
    /// jitter only perturbs the actual sleep by up to ±10%.
    pub fn jittered(&self, delay: Duration) -> Duration {
        if !self.use_jitter {
            return delay;
        }
        let jitter = (rand::random::<f64>() - 0.5) * 0.2;
        let millis = delay.as_millis() as f64;
        Duration::from_millis((millis * (1.0 + jitter)) as u64)
    }
}

/// Position within a retry cycle: the attempt counter and the delay the
/// next attempt will wait for
///
/// In-memory only. A fresh state (attempt zero) is created on every explicit
/// stop()/start() cycle and whenever a healthy session drops back into the
/// retry loop.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Number of attempts already scheduled in this cycle
    pub attempt: u32,
    /// Delay the next attempt will wait for
    pub next_delay: Duration,
    config: RetryConfig,
}

impl RetryState {
    /// Start a fresh retry cycle at attempt zero
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            next_delay: config.initial_delay,
            config: config.clone(),
        }
    }

    /// Return the delay for the upcoming attempt and advance the state.
    ///
    /// The returned sequence is monotonically non-decreasing up to
    /// `max_delay` and constant afterwards.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next_delay;
        self.attempt = self.attempt.saturating_add(1);
        let grown_ms = (delay.as_millis() as f64 * self.config.backoff_multiplier) as u64;
        self.next_delay = Duration::from_millis(grown_ms).min(self.config.max_delay);
        delay
    }
}

/// Attempt-scoped connect timeout.
///
/// The allowance grows linearly with the retry attempt (slow networks get
/// more room once quick reconnects have failed) and is capped. Exceeding it
/// aborts only that attempt.
pub fn connect_timeout(base: Duration, cap: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.saturating_add(1)).min(cap)
}

/// Run a future under a timeout, converting elapsed timers into
/// [`ControllerError::ConnectTimeout`].
pub async fn with_timeout<T, F>(
    operation_name: &str,
    timeout: Duration,
    future: F,
) -> ControllerResult<T>
where
    F: Future<Output = ControllerResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                operation = operation_name,
                timeout_ms = timeout.as_millis(),
                "operation timed out"
            );
            Err(ControllerError::ConnectTimeout {
                duration_ms: timeout.as_millis() as u64,
            })
        }
    }
}
