//! Configuration for the session lifecycle controller
//!
//! All timing policy lives here: the resume window, health-check and drift
//! intervals, the retry strategy, and the attempt-scoped connect timeout
//! bounds. Defaults match the reference deployment (5 minute resume window,
//! 10 second health checks).

use std::time::Duration;

use crate::error::{ControllerError, ControllerResult};
use crate::retry::RetryConfig;
use crate::room::VideoPublishOptions;

/// Configuration for a [`SessionLifecycleController`](super::SessionLifecycleController)
///
/// # Examples
///
/// ```rust
/// use roomcast_client_core::controller::ControllerConfig;
/// use std::time::Duration;
///
/// let config = ControllerConfig::new(
///     "alice@example.com",
///     "wss://rooms.example.com",
///     "floor-1",
/// )
/// .with_resume_window(Duration::from_secs(120))
/// .with_keep_awake_while_idle(true);
///
/// assert_eq!(config.resume_window, Duration::from_secs(120));
/// assert!(config.keep_awake_while_idle);
/// assert_eq!(config.subject_group(), "commands:alice@example.com");
/// ```
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Subject identity (email) this controller streams for
    pub identity: String,
    /// Room server URL
    pub room_url: String,
    /// Room name to join
    pub room_name: String,
    /// Bound on auto-resume eligibility after a disconnect-caused stop
    pub resume_window: Duration,
    /// Interval of the media health check while streaming
    pub health_check_interval: Duration,
    /// Interval of the drift/sleep detector tick
    pub drift_check_interval: Duration,
    /// How late a drift tick may fire before a silent stall is suspected
    pub drift_tolerance: Duration,
    /// Keep the wake lock held even while not streaming
    pub keep_awake_while_idle: bool,
    /// Persistent-backoff retry strategy
    pub retry: RetryConfig,
    /// Base connect timeout for attempt zero
    pub connect_timeout: Duration,
    /// Ceiling for the attempt-scoped connect timeout
    pub connect_timeout_cap: Duration,
    /// Video publish profile
    pub video: VideoPublishOptions,
    /// Additional broadcast group carrying commands for all subjects
    pub broadcast_group: Option<String>,
}

impl ControllerConfig {
    /// Create a configuration with reference defaults
    pub fn new(
        identity: impl Into<String>,
        room_url: impl Into<String>,
        room_name: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            room_url: room_url.into(),
            room_name: room_name.into(),
            resume_window: Duration::from_secs(300),
            health_check_interval: Duration::from_secs(10),
            drift_check_interval: Duration::from_secs(30),
            drift_tolerance: Duration::from_secs(20),
            keep_awake_while_idle: false,
            retry: RetryConfig::default(),
            connect_timeout: Duration::from_secs(10),
            connect_timeout_cap: Duration::from_secs(30),
            video: VideoPublishOptions::default(),
            broadcast_group: None,
        }
    }

    /// Set the resume window
    pub fn with_resume_window(mut self, window: Duration) -> Self {
        self.resume_window = window;
        self
    }

    /// Set the health-check interval
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set the drift detector interval and lateness tolerance
    pub fn with_drift_detection(mut self, interval: Duration, tolerance: Duration) -> Self {
        self.drift_check_interval = interval;
        self.drift_tolerance = tolerance;
        self
    }

    /// Keep the wake lock held while idle
    pub fn with_keep_awake_while_idle(mut self, keep: bool) -> Self {
        self.keep_awake_while_idle = keep;
        self
    }

    /// Set the retry strategy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the connect timeout base and cap
    pub fn with_connect_timeout(mut self, base: Duration, cap: Duration) -> Self {
        self.connect_timeout = base;
        self.connect_timeout_cap = cap;
        self
    }

    /// Set the video publish profile
    pub fn with_video(mut self, video: VideoPublishOptions) -> Self {
        self.video = video;
        self
    }

    /// Also join a broadcast group carrying commands for all subjects
    pub fn with_broadcast_group(mut self, group: impl Into<String>) -> Self {
        self.broadcast_group = Some(group.into());
        self
    }

    /// Name of the per-subject command group
    pub fn subject_group(&self) -> String {
        format!("commands:{}", self.identity.trim().to_ascii_lowercase())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ControllerResult<()> {
        if self.identity.trim().is_empty() {
            return Err(ControllerError::config("identity", "must not be empty"));
        }
        if self.room_url.trim().is_empty() {
            return Err(ControllerError::config("room_url", "must not be empty"));
        }
        if self.room_name.trim().is_empty() {
            return Err(ControllerError::config("room_name", "must not be empty"));
        }
        if self.resume_window.is_zero() {
            return Err(ControllerError::config(
                "resume_window",
                "must be greater than zero",
            ));
        }
        if self.health_check_interval.is_zero() {
            return Err(ControllerError::config(
                "health_check_interval",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
