//! Error types for the streaming-session lifecycle layer
//!
//! The taxonomy mirrors how failures are handled rather than where they
//! originate:
//!
//! - **Device errors** are terminal and user-facing. A client with no usable
//!   camera or microphone cannot stream, and retrying will not change that.
//! - **Connect, publish, and timeout errors** are transient. They feed the
//!   retry loop and are never surfaced to the user directly.
//! - **Acknowledgement and backend-notify errors** are logged only. Local
//!   media state stays authoritative regardless of whether the backend heard
//!   about it.
//!
//! # Examples
//!
//! ```rust
//! use roomcast_client_core::error::ControllerError;
//!
//! let err = ControllerError::connect("room server refused the token");
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "connect");
//!
//! let err = ControllerError::device("no camera available");
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// Result type for lifecycle-controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that can occur while coordinating a streaming session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// No usable capture device could be acquired. Terminal and user-facing;
    /// never retried.
    #[error("Device error: {reason}")]
    DeviceError { reason: String },

    /// The room connection could not be established. Retried with unbounded
    /// backoff.
    #[error("Connect error: {reason}")]
    ConnectError { reason: String },

    /// A single connect attempt exceeded its attempt-scoped timeout. Aborts
    /// only that attempt, never the retry loop.
    #[error("Connect attempt timed out after {duration_ms}ms")]
    ConnectTimeout { duration_ms: u64 },

    /// A track was published but did not appear in the connection's own
    /// publication list. Treated exactly like a connect error.
    #[error("Publish error: {reason}")]
    PublishError { reason: String },

    /// A command acknowledgement failed. Logged only; redelivery is handled
    /// by id-based deduplication.
    #[error("Command acknowledgement failed: {reason}")]
    CommandAckError { reason: String },

    /// A backend session/presence update failed. Logged only; the in-memory
    /// media state remains authoritative.
    #[error("Backend notify failed: {reason}")]
    BackendNotifyError { reason: String },

    /// The pub/sub command channel reported a failure.
    #[error("Command channel error: {reason}")]
    ChannelError { reason: String },

    /// A configuration field is missing or invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Internal error that does not fit the other categories.
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ControllerError {
    /// Create a device error
    pub fn device(reason: impl Into<String>) -> Self {
        Self::DeviceError { reason: reason.into() }
    }

    /// Create a connect error
    pub fn connect(reason: impl Into<String>) -> Self {
        Self::ConnectError { reason: reason.into() }
    }

    /// Create a publish error
    pub fn publish(reason: impl Into<String>) -> Self {
        Self::PublishError { reason: reason.into() }
    }

    /// Create a command acknowledgement error
    pub fn command_ack(reason: impl Into<String>) -> Self {
        Self::CommandAckError { reason: reason.into() }
    }

    /// Create a backend notify error
    pub fn backend_notify(reason: impl Into<String>) -> Self {
        Self::BackendNotifyError { reason: reason.into() }
    }

    /// Create a command channel error
    pub fn channel(reason: impl Into<String>) -> Self {
        Self::ChannelError { reason: reason.into() }
    }

    /// Create a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Whether this error should feed the retry loop.
    ///
    /// Connect, publish, and per-attempt timeout failures are transient.
    /// Everything else either terminates the attempt (device, configuration)
    /// or is logged and ignored (acknowledgement, backend notify).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectError { .. } | Self::ConnectTimeout { .. } | Self::PublishError { .. }
        )
    }

    /// Short category label used in structured log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::DeviceError { .. } => "device",
            Self::ConnectError { .. } | Self::ConnectTimeout { .. } => "connect",
            Self::PublishError { .. } => "publish",
            Self::CommandAckError { .. } => "command_ack",
            Self::BackendNotifyError { .. } => "backend_notify",
            Self::ChannelError { .. } => "channel",
            Self::InvalidConfiguration { .. } => "configuration",
            Self::InternalError { .. } => "internal",
        }
    }
}
