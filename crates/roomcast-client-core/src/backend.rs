//! Backend capabilities: session records, presence, and room tokens
//!
//! These traits are the controller's only view of the backend. Every
//! implementation failure is converted by the controller into a logged
//! [`BackendNotifyError`](crate::error::ControllerError::BackendNotifyError);
//! local media state stays authoritative no matter what the backend says.

use async_trait::async_trait;

use crate::error::ControllerResult;
use crate::session::{StopReason, StreamingSession};

/// Session record endpoints consumed by the controller
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Open (or re-open) the active session record for a subject
    async fn set_active(&self, subject: &str) -> ControllerResult<()>;

    /// Close the session record with a stop reason and timestamp
    async fn set_inactive(&self, subject: &str, reason: StopReason) -> ControllerResult<()>;

    /// Fetch the most recent session record for a subject, if any
    async fn last_session(&self, subject: &str) -> ControllerResult<Option<StreamingSession>>;
}

/// Online/offline presence endpoints
///
/// Informed on every flip of the in-memory streaming flag, best-effort.
#[async_trait]
pub trait PresenceReporter: Send + Sync {
    /// Report the subject as online
    async fn set_online(&self, subject: &str) -> ControllerResult<()>;

    /// Report the subject as offline
    async fn set_offline(&self, subject: &str) -> ControllerResult<()>;
}

/// Room access-token acquisition
///
/// Token issuance is a backend concern; the controller only calls it. A
/// failed token fetch is treated like a connect failure and feeds the retry
/// loop.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Obtain a join token for `identity` in `room`
    async fn room_token(&self, identity: &str, room: &str) -> ControllerResult<String>;
}
