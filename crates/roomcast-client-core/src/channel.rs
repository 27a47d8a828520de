//! Pub/sub command-channel contract
//!
//! The channel is an external capability with a narrow but strict contract:
//!
//! - `connect` is idempotent; calling it on an already-connected channel is
//!   a no-op.
//! - Group membership does NOT survive reconnects. Every group must be
//!   re-joined after each [`ChannelEvent::Reconnected`].
//! - Delivery is at-least-once and unordered across groups. Every message
//!   may be a duplicate; consumers deduplicate by command id.
//! - `reconnect` forces a manual reconnection. The drift detector uses it
//!   when a timer fires far later than scheduled, which indicates the
//!   process or tab was suspended and the socket may be silently dead.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::command::CommandEnvelope;
use crate::error::ControllerResult;

/// Events surfaced by the command channel
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A command message was delivered (possibly a duplicate)
    Message(CommandEnvelope),
    /// The transport reconnected; group membership has been lost and must
    /// be re-established
    Reconnected,
    /// The transport lost its connection
    Disconnected,
}

/// External pub/sub transport carrying remote commands
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Connect as `identity`. Idempotent.
    async fn connect(&self, identity: &str) -> ControllerResult<()>;

    /// Join a delivery group. Must be re-issued after every reconnect.
    async fn join_group(&self, name: &str) -> ControllerResult<()>;

    /// Force a manual reconnection (used on suspected silent stalls)
    async fn reconnect(&self) -> ControllerResult<()>;

    /// Subscribe to channel events
    fn events(&self) -> broadcast::Receiver<ChannelEvent>;
}
