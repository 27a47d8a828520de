//! Controller event stream
//!
//! Host applications subscribe to [`ControllerEvent`]s for UI integration: a
//! "retrying" indicator, the blocking device-failure message, state badges.
//! Everything here is informational; no controller behavior depends on
//! whether anyone is listening.

use std::time::Duration;

use crate::command::CommandKind;
use crate::session::StopReason;

use super::RunState;

/// Events emitted by the lifecycle controller
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// The run state changed
    StateChanged {
        /// State before the transition
        previous: RunState,
        /// State after the transition
        current: RunState,
    },
    /// Device acquisition failed terminally. The one user-facing failure:
    /// hosts should show a blocking message.
    DeviceFailure {
        /// Human-readable failure description
        reason: String,
    },
    /// A reconnect attempt was scheduled
    RetryScheduled {
        /// Attempt counter within the current retry cycle
        attempt: u32,
        /// Delay before the attempt runs
        delay: Duration,
    },
    /// The backend session record was opened
    SessionActivated {
        /// Subject the session belongs to
        subject: String,
    },
    /// The backend session record was closed
    SessionClosed {
        /// Subject the session belongs to
        subject: String,
        /// Why the session closed
        reason: StopReason,
    },
    /// A command was accepted for processing
    CommandReceived {
        /// Normalized command verb
        kind: CommandKind,
        /// Delivery id, when present
        id: Option<String>,
    },
    /// A redelivered command was dropped by id-based deduplication
    CommandDuplicate {
        /// Delivery id of the duplicate
        id: String,
    },
}
