//! Remote START/STOP commands and the pending-command store contract
//!
//! Commands arrive over an at-least-once pub/sub channel and, for clients
//! that were offline when a command was issued, through the
//! [`PendingCommandStore`]. Both paths can redeliver, so processing is
//! idempotent by command id.
//!
//! Command text on the wire is free-form enough to warrant normalization:
//! case and surrounding whitespace are ignored, and any value that is not a
//! recognized START is treated as STOP. Defaulting to STOP is deliberate: a
//! garbled command must never leave a camera running.
//!
//! # Examples
//!
//! ```rust
//! use roomcast_client_core::command::CommandKind;
//!
//! assert_eq!(CommandKind::parse("START"), CommandKind::Start);
//! assert_eq!(CommandKind::parse("  start \n"), CommandKind::Start);
//! assert_eq!(CommandKind::parse("Stop"), CommandKind::Stop);
//! // Unknown values default to STOP.
//! assert_eq!(CommandKind::parse("PAUSE"), CommandKind::Stop);
//! assert_eq!(CommandKind::parse(""), CommandKind::Stop);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ControllerResult;
use crate::session::StopReason;

/// Normalized command verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Begin (or keep) streaming
    Start,
    /// Stop streaming
    Stop,
}

impl CommandKind {
    /// Normalize raw command text.
    ///
    /// Case and surrounding whitespace are ignored. Anything that is not
    /// `START` parses as [`CommandKind::Stop`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "START" => CommandKind::Start,
            _ => CommandKind::Stop,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Start => write!(f, "START"),
            CommandKind::Stop => write!(f, "STOP"),
        }
    }
}

/// Wire form of a remote command
///
/// `id` is optional on the wire; commands without one cannot be deduplicated
/// and rely on start/stop themselves being idempotent. A STOP may carry a
/// [`StopReason`] naming the kind of break; when absent, a remote stop is
/// recorded as [`StopReason::Command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Delivery id used for deduplication and acknowledgement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Raw command text; normalized with [`CommandKind::parse`]
    pub command: String,
    /// Email of the subject this command targets
    pub employee_email: String,
    /// Optional stop reason riding on a STOP command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
    /// When the command was issued
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CommandEnvelope {
    /// Whether this command is addressed to the given subject identity.
    /// Email comparison is case-insensitive.
    pub fn targets(&self, identity: &str) -> bool {
        self.employee_email.eq_ignore_ascii_case(identity.trim())
    }

    /// Normalized command verb
    pub fn kind(&self) -> CommandKind {
        CommandKind::parse(&self.command)
    }
}

/// Store of commands issued while the client was offline
///
/// External capability. `fetch` returns whatever accumulated while the
/// client was unreachable; `acknowledge` marks ids as processed and is
/// best-effort: a failed acknowledgement is logged and the command is
/// simply redelivered later, which id-based deduplication absorbs.
#[async_trait]
pub trait PendingCommandStore: Send + Sync {
    /// Fetch commands issued while offline
    async fn fetch(&self) -> ControllerResult<Vec<CommandEnvelope>>;

    /// Mark command ids as processed. Best-effort; failures are non-fatal.
    async fn acknowledge(&self, ids: &[String]) -> ControllerResult<()>;
}
