//! Streaming-session records and the resume-after-disconnect policy
//!
//! A [`StreamingSession`] is the authoritative backend record of liveness:
//! opened when the controller starts publishing, closed with a
//! [`StopReason`] when it stops. The controller is the only writer; reads
//! happen once at boot to drive [`resume_decision`].
//!
//! # Resume policy
//!
//! A client that comes up finds at most one prior session record. It resumes
//! streaming without waiting for a new START command iff:
//!
//! - the prior session was never closed (`stopped_at` is `None`, meaning the
//!   process died without tearing down), or
//! - the prior session was closed because of a disconnect
//!   ([`StopReason::Disconnect`]) and less than the resume window has
//!   elapsed. The boundary is exclusive.
//!
//! A session closed by an administrative command ([`StopReason::Command`])
//! never auto-resumes, no matter how recent.
//!
//! # Examples
//!
//! ```rust
//! use roomcast_client_core::session::{resume_decision, StopReason, StreamingSession};
//! use chrono::{Duration as Delta, Utc};
//! use std::time::Duration;
//!
//! let window = Duration::from_secs(300);
//! let now = Utc::now();
//!
//! // Closed two minutes ago because the network dropped: resume.
//! let session = StreamingSession::closed(
//!     "alice@example.com",
//!     now - Delta::minutes(10),
//!     now - Delta::minutes(2),
//!     StopReason::Disconnect,
//! );
//! assert!(resume_decision(Some(&session), now, window));
//!
//! // Stopped by command: never resume.
//! let session = StreamingSession::closed(
//!     "alice@example.com",
//!     now - Delta::minutes(10),
//!     now - Delta::seconds(5),
//!     StopReason::Command,
//! );
//! assert!(!resume_decision(Some(&session), now, window));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a streaming session was closed
///
/// Recorded on the backend session record and consulted by
/// [`resume_decision`] at the next boot. `Command` means an administrator or
/// the operator deliberately ended the session; `Disconnect` means media
/// stopped flowing without anyone asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// Operator stepped away briefly
    QuickBreak,
    /// Scheduled short break
    ShortBreak,
    /// Scheduled lunch break
    LunchBreak,
    /// Emergency interruption
    Emergency,
    /// Normal end of the working shift
    EndOfShift,
    /// Stopped by a remote STOP command or a deliberate local stop.
    /// Sessions closed with this reason never auto-resume.
    Command,
    /// Media stopped flowing without an explicit stop (network drop,
    /// suspend). Eligible for auto-resume inside the resume window.
    Disconnect,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StopReason::QuickBreak => "QUICK_BREAK",
            StopReason::ShortBreak => "SHORT_BREAK",
            StopReason::LunchBreak => "LUNCH_BREAK",
            StopReason::Emergency => "EMERGENCY",
            StopReason::EndOfShift => "END_OF_SHIFT",
            StopReason::Command => "COMMAND",
            StopReason::Disconnect => "DISCONNECT",
        };
        write!(f, "{}", label)
    }
}

/// Lifecycle status of a session record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// The subject is currently streaming
    Active,
    /// The session has been closed with a stop reason
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "ACTIVE"),
            SessionStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Authoritative backend record of a streaming session
///
/// Created when the controller transitions to Streaming and closed with a
/// [`StopReason`] when it stops. Only the controller writes these records,
/// via the [`SessionBackend`](crate::backend::SessionBackend) capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingSession {
    /// The streaming client/operator this session belongs to
    pub subject_id: String,
    /// When the session was opened
    pub started_at: DateTime<Utc>,
    /// When the session was closed. `None` means the session was never
    /// closed, i.e. the client terminated abnormally while streaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    /// Why the session was closed, when it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Current status of the record
    pub status: SessionStatus,
}

impl StreamingSession {
    /// Create an open (active) session record
    pub fn active(subject_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            subject_id: subject_id.into(),
            started_at,
            stopped_at: None,
            stop_reason: None,
            status: SessionStatus::Active,
        }
    }

    /// Create a closed session record
    pub fn closed(
        subject_id: impl Into<String>,
        started_at: DateTime<Utc>,
        stopped_at: DateTime<Utc>,
        reason: StopReason,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            started_at,
            stopped_at: Some(stopped_at),
            stop_reason: Some(reason),
            status: SessionStatus::Closed,
        }
    }
}

/// Decide whether a freshly booted client should resume streaming.
///
/// Runs exactly once at initial connection, never on later reconnect or
/// visibility events, so that a deliberate stop is never overridden.
///
/// Returns `true` iff the prior session was never closed (abnormal
/// termination) or it was closed with [`StopReason::Disconnect`] and strictly
/// less than `window` has elapsed since `stopped_at`. At exactly `window`
/// elapsed the answer is `false`.
pub fn resume_decision(
    last: Option<&StreamingSession>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    let Some(session) = last else {
        return false;
    };
    match session.stopped_at {
        // Never closed: the previous process died while streaming.
        None => true,
        Some(stopped_at) => {
            if session.stop_reason != Some(StopReason::Disconnect) {
                return false;
            }
            let elapsed_ms = (now - stopped_at).num_milliseconds() as i128;
            elapsed_ms < window.as_millis() as i128
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as Delta;

    const WINDOW: Duration = Duration::from_secs(300);

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn no_prior_session_does_not_resume() {
        assert!(!resume_decision(None, now(), WINDOW));
    }

    #[test]
    fn unclosed_session_resumes() {
        let t = now();
        let session = StreamingSession::active("alice@example.com", t - Delta::hours(2));
        assert!(resume_decision(Some(&session), t, WINDOW));
    }

    #[test]
    fn disconnect_inside_window_resumes() {
        let t = now();
        let session = StreamingSession::closed(
            "alice@example.com",
            t - Delta::minutes(30),
            t - Delta::seconds(299),
            StopReason::Disconnect,
        );
        assert!(resume_decision(Some(&session), t, WINDOW));
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let t = now();
        let session = StreamingSession::closed(
            "alice@example.com",
            t - Delta::minutes(30),
            t - Delta::seconds(300),
            StopReason::Disconnect,
        );
        assert!(!resume_decision(Some(&session), t, WINDOW));
    }

    #[test]
    fn command_stop_never_resumes() {
        let t = now();
        // Even one second after a command stop, no resume.
        let session = StreamingSession::closed(
            "alice@example.com",
            t - Delta::minutes(30),
            t - Delta::seconds(1),
            StopReason::Command,
        );
        assert!(!resume_decision(Some(&session), t, WINDOW));
    }

    #[test]
    fn break_reasons_never_resume() {
        let t = now();
        for reason in [
            StopReason::QuickBreak,
            StopReason::ShortBreak,
            StopReason::LunchBreak,
            StopReason::Emergency,
            StopReason::EndOfShift,
        ] {
            let session = StreamingSession::closed(
                "alice@example.com",
                t - Delta::minutes(30),
                t - Delta::seconds(1),
                reason,
            );
            assert!(!resume_decision(Some(&session), t, WINDOW), "{reason}");
        }
    }

    #[test]
    fn stop_reason_wire_names() {
        let json = serde_json::to_string(&StopReason::QuickBreak).unwrap();
        assert_eq!(json, "\"QUICK_BREAK\"");
        let parsed: StopReason = serde_json::from_str("\"END_OF_SHIFT\"").unwrap();
        assert_eq!(parsed, StopReason::EndOfShift);
    }

    #[test]
    fn session_record_round_trips_camel_case() {
        let t = now();
        let session =
            StreamingSession::closed("alice@example.com", t, t, StopReason::Disconnect);
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("subjectId").is_some());
        assert!(json.get("stoppedAt").is_some());
        assert_eq!(json["stopReason"], "DISCONNECT");
    }
}
