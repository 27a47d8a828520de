//! # roomcast-client-core
//!
//! Core lifecycle engine for an unattended, remotely controlled media
//! broadcasting client. It keeps one subject's camera/microphone stream
//! published into a media room, driven by remote START/STOP commands and by
//! its own recovery machinery, with no local user interaction.
//!
//! The crate is transport-agnostic: every external capability (capture
//! devices, the room transport, the realtime command channel, the session
//! backend, presence, wake locks, access tokens, audio output) is a trait
//! the host injects. That makes the whole lifecycle testable against
//! in-memory fakes and portable across host environments.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              SessionLifecycleController                 │
//! │   run state · stop intent · retry loop · health check   │
//! └──┬──────────┬───────────┬───────────┬──────────┬────────┘
//!    │          │           │           │          │
//! DeviceAcquirer RoomConnector CommandChannel SessionBackend WakeLockProvider
//!  (capture)    (connect/     (START/STOP   (session record, (display/CPU
//!               publish)       delivery)     presence)        keep-awake)
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roomcast_client_core::controller::{ControllerBuilder, ControllerConfig};
//! use roomcast_client_core::session::StopReason;
//! # use roomcast_client_core::error::ControllerResult;
//! # async fn capabilities() -> ControllerBuilder { unimplemented!() }
//!
//! # async fn example() -> ControllerResult<()> {
//! let config = ControllerConfig::new(
//!     "alice@example.com",
//!     "wss://rooms.example.com",
//!     "floor-1",
//! );
//!
//! let controller = capabilities().await.with_config(config).build()?;
//!
//! // Boot: connect the command channel, report presence, drain pending
//! // commands, apply the resume decision, spawn background tasks.
//! controller.run().await?;
//!
//! // From here the controller is driven by remote commands; local code
//! // can still start/stop directly.
//! controller.start().await?;
//! controller.stop(StopReason::EndOfShift).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle guarantees
//!
//! - At most one room connection exists per subject; a new connect always
//!   tears down the prior one first.
//! - Reconnection uses persistent backoff: delays grow to a ceiling and the
//!   loop never abandons on its own. Only an explicit stop or a terminal
//!   device failure ends it.
//! - Command processing is idempotent by delivery id and by verb.
//! - The in-memory streaming flag flips before any backend notification, so
//!   the backend record can lag but never lead the real media state.
//! - The auto-resume decision runs exactly once, at boot.

pub mod backend;
pub mod channel;
pub mod command;
pub mod controller;
pub mod device;
pub mod error;
pub mod retry;
pub mod room;
pub mod session;
pub mod wake;

pub use controller::{
    ControllerBuilder, ControllerConfig, ControllerEvent, RecoveryEvent, RunState,
    SessionLifecycleController,
};
pub use error::{ControllerError, ControllerResult};
pub use session::{SessionStatus, StopReason, StreamingSession};

/// Version of the roomcast-client-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
