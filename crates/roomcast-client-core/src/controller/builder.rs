//! Builder for [`SessionLifecycleController`]
//!
//! Every external capability is injected as a trait object, which is what
//! makes the controller fully testable with in-memory fakes. The builder
//! validates the configuration and checks that all capabilities were
//! provided before constructing the controller.

use std::sync::Arc;

use crate::backend::{AccessTokenProvider, PresenceReporter, SessionBackend};
use crate::channel::CommandChannel;
use crate::command::PendingCommandStore;
use crate::device::DeviceAcquirer;
use crate::error::{ControllerError, ControllerResult};
use crate::room::{RemoteAudioSink, RoomConnector, RoomTransport};
use crate::wake::WakeLockProvider;

use super::{ControllerConfig, SessionLifecycleController};

/// Builder for a [`SessionLifecycleController`]
///
/// # Examples
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use roomcast_client_core::controller::{ControllerBuilder, ControllerConfig};
/// # fn capabilities() -> ControllerBuilder { unimplemented!() }
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ControllerConfig::new(
///     "alice@example.com",
///     "wss://rooms.example.com",
///     "floor-1",
/// );
///
/// let controller = capabilities()
///     .with_config(config)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ControllerBuilder {
    config: Option<ControllerConfig>,
    devices: Option<Arc<dyn DeviceAcquirer>>,
    transport: Option<Arc<dyn RoomTransport>>,
    channel: Option<Arc<dyn CommandChannel>>,
    pending: Option<Arc<dyn PendingCommandStore>>,
    backend: Option<Arc<dyn SessionBackend>>,
    presence: Option<Arc<dyn PresenceReporter>>,
    wake: Option<Arc<dyn WakeLockProvider>>,
    tokens: Option<Arc<dyn AccessTokenProvider>>,
    audio_sink: Option<Arc<dyn RemoteAudioSink>>,
}

impl ControllerBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            config: None,
            devices: None,
            transport: None,
            channel: None,
            pending: None,
            backend: None,
            presence: None,
            wake: None,
            tokens: None,
            audio_sink: None,
        }
    }

    /// Set the controller configuration
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the capture device acquirer
    pub fn with_devices(mut self, devices: Arc<dyn DeviceAcquirer>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Set the room transport; the controller builds its own
    /// [`RoomConnector`] over it
    pub fn with_room_transport(mut self, transport: Arc<dyn RoomTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the command channel
    pub fn with_command_channel(mut self, channel: Arc<dyn CommandChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Set the pending-command store
    pub fn with_pending_commands(mut self, pending: Arc<dyn PendingCommandStore>) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Set the session backend
    pub fn with_session_backend(mut self, backend: Arc<dyn SessionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the presence reporter
    pub fn with_presence(mut self, presence: Arc<dyn PresenceReporter>) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Set the wake lock provider
    pub fn with_wake_lock(mut self, wake: Arc<dyn WakeLockProvider>) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Set the room access-token provider
    pub fn with_token_provider(mut self, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set the sink remote audio tracks get routed to
    pub fn with_audio_sink(mut self, audio_sink: Arc<dyn RemoteAudioSink>) -> Self {
        self.audio_sink = Some(audio_sink);
        self
    }

    /// Validate and build the controller
    pub fn build(self) -> ControllerResult<SessionLifecycleController> {
        let config = self
            .config
            .ok_or_else(|| ControllerError::config("config", "not provided"))?;
        config.validate()?;

        let connector = RoomConnector::new(
            require(self.transport, "room_transport")?,
            config.connect_timeout,
            config.connect_timeout_cap,
        );

        Ok(SessionLifecycleController::from_parts(
            config,
            require(self.devices, "devices")?,
            connector,
            require(self.channel, "command_channel")?,
            require(self.pending, "pending_commands")?,
            require(self.backend, "session_backend")?,
            require(self.presence, "presence")?,
            require(self.wake, "wake_lock")?,
            require(self.tokens, "token_provider")?,
            require(self.audio_sink, "audio_sink")?,
        ))
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn require<T>(slot: Option<T>, field: &str) -> ControllerResult<T> {
    slot.ok_or_else(|| ControllerError::config(field, "capability not provided"))
}
