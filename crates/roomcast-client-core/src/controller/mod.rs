//! Session lifecycle orchestration
//!
//! [`SessionLifecycleController`] is the single logical owner of one
//! subject's streaming session. It owns the run state, processes remote
//! commands, drives the [`RoomConnector`], manages the wake lock, runs the
//! health check and drift detector, applies the boot-time resume policy, and
//! keeps the backend session record consistent with the actual media state.
//!
//! # Execution model
//!
//! There are no parallel threads of control, only overlapping asynchronous
//! operations serialized by explicit guards:
//!
//! - a single-flight gate serializes `start()`, `stop()`, and every
//!   reconnect attempt,
//! - one consolidated stop-intent value (not a collection of booleans)
//!   suppresses reconnects racing a deliberate stop,
//! - a compare-and-swap recovery flag guarantees exactly one
//!   Streaming → Retrying transition under overlapping health-check ticks,
//! - the streaming flag flips before any asynchronous backend notification,
//!   so the backend can lag but never lead the real media state.
//!
//! The reconnect policy is persistent backoff (see [`crate::retry`]): the
//! retry loop never terminates on its own, only on an explicit stop or a
//! terminal device failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::backend::{AccessTokenProvider, PresenceReporter, SessionBackend};
use crate::channel::{ChannelEvent, CommandChannel};
use crate::command::{CommandEnvelope, CommandKind, PendingCommandStore};
use crate::device::{acquire_with_fallback, CapturedMedia, DeviceAcquirer};
use crate::error::{ControllerError, ControllerResult};
use crate::retry::RetryState;
use crate::room::{
    RemoteAudioSink, RoomConnection, RoomConnector, RoomEvent, RoomOptions, RoomSession,
};
use crate::session::{resume_decision, StopReason};
use crate::wake::{WakeLockHandle, WakeLockProvider};

pub mod builder;
pub mod config;
pub mod events;


pub use builder::ControllerBuilder;
pub use config::ControllerConfig;
pub use events::ControllerEvent;

/// Run state of the lifecycle controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not streaming, ready to start
    Idle,
    /// A start sequence is in progress
    Starting,
    /// Connected, published, session record active
    Streaming,
    /// Media dropped; the persistent-backoff loop is reconnecting
    Retrying,
    /// Stopped deliberately or terminally; ready for the next start
    Stopped,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Starting => write!(f, "Starting"),
            RunState::Streaming => write!(f, "Streaming"),
            RunState::Retrying => write!(f, "Retrying"),
            RunState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Host-surfaced liveness events that warrant re-establishing ambient
/// resources (channel groups, wake lock) but never a resume decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEvent {
    /// The tab/window became visible again
    TabVisible,
    /// The network interface came back online
    NetworkOnline,
    /// The page was restored from the back/forward cache
    PageRestored,
}

/// The one authoritative stop-intent value for the current session.
///
/// Set before any asynchronous teardown step, checked by every path that
/// could reconnect. Cleared only by the next explicit `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopIntent {
    /// No stop requested
    None,
    /// A deliberate local or remote stop with the recorded reason
    Manual { reason: StopReason },
}

struct Inner {
    config: ControllerConfig,

    // Capabilities
    devices: Arc<dyn DeviceAcquirer>,
    connector: RoomConnector,
    channel: Arc<dyn CommandChannel>,
    pending: Arc<dyn PendingCommandStore>,
    backend: Arc<dyn SessionBackend>,
    presence: Arc<dyn PresenceReporter>,
    wake: Arc<dyn WakeLockProvider>,
    tokens: Arc<dyn AccessTokenProvider>,
    audio_sink: Arc<dyn RemoteAudioSink>,

    // Controller-owned state
    state: StdMutex<RunState>,
    streaming: AtomicBool,
    stop_intent: StdMutex<StopIntent>,
    recovering: AtomicBool,
    start_gate: TokioMutex<()>,
    media: TokioMutex<Option<CapturedMedia>>,
    connection: TokioMutex<Option<RoomConnection>>,
    wake_handle: TokioMutex<Option<Box<dyn WakeLockHandle>>>,
    retry_task: StdMutex<Option<JoinHandle<()>>>,
    background_tasks: StdMutex<Vec<JoinHandle<()>>>,
    processed_commands: DashMap<String, ()>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

/// Top-level orchestrator of one subject's streaming session
///
/// Cheap to clone; all clones share the same controller state. Built with
/// [`ControllerBuilder`].
#[derive(Clone)]
pub struct SessionLifecycleController {
    inner: Arc<Inner>,
}

impl SessionLifecycleController {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        config: ControllerConfig,
        devices: Arc<dyn DeviceAcquirer>,
        connector: RoomConnector,
        channel: Arc<dyn CommandChannel>,
        pending: Arc<dyn PendingCommandStore>,
        backend: Arc<dyn SessionBackend>,
        presence: Arc<dyn PresenceReporter>,
        wake: Arc<dyn WakeLockProvider>,
        tokens: Arc<dyn AccessTokenProvider>,
        audio_sink: Arc<dyn RemoteAudioSink>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                config,
                devices,
                connector,
                channel,
                pending,
                backend,
                presence,
                wake,
                tokens,
                audio_sink,
                state: StdMutex::new(RunState::Idle),
                streaming: AtomicBool::new(false),
                stop_intent: StdMutex::new(StopIntent::None),
                recovering: AtomicBool::new(false),
                start_gate: TokioMutex::new(()),
                media: TokioMutex::new(None),
                connection: TokioMutex::new(None),
                wake_handle: TokioMutex::new(None),
                retry_task: StdMutex::new(None),
                background_tasks: StdMutex::new(Vec::new()),
                processed_commands: DashMap::new(),
                event_tx,
            }),
        }
    }

    /// The controller's configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.inner.state.lock().unwrap()
    }

    /// The in-memory streaming flag. Always matches the existence of a live
    /// room connection; flips before backend notifications.
    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::SeqCst)
    }

    /// Whether a room connection currently exists
    pub async fn connection_active(&self) -> bool {
        self.inner.connection.lock().await.is_some()
    }

    /// Subscribe to controller events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Boot the controller: connect the command channel, join groups, report
    /// presence, drain pending commands, apply the resume decision exactly
    /// once, then spawn the command loop, health check, and drift detector.
    pub async fn run(&self) -> ControllerResult<()> {
        let identity = self.inner.config.identity.clone();
        self.inner.channel.connect(&identity).await?;
        self.join_groups().await;

        if let Err(e) = self.inner.presence.set_online(&identity).await {
            warn!(error = %e, category = "backend_notify", "presence set-online failed");
        }
        if self.inner.config.keep_awake_while_idle {
            self.ensure_wake_lock().await;
        }

        self.drain_pending_commands().await;

        // The resume decision runs exactly once, at initial connection.
        // Re-running it on later reconnect or visibility events could
        // override a deliberate stop.
        match self.inner.backend.last_session(&identity).await {
            Ok(last) => {
                if resume_decision(last.as_ref(), Utc::now(), self.inner.config.resume_window) {
                    info!("prior session eligible for auto-resume, starting");
                    if let Err(e) = self.start().await {
                        error!(error = %e, "auto-resume failed");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "could not fetch last session, skipping resume decision");
            }
        }

        self.spawn_channel_loop();
        self.spawn_health_check();
        self.spawn_drift_detector();
        info!(identity = %identity, "lifecycle controller running");
        Ok(())
    }

    /// Start streaming. Idempotent: a no-op while already Starting or
    /// Streaming. The only error surfaced to the caller is a terminal
    /// [`ControllerError::DeviceError`]; connect and publish failures enter
    /// the retry loop and return `Ok`.
    pub async fn start(&self) -> ControllerResult<()> {
        if matches!(self.state(), RunState::Starting | RunState::Streaming) {
            debug!("start ignored, already starting or streaming");
            return Ok(());
        }
        let _gate = self.inner.start_gate.lock().await;
        if matches!(self.state(), RunState::Starting | RunState::Streaming) {
            return Ok(());
        }

        self.clear_stop_intent();
        self.abort_retry_task();
        self.inner.recovering.store(false, Ordering::SeqCst);
        self.set_state(RunState::Starting);

        match self.establish(0).await {
            Ok(()) => {
                self.promote_to_streaming().await;
                Ok(())
            }
            Err(e @ ControllerError::DeviceError { .. }) => {
                error!(error = %e, "device acquisition failed, not retrying");
                self.set_state(RunState::Stopped);
                self.emit(ControllerEvent::DeviceFailure {
                    reason: e.to_string(),
                });
                Err(e)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    category = e.category(),
                    "start attempt failed, entering retry loop"
                );
                self.set_state(RunState::Retrying);
                self.spawn_retry_loop();
                Ok(())
            }
        }
    }

    /// Stop streaming with the given reason. Idempotent: a no-op while not
    /// started. Records stop intent and flips the streaming flag before any
    /// asynchronous teardown or backend notification, so a late disconnect
    /// event on the torn-down connection never triggers a reconnect.
    pub async fn stop(&self, reason: StopReason) {
        if matches!(self.state(), RunState::Idle | RunState::Stopped) {
            debug!(reason = %reason, "stop ignored, not streaming");
            return;
        }

        {
            let mut intent = self.inner.stop_intent.lock().unwrap();
            *intent = StopIntent::Manual { reason };
        }
        self.inner.streaming.store(false, Ordering::SeqCst);
        self.abort_retry_task();

        let _gate = self.inner.start_gate.lock().await;
        self.inner.recovering.store(false, Ordering::SeqCst);
        self.set_state(RunState::Stopped);

        // The recorded intent is authoritative for the reason the backend
        // hears about; a racing stop() that wrote after us wins.
        let reason = match *self.inner.stop_intent.lock().unwrap() {
            StopIntent::Manual { reason } => reason,
            StopIntent::None => reason,
        };

        self.teardown_connection().await;
        {
            let mut media = self.inner.media.lock().await;
            if let Some(captured) = media.take() {
                captured.stop();
            }
        }
        if !self.inner.config.keep_awake_while_idle {
            self.release_wake_lock().await;
        }

        self.notify_inactive(reason).await;
        self.emit(ControllerEvent::SessionClosed {
            subject: self.inner.config.identity.clone(),
            reason,
        });
        info!(reason = %reason, "streaming session stopped");
    }

    /// Process one remote command.
    ///
    /// Commands for other subjects are ignored. Processing is idempotent by
    /// command id: a redelivered id is acknowledged and dropped, and
    /// start/stop themselves are no-ops toward the current state, so the
    /// same command processed twice always produces the same end state.
    /// Acknowledgement is best-effort and never blocks a state transition.
    pub async fn handle_command(&self, envelope: CommandEnvelope) {
        if !envelope.targets(&self.inner.config.identity) {
            trace!(target = %envelope.employee_email, "command for another subject ignored");
            return;
        }

        let kind = envelope.kind();
        if let Some(id) = &envelope.id {
            if self
                .inner
                .processed_commands
                .insert(id.clone(), ())
                .is_some()
            {
                debug!(command_id = %id, "duplicate command dropped");
                self.emit(ControllerEvent::CommandDuplicate { id: id.clone() });
                self.acknowledge(id).await;
                return;
            }
        }

        info!(command = %kind, command_id = ?envelope.id, "processing remote command");
        self.emit(ControllerEvent::CommandReceived {
            kind,
            id: envelope.id.clone(),
        });

        match kind {
            CommandKind::Start => {
                if let Err(e) = self.start().await {
                    error!(error = %e, "remote START failed");
                }
            }
            CommandKind::Stop => {
                self.stop(envelope.reason.unwrap_or(StopReason::Command)).await;
            }
        }

        if let Some(id) = &envelope.id {
            self.acknowledge(id).await;
        }
    }

    /// React to a host liveness event: rejoin command groups and reacquire
    /// the wake lock if policy requires it. Never re-runs the resume
    /// decision; that happens only at boot.
    pub async fn handle_recovery_event(&self, event: RecoveryEvent) {
        debug!(event = ?event, "recovery event");
        self.join_groups().await;
        if self.inner.config.keep_awake_while_idle || self.is_streaming() {
            self.ensure_wake_lock().await;
        }
    }

    /// One health-check evaluation. Normally driven by the interval task
    /// spawned in [`run`](Self::run); public so hosts and tests can force a
    /// check. Overlapping invocations cause at most one
    /// Streaming → Retrying transition.
    pub async fn health_check_tick(&self) {
        if self.state() != RunState::Streaming {
            return;
        }
        let unhealthy = {
            let connection = self.inner.connection.lock().await;
            match connection.as_ref() {
                Some(conn) => !conn.is_connected() || conn.video_track_ended(),
                None => true,
            }
        };
        if unhealthy {
            self.begin_recovery("health check").await;
        }
    }

    /// Stop streaming (if active) and cancel all background tasks.
    pub async fn shutdown(&self, reason: StopReason) {
        self.stop(reason).await;
        for task in self.inner.background_tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        let identity = self.inner.config.identity.clone();
        if let Err(e) = self.inner.presence.set_offline(&identity).await {
            warn!(error = %e, category = "backend_notify", "presence set-offline failed");
        }
        info!("lifecycle controller shut down");
    }

    // ===== internal mechanics =====

    fn emit(&self, event: ControllerEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    fn set_state(&self, next: RunState) {
        let previous = {
            let mut state = self.inner.state.lock().unwrap();
            std::mem::replace(&mut *state, next)
        };
        if previous != next {
            debug!(previous = %previous, current = %next, "run state changed");
            self.emit(ControllerEvent::StateChanged {
                previous,
                current: next,
            });
        }
    }

    fn stop_requested(&self) -> bool {
        matches!(
            *self.inner.stop_intent.lock().unwrap(),
            StopIntent::Manual { .. }
        )
    }

    fn clear_stop_intent(&self) {
        *self.inner.stop_intent.lock().unwrap() = StopIntent::None;
    }

    fn abort_retry_task(&self) {
        if let Some(task) = self.inner.retry_task.lock().unwrap().take() {
            task.abort();
        }
    }

    /// One full connect-and-publish attempt. Caller must hold the start
    /// gate. Any prior connection is torn down first, so at most one room
    /// connection ever exists.
    async fn establish(&self, attempt: u32) -> ControllerResult<()> {
        let config = &self.inner.config;

        // Reuse live capture tracks across reconnects; reacquire when the
        // device track has ended or none are held.
        let media = {
            let mut guard = self.inner.media.lock().await;
            match guard.as_ref() {
                Some(captured) if !captured.video.is_ended() => captured.clone(),
                _ => {
                    if let Some(stale) = guard.take() {
                        stale.stop();
                    }
                    let fresh = acquire_with_fallback(&self.inner.devices).await?;
                    *guard = Some(fresh.clone());
                    fresh
                }
            }
        };

        let token = self
            .inner
            .tokens
            .room_token(&config.identity, &config.room_name)
            .await
            .map_err(|e| ControllerError::connect(format!("token acquisition failed: {e}")))?;

        self.teardown_connection().await;

        let options = RoomOptions {
            identity: config.identity.clone(),
            auto_subscribe: true,
        };
        let session = self
            .inner
            .connector
            .connect(&config.room_url, &token, &options, attempt)
            .await?;

        if let Err(e) = self
            .inner
            .connector
            .publish_video(&session, media.video.clone(), &config.video)
            .await
        {
            session.disconnect().await;
            return Err(e);
        }

        let mut connection = RoomConnection::new(session.clone(), media.video.clone());
        connection.register_task(
            self.inner
                .connector
                .attach_remote_audio(&session, self.inner.audio_sink.clone()),
        );
        connection.register_task(self.spawn_disconnect_watcher(&session));
        debug!(connection_id = %connection.id(), attempt, "room connection established");
        *self.inner.connection.lock().await = Some(connection);

        self.ensure_wake_lock().await;
        Ok(())
    }

    /// Flip to Streaming and notify the backend. Notify failures are logged
    /// only; the local state is authoritative.
    async fn promote_to_streaming(&self) {
        self.inner.streaming.store(true, Ordering::SeqCst);
        self.inner.recovering.store(false, Ordering::SeqCst);
        self.set_state(RunState::Streaming);

        let identity = &self.inner.config.identity;
        if let Err(e) = self.inner.backend.set_active(identity).await {
            warn!(error = %e, category = "backend_notify", "session set-active failed");
        }
        if let Err(e) = self.inner.presence.set_online(identity).await {
            warn!(error = %e, category = "backend_notify", "presence set-online failed");
        }
        self.emit(ControllerEvent::SessionActivated {
            subject: identity.clone(),
        });
        info!("streaming session active");
    }

    /// Exactly one Streaming → Retrying transition per media drop, however
    /// many health ticks or disconnect events observe it.
    async fn begin_recovery(&self, trigger: &str) {
        if self.stop_requested() {
            debug!(trigger, "recovery suppressed by stop intent");
            return;
        }
        if self
            .inner
            .recovering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let _gate = self.inner.start_gate.lock().await;
        if self.stop_requested() || self.state() != RunState::Streaming {
            self.inner.recovering.store(false, Ordering::SeqCst);
            return;
        }

        warn!(trigger, "media path unhealthy, entering retry loop");
        self.inner.streaming.store(false, Ordering::SeqCst);
        self.set_state(RunState::Retrying);
        self.teardown_connection().await;
        self.notify_inactive(StopReason::Disconnect).await;
        self.spawn_retry_loop();
    }

    fn spawn_retry_loop(&self) {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let mut retry = RetryState::new(&controller.inner.config.retry);
            loop {
                let attempt = retry.attempt;
                let delay = retry.next_delay();
                controller.emit(ControllerEvent::RetryScheduled { attempt, delay });
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "reconnect attempt scheduled"
                );
                tokio::time::sleep(controller.inner.config.retry.jittered(delay)).await;

                if controller.stop_requested() {
                    debug!("retry loop ended by stop intent");
                    break;
                }

                let result = {
                    let _gate = controller.inner.start_gate.lock().await;
                    if controller.stop_requested() {
                        break;
                    }
                    let result = controller.establish(attempt).await;
                    if result.is_ok() {
                        // Promote while still holding the gate, exactly like
                        // start(), so a stop() waiting on the gate cannot
                        // interleave with the Streaming transition. A stop
                        // that landed during establish() wins: leave the
                        // stored connection for it to tear down.
                        if controller.stop_requested() {
                            break;
                        }
                        controller.promote_to_streaming().await;
                    }
                    result
                };

                match result {
                    Ok(()) => break,
                    Err(e @ ControllerError::DeviceError { .. }) => {
                        // Device failures are never retried, even here.
                        error!(error = %e, "capture device lost, leaving retry loop");
                        controller.inner.recovering.store(false, Ordering::SeqCst);
                        controller.set_state(RunState::Stopped);
                        controller.emit(ControllerEvent::DeviceFailure {
                            reason: e.to_string(),
                        });
                        break;
                    }
                    Err(e) => {
                        warn!(
                            attempt,
                            error = %e,
                            category = e.category(),
                            "reconnect attempt failed"
                        );
                    }
                }
            }
        });

        if let Some(old) = self.inner.retry_task.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    fn spawn_disconnect_watcher(&self, session: &Arc<dyn RoomSession>) -> JoinHandle<()> {
        let mut events = session.events();
        let controller = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(RoomEvent::Disconnected { reason }) => {
                        warn!(reason = ?reason, "room session reported disconnect");
                        // Recover from a detached task: teardown aborts this
                        // watcher, and a task must not abort itself mid-way.
                        let controller = controller.clone();
                        tokio::spawn(async move {
                            controller.begin_recovery("room disconnected").await;
                        });
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "disconnect watcher lagged behind room events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn spawn_channel_loop(&self) {
        let controller = self.clone();
        let mut events = self.inner.channel.events();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ChannelEvent::Message(envelope)) => {
                        controller.handle_command(envelope).await;
                    }
                    Ok(ChannelEvent::Reconnected) => {
                        // Membership does not survive reconnects. Rejoin and
                        // drain, but never re-run the resume decision here.
                        info!("command channel reconnected, rejoining groups");
                        controller.join_groups().await;
                        controller.drain_pending_commands().await;
                    }
                    Ok(ChannelEvent::Disconnected) => {
                        debug!("command channel disconnected");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "command loop lagged behind channel events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.inner.background_tasks.lock().unwrap().push(handle);
    }

    fn spawn_health_check(&self) {
        let controller = self.clone();
        let period = self.inner.config.health_check_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                controller.health_check_tick().await;
            }
        });
        self.inner.background_tasks.lock().unwrap().push(handle);
    }

    fn spawn_drift_detector(&self) {
        let controller = self.clone();
        let period = self.inner.config.drift_check_interval;
        let tolerance = self.inner.config.drift_tolerance;
        let handle = tokio::spawn(async move {
            loop {
                let before = tokio::time::Instant::now();
                tokio::time::sleep(period).await;
                let late = before.elapsed().saturating_sub(period);
                if late > tolerance {
                    // A tick firing this late means the process or tab was
                    // suspended; the channel socket may be silently dead.
                    warn!(
                        late_ms = late.as_millis() as u64,
                        "timer drift detected, forcing channel reconnect"
                    );
                    if let Err(e) = controller.inner.channel.reconnect().await {
                        warn!(error = %e, "forced channel reconnect failed");
                    }
                    controller.join_groups().await;
                    if controller.inner.config.keep_awake_while_idle
                        || controller.is_streaming()
                    {
                        controller.ensure_wake_lock().await;
                    }
                }
            }
        });
        self.inner.background_tasks.lock().unwrap().push(handle);
    }

    async fn join_groups(&self) {
        let subject_group = self.inner.config.subject_group();
        if let Err(e) = self.inner.channel.join_group(&subject_group).await {
            warn!(group = %subject_group, error = %e, "failed to join command group");
        }
        if let Some(broadcast_group) = &self.inner.config.broadcast_group {
            if let Err(e) = self.inner.channel.join_group(broadcast_group).await {
                warn!(group = %broadcast_group, error = %e, "failed to join broadcast group");
            }
        }
    }

    async fn drain_pending_commands(&self) {
        match self.inner.pending.fetch().await {
            Ok(commands) => {
                for envelope in commands {
                    self.handle_command(envelope).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch pending commands");
            }
        }
    }

    async fn acknowledge(&self, id: &str) {
        if let Err(e) = self.inner.pending.acknowledge(&[id.to_string()]).await {
            warn!(
                command_id = %id,
                error = %e,
                category = "command_ack",
                "command acknowledgement failed"
            );
        }
    }

    async fn teardown_connection(&self) {
        let connection = self.inner.connection.lock().await.take();
        if let Some(conn) = connection {
            self.inner.connector.disconnect(conn).await;
        }
    }

    async fn ensure_wake_lock(&self) {
        let mut handle = self.inner.wake_handle.lock().await;
        if handle.is_some() {
            return;
        }
        match self.inner.wake.request().await {
            Ok(lock) => {
                *handle = Some(lock);
                debug!("wake lock acquired");
            }
            Err(e) => {
                warn!(error = %e, "wake lock request failed");
            }
        }
    }

    async fn release_wake_lock(&self) {
        let mut guard = self.inner.wake_handle.lock().await;
        if let Some(handle) = guard.take() {
            handle.release().await;
            debug!("wake lock released");
        }
    }

    async fn notify_inactive(&self, reason: StopReason) {
        let identity = &self.inner.config.identity;
        if let Err(e) = self.inner.backend.set_inactive(identity, reason).await {
            warn!(
                error = %e,
                reason = %reason,
                category = "backend_notify",
                "session set-inactive failed"
            );
        }
        if let Err(e) = self.inner.presence.set_offline(identity).await {
            warn!(error = %e, category = "backend_notify", "presence set-offline failed");
        }
    }
}

impl std::fmt::Debug for SessionLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycleController")
            .field("identity", &self.inner.config.identity)
            .field("state", &self.state())
            .field("streaming", &self.is_streaming())
            .finish()
    }
}
