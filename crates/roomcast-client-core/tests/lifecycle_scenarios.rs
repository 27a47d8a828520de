//! End-to-end lifecycle scenarios against in-memory capability fakes.
//!
//! These exercise the public API only: boot via `run()`, commands arriving
//! over the channel, link drops, and concurrent callers. All tests run under
//! a paused tokio clock for deterministic backoff timing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use roomcast_client_core::backend::{AccessTokenProvider, PresenceReporter, SessionBackend};
use roomcast_client_core::channel::{ChannelEvent, CommandChannel};
use roomcast_client_core::command::{CommandEnvelope, PendingCommandStore};
use roomcast_client_core::controller::{ControllerBuilder, ControllerConfig};
use roomcast_client_core::device::{
    CapturedMedia, DeviceAcquirer, LocalAudioTrack, LocalVideoTrack, MediaDeviceInfo,
};
use roomcast_client_core::error::ControllerResult;
use roomcast_client_core::retry::RetryConfig;
use roomcast_client_core::room::{
    RemoteAudioSink, RemoteAudioTrackInfo, RoomEvent, RoomOptions, RoomSession, RoomTransport,
    VideoPublishOptions,
};
use roomcast_client_core::{RunState, SessionLifecycleController, StopReason, StreamingSession};
use roomcast_client_core::wake::{WakeLockHandle, WakeLockProvider};

const IDENTITY: &str = "alice@example.com";

// ===== fakes =====

struct FakeTrack {
    id: String,
    ended: AtomicBool,
}

impl FakeTrack {
    fn new(id: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            ended: AtomicBool::new(false),
        })
    }
}

impl LocalVideoTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }
    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
    fn stop(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }
}

impl LocalAudioTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }
    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
    fn stop(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeAcquirer {
    acquires: AtomicU32,
}

#[async_trait]
impl DeviceAcquirer for FakeAcquirer {
    async fn list_video_inputs(&self) -> ControllerResult<Vec<MediaDeviceInfo>> {
        Ok(vec![MediaDeviceInfo {
            id: "cam-0".into(),
            label: "Integrated Camera".into(),
        }])
    }

    async fn acquire(&self, _device: &MediaDeviceInfo) -> ControllerResult<CapturedMedia> {
        let n = self.acquires.fetch_add(1, Ordering::SeqCst);
        let track = FakeTrack::new(format!("track-{n}"));
        Ok(CapturedMedia {
            video: track.clone(),
            audio: track,
        })
    }
}

struct FakeSession {
    identity: String,
    connected: AtomicBool,
    published: Mutex<Vec<String>>,
    events: broadcast::Sender<RoomEvent>,
}

impl FakeSession {
    fn new(identity: &str) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            identity: identity.to_string(),
            connected: AtomicBool::new(true),
            published: Mutex::new(Vec::new()),
            events,
        })
    }

    fn drop_link(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(RoomEvent::Disconnected {
            reason: Some(reason.to_string()),
        });
    }
}

#[async_trait]
impl RoomSession for FakeSession {
    fn local_identity(&self) -> String {
        self.identity.clone()
    }
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
    async fn publish_video(
        &self,
        track: Arc<dyn LocalVideoTrack>,
        _options: &VideoPublishOptions,
    ) -> ControllerResult<()> {
        self.published.lock().unwrap().push(track.id());
        Ok(())
    }
    fn published_track_ids(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
    fn subscribed_audio_tracks(&self) -> Vec<RemoteAudioTrackInfo> {
        Vec::new()
    }
    async fn unpublish_all(&self) -> ControllerResult<()> {
        self.published.lock().unwrap().clear();
        Ok(())
    }
    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
    fn events(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct FakeTransport {
    connects: AtomicU32,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeTransport {
    fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
    fn live_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_connected())
            .count()
    }
    fn latest(&self) -> Arc<FakeSession> {
        self.sessions.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait]
impl RoomTransport for FakeTransport {
    async fn connect(
        &self,
        _url: &str,
        _token: &str,
        options: &RoomOptions,
    ) -> ControllerResult<Arc<dyn RoomSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session = FakeSession::new(&options.identity);
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

struct FakeChannel {
    events: broadcast::Sender<ChannelEvent>,
}

impl FakeChannel {
    fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self { events })
    }
    fn deliver(&self, envelope: CommandEnvelope) {
        let _ = self.events.send(ChannelEvent::Message(envelope));
    }
}

#[async_trait]
impl CommandChannel for FakeChannel {
    async fn connect(&self, _identity: &str) -> ControllerResult<()> {
        Ok(())
    }
    async fn join_group(&self, _name: &str) -> ControllerResult<()> {
        Ok(())
    }
    async fn reconnect(&self) -> ControllerResult<()> {
        let _ = self.events.send(ChannelEvent::Reconnected);
        Ok(())
    }
    fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct FakePending {
    acked: Mutex<Vec<String>>,
}

impl FakePending {
    fn acked_ids(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }
}

#[async_trait]
impl PendingCommandStore for FakePending {
    async fn fetch(&self) -> ControllerResult<Vec<CommandEnvelope>> {
        Ok(Vec::new())
    }
    async fn acknowledge(&self, ids: &[String]) -> ControllerResult<()> {
        self.acked.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }
}

#[derive(Default)]
struct FakeBackend {
    last: Mutex<Option<StreamingSession>>,
    closes: Mutex<Vec<StopReason>>,
    activations: AtomicU32,
}

impl FakeBackend {
    fn close_reasons(&self) -> Vec<StopReason> {
        self.closes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn set_active(&self, _subject: &str) -> ControllerResult<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn set_inactive(&self, _subject: &str, reason: StopReason) -> ControllerResult<()> {
        self.closes.lock().unwrap().push(reason);
        Ok(())
    }
    async fn last_session(&self, _subject: &str) -> ControllerResult<Option<StreamingSession>> {
        Ok(self.last.lock().unwrap().clone())
    }
}

struct FakePresence;

#[async_trait]
impl PresenceReporter for FakePresence {
    async fn set_online(&self, _subject: &str) -> ControllerResult<()> {
        Ok(())
    }
    async fn set_offline(&self, _subject: &str) -> ControllerResult<()> {
        Ok(())
    }
}

struct FakeWakeHandle;

#[async_trait]
impl WakeLockHandle for FakeWakeHandle {
    async fn release(&self) {}
}

struct FakeWake;

#[async_trait]
impl WakeLockProvider for FakeWake {
    async fn request(&self) -> ControllerResult<Box<dyn WakeLockHandle>> {
        Ok(Box::new(FakeWakeHandle))
    }
}

struct FakeTokens;

#[async_trait]
impl AccessTokenProvider for FakeTokens {
    async fn room_token(&self, identity: &str, room: &str) -> ControllerResult<String> {
        Ok(format!("token:{identity}:{room}"))
    }
}

struct FakeSink;

#[async_trait]
impl RemoteAudioSink for FakeSink {
    async fn attach(&self, _track: &RemoteAudioTrackInfo) {}
    async fn detach(&self, _track_id: &str) {}
}

// ===== harness =====

struct World {
    controller: SessionLifecycleController,
    transport: Arc<FakeTransport>,
    channel: Arc<FakeChannel>,
    pending: Arc<FakePending>,
    backend: Arc<FakeBackend>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn world() -> World {
    init_tracing();
    let config = ControllerConfig::new(IDENTITY, "wss://rooms.test", "floor-1").with_retry(
        RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            use_jitter: false,
        },
    );

    let transport = Arc::new(FakeTransport::default());
    let channel = FakeChannel::new();
    let pending = Arc::new(FakePending::default());
    let backend = Arc::new(FakeBackend::default());

    let controller = ControllerBuilder::new()
        .with_config(config)
        .with_devices(Arc::new(FakeAcquirer::default()))
        .with_room_transport(transport.clone())
        .with_command_channel(channel.clone())
        .with_pending_commands(pending.clone())
        .with_session_backend(backend.clone())
        .with_presence(Arc::new(FakePresence))
        .with_wake_lock(Arc::new(FakeWake))
        .with_token_provider(Arc::new(FakeTokens))
        .with_audio_sink(Arc::new(FakeSink))
        .build()
        .expect("world builds");

    World {
        controller,
        transport,
        channel,
        pending,
        backend,
    }
}

fn command(id: &str, verb: &str, reason: Option<StopReason>) -> CommandEnvelope {
    CommandEnvelope {
        id: Some(id.to_string()),
        command: verb.to_string(),
        employee_email: IDENTITY.to_string(),
        reason,
        timestamp: Some(Utc::now()),
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

// ===== scenarios =====

/// A full shift: boot idle, remote START, a network blip mid-shift, remote
/// STOP at end of shift, then a redelivered STOP that must change nothing.
#[tokio::test(start_paused = true)]
async fn full_shift_with_mid_shift_network_blip() {
    let w = world();

    w.controller.run().await.unwrap();
    assert_eq!(w.controller.state(), RunState::Idle);

    // Supervisor starts the stream remotely.
    w.channel.deliver(command("start-1", "START", None));
    settle().await;
    assert_eq!(w.controller.state(), RunState::Streaming);
    assert_eq!(w.backend.activations.load(Ordering::SeqCst), 1);

    // Mid-shift network blip: the controller recovers on its own.
    w.transport.latest().drop_link("network blip");
    settle().await;
    assert_eq!(w.controller.state(), RunState::Streaming);
    assert_eq!(w.transport.connect_count(), 2);
    assert_eq!(w.backend.close_reasons(), vec![StopReason::Disconnect]);

    // End of shift.
    w.channel
        .deliver(command("stop-1", "STOP", Some(StopReason::EndOfShift)));
    settle().await;
    assert_eq!(w.controller.state(), RunState::Stopped);
    assert_eq!(w.transport.live_sessions(), 0);
    assert_eq!(
        w.backend.close_reasons(),
        vec![StopReason::Disconnect, StopReason::EndOfShift]
    );

    // The broker redelivers the STOP: acknowledged again, no state change.
    w.channel
        .deliver(command("stop-1", "STOP", Some(StopReason::EndOfShift)));
    settle().await;
    assert_eq!(w.controller.state(), RunState::Stopped);
    assert_eq!(w.backend.close_reasons().len(), 2);
    assert_eq!(
        w.pending.acked_ids(),
        vec!["start-1", "stop-1", "stop-1"]
    );
}

/// Reboot after a crash mid-stream: the prior record was never closed, so
/// the client resumes without any new START command.
#[tokio::test(start_paused = true)]
async fn reboot_after_crash_resumes_unclosed_session() {
    let w = world();
    *w.backend.last.lock().unwrap() = Some(StreamingSession::active(
        IDENTITY,
        Utc::now() - chrono::Duration::hours(3),
    ));

    w.controller.run().await.unwrap();

    assert_eq!(w.controller.state(), RunState::Streaming);
    assert_eq!(w.transport.connect_count(), 1);
}

/// Reboot after a disconnect-closed session: inside the resume window the
/// client resumes, at or past the window it stays idle.
#[tokio::test(start_paused = true)]
async fn reboot_resume_window_boundaries() {
    // Well inside the window.
    let w = world();
    *w.backend.last.lock().unwrap() = Some(StreamingSession::closed(
        IDENTITY,
        Utc::now() - chrono::Duration::hours(1),
        Utc::now() - chrono::Duration::seconds(200),
        StopReason::Disconnect,
    ));
    w.controller.run().await.unwrap();
    assert_eq!(w.controller.state(), RunState::Streaming);

    // At/past the window boundary.
    let w = world();
    *w.backend.last.lock().unwrap() = Some(StreamingSession::closed(
        IDENTITY,
        Utc::now() - chrono::Duration::hours(1),
        Utc::now() - chrono::Duration::seconds(300),
        StopReason::Disconnect,
    ));
    w.controller.run().await.unwrap();
    assert_eq!(w.controller.state(), RunState::Idle);
    assert_eq!(w.transport.connect_count(), 0);

    // Deliberate stops never resume, however recent.
    let w = world();
    *w.backend.last.lock().unwrap() = Some(StreamingSession::closed(
        IDENTITY,
        Utc::now() - chrono::Duration::hours(1),
        Utc::now() - chrono::Duration::seconds(2),
        StopReason::EndOfShift,
    ));
    w.controller.run().await.unwrap();
    assert_eq!(w.controller.state(), RunState::Idle);
}

/// Concurrent callers: two simultaneous start() calls, then overlapping
/// health ticks on a severed link, never produce more than one connection.
#[tokio::test(start_paused = true)]
async fn concurrent_starts_and_ticks_keep_one_connection() {
    let w = world();

    let (a, b) = tokio::join!(w.controller.start(), w.controller.start());
    a.unwrap();
    b.unwrap();
    assert_eq!(w.transport.connect_count(), 1);
    assert_eq!(w.transport.live_sessions(), 1);

    // Silent link loss, then two ticks racing each other.
    w.transport.latest().connected.store(false, Ordering::SeqCst);
    tokio::join!(
        w.controller.health_check_tick(),
        w.controller.health_check_tick()
    );
    settle().await;

    assert_eq!(w.controller.state(), RunState::Streaming);
    assert_eq!(w.transport.live_sessions(), 1);
    // Exactly one reconnect happened.
    assert_eq!(w.transport.connect_count(), 2);
}

/// A STOP that lands while the retry loop is mid-backoff ends the loop; a
/// later stale disconnect event from the old session changes nothing.
#[tokio::test(start_paused = true)]
async fn stop_wins_over_recovery() {
    let w = world();
    w.controller.start().await.unwrap();
    let old_session = w.transport.latest();

    old_session.drop_link("cable pulled");
    // Let recovery enter the retry loop but land the STOP before the first
    // backoff delay (100ms) elapses.
    tokio::time::sleep(Duration::from_millis(10)).await;
    w.controller
        .handle_command(command("stop-9", "STOP", Some(StopReason::Emergency)))
        .await;
    settle().await;

    assert_eq!(w.controller.state(), RunState::Stopped);
    assert_eq!(w.transport.connect_count(), 1);
    assert!(w
        .backend
        .close_reasons()
        .contains(&StopReason::Emergency));
}
