//! Room connection ownership: guarded connect, verified publish, audio
//! routing, and prompt teardown
//!
//! [`RoomConnector`] owns exactly one concern: turning the raw
//! [`RoomTransport`] capability into a connection the lifecycle controller
//! can trust. That means
//!
//! - refusing to open a second connect while one is in flight,
//! - bounding every connect attempt with an attempt-scoped timeout,
//! - verifying after publish that the track really appears in the
//!   connection's own publication list,
//! - routing remote participants' audio (never the local participant's) to a
//!   sink, detaching on unsubscribe, and
//! - unpublishing before disconnect so the server stops forwarding media
//!   promptly.
//!
//! A [`RoomConnection`] is ephemeral and never persisted. At most one active
//! instance exists per subject; establishing a new one always tears down the
//! prior one first.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::device::LocalVideoTrack;
use crate::error::{ControllerError, ControllerResult};
use crate::retry::{connect_timeout, with_timeout};

/// Low-bitrate, low-framerate publish profile for monitoring video
#[derive(Debug, Clone)]
pub struct VideoPublishOptions {
    /// Maximum encoder bitrate in kbit/s
    pub max_bitrate_kbps: u32,
    /// Maximum framerate in frames per second
    pub max_framerate: u8,
    /// Capture width in pixels
    pub width: u32,
    /// Capture height in pixels
    pub height: u32,
}

impl Default for VideoPublishOptions {
    fn default() -> Self {
        Self {
            max_bitrate_kbps: 150,
            max_framerate: 5,
            width: 640,
            height: 360,
        }
    }
}

/// Options for joining a room
#[derive(Debug, Clone)]
pub struct RoomOptions {
    /// Participant identity to join as
    pub identity: String,
    /// Whether to auto-subscribe to remote tracks
    pub auto_subscribe: bool,
}

/// A remote participant's audio track, as seen through subscriptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAudioTrackInfo {
    /// Identity of the remote participant
    pub participant: String,
    /// Track identifier
    pub track_id: String,
}

/// Events emitted by an established room session
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// The connection to the room server was lost
    Disconnected {
        /// Transport-provided reason, when available
        reason: Option<String>,
    },
    /// A remote audio track became subscribed
    TrackSubscribed {
        /// The subscribed track
        track: RemoteAudioTrackInfo,
    },
    /// A remote audio track was unsubscribed
    TrackUnsubscribed {
        /// The unsubscribed track
        track: RemoteAudioTrackInfo,
    },
}

/// Sink that plays remote participants' audio (e.g. a media element)
#[async_trait]
pub trait RemoteAudioSink: Send + Sync {
    /// Attach a remote audio track to the sink
    async fn attach(&self, track: &RemoteAudioTrackInfo);

    /// Detach a remote audio track from the sink
    async fn detach(&self, track_id: &str);
}

/// An established session with the room server, as provided by the
/// transport capability
#[async_trait]
pub trait RoomSession: Send + Sync {
    /// Identity this session joined as
    fn local_identity(&self) -> String;

    /// Whether the session currently reports itself connected
    fn is_connected(&self) -> bool;

    /// Publish a local video track with the given profile
    async fn publish_video(
        &self,
        track: Arc<dyn LocalVideoTrack>,
        options: &VideoPublishOptions,
    ) -> ControllerResult<()>;

    /// Track ids in this connection's own publication list
    fn published_track_ids(&self) -> Vec<String>;

    /// Remote audio tracks that are already subscribed
    fn subscribed_audio_tracks(&self) -> Vec<RemoteAudioTrackInfo>;

    /// Unpublish all local tracks
    async fn unpublish_all(&self) -> ControllerResult<()>;

    /// Disconnect from the room server
    async fn disconnect(&self);

    /// Subscribe to session events
    fn events(&self) -> broadcast::Receiver<RoomEvent>;
}

/// Transport capability that dials the room server
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Connect to a room
    async fn connect(
        &self,
        url: &str,
        token: &str,
        options: &RoomOptions,
    ) -> ControllerResult<Arc<dyn RoomSession>>;
}

/// An established, published room connection and its connection-scoped tasks
///
/// Tasks registered here (audio routing, disconnect watching) are aborted on
/// teardown so no listener leaks across reconnect cycles.
pub struct RoomConnection {
    id: Uuid,
    session: Arc<dyn RoomSession>,
    video_track: Arc<dyn LocalVideoTrack>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomConnection {
    /// Wrap an established session and its published video track
    pub fn new(session: Arc<dyn RoomSession>, video_track: Arc<dyn LocalVideoTrack>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session,
            video_track,
            tasks: Vec::new(),
        }
    }

    /// Process-local id for correlating this connection in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The underlying session
    pub fn session(&self) -> &Arc<dyn RoomSession> {
        &self.session
    }

    /// Whether the session reports itself connected
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Whether the published video track's device track has ended
    pub fn video_track_ended(&self) -> bool {
        self.video_track.is_ended()
    }

    /// Register a connection-scoped task to abort on teardown
    pub fn register_task(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }
}

impl std::fmt::Debug for RoomConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomConnection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("video_track", &self.video_track.id())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

/// Owner of room connect/publish/teardown mechanics
pub struct RoomConnector {
    transport: Arc<dyn RoomTransport>,
    connect_in_flight: AtomicBool,
    timeout_base: std::time::Duration,
    timeout_cap: std::time::Duration,
}

/// Releases the in-flight flag when the connect future completes or is
/// cancelled. The owning task can be aborted mid-connect (a stop landing
/// during a reconnect attempt), and a plain store after the await would
/// never run, wedging the connector.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl RoomConnector {
    /// Create a connector over a transport with attempt-timeout bounds
    pub fn new(
        transport: Arc<dyn RoomTransport>,
        timeout_base: std::time::Duration,
        timeout_cap: std::time::Duration,
    ) -> Self {
        Self {
            transport,
            connect_in_flight: AtomicBool::new(false),
            timeout_base,
            timeout_cap,
        }
    }

    /// Connect to the room server.
    ///
    /// Fails with [`ControllerError::ConnectError`] if another connect is
    /// already in flight for this connector, and with
    /// [`ControllerError::ConnectTimeout`] when the attempt-scoped timeout
    /// (growing with `attempt`, capped) elapses.
    pub async fn connect(
        &self,
        url: &str,
        token: &str,
        options: &RoomOptions,
        attempt: u32,
    ) -> ControllerResult<Arc<dyn RoomSession>> {
        if self.connect_in_flight.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::connect(
                "a connect is already in flight for this connector",
            ));
        }
        let _in_flight = InFlightGuard {
            flag: &self.connect_in_flight,
        };

        let timeout = connect_timeout(self.timeout_base, self.timeout_cap, attempt);
        debug!(url, attempt, timeout_ms = timeout.as_millis() as u64, "connecting to room");

        with_timeout(
            "room connect",
            timeout,
            self.transport.connect(url, token, options),
        )
        .await
    }

    /// Publish a video track and verify it landed.
    ///
    /// A publish the server silently dropped is indistinguishable from a
    /// healthy one without checking the connection's own publication list,
    /// so the check is mandatory and its failure is a
    /// [`ControllerError::PublishError`].
    pub async fn publish_video(
        &self,
        session: &Arc<dyn RoomSession>,
        track: Arc<dyn LocalVideoTrack>,
        options: &VideoPublishOptions,
    ) -> ControllerResult<()> {
        let track_id = track.id();
        session.publish_video(track, options).await?;

        if !session.published_track_ids().iter().any(|id| id == &track_id) {
            return Err(ControllerError::publish(format!(
                "track {track_id} missing from publication list after publish"
            )));
        }
        debug!(track_id = %track_id, "video track published and verified");
        Ok(())
    }

    /// Route remote participants' audio to a sink.
    ///
    /// Attaches tracks that are already subscribed, then follows
    /// subscribe/unsubscribe events. The local participant's own tracks are
    /// excluded. The returned task must be registered on the connection so
    /// teardown aborts it.
    pub fn attach_remote_audio(
        &self,
        session: &Arc<dyn RoomSession>,
        sink: Arc<dyn RemoteAudioSink>,
    ) -> JoinHandle<()> {
        let local_identity = session.local_identity();
        let existing = session.subscribed_audio_tracks();
        let mut events = session.events();

        tokio::spawn(async move {
            for track in existing {
                if track.participant != local_identity {
                    sink.attach(&track).await;
                }
            }
            loop {
                match events.recv().await {
                    Ok(RoomEvent::TrackSubscribed { track }) => {
                        if track.participant != local_identity {
                            sink.attach(&track).await;
                        }
                    }
                    Ok(RoomEvent::TrackUnsubscribed { track }) => {
                        sink.detach(&track.track_id).await;
                    }
                    Ok(RoomEvent::Disconnected { .. }) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "audio routing lagged behind room events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Tear down a connection: abort its tasks, unpublish best-effort so the
    /// server stops forwarding media promptly, then disconnect.
    pub async fn disconnect(&self, connection: RoomConnection) {
        for task in &connection.tasks {
            task.abort();
        }
        if let Err(e) = connection.session.unpublish_all().await {
            warn!(error = %e, "unpublish before disconnect failed");
        }
        connection.session.disconnect().await;
        debug!(connection_id = %connection.id, "room connection torn down");
    }
}
