//! Capture-device acquisition with busy-device fallback
//!
//! The [`DeviceAcquirer`] capability enumerates camera inputs and acquires
//! camera + microphone tracks. Acquisition of a specific device can fail for
//! two very different reasons: the device is busy or broken (try the next
//! one), or permission is denied outright. [`acquire_with_fallback`] walks
//! the enumerated devices in order and only gives up when none is usable,
//! which is the one terminal, user-facing failure of the whole start
//! sequence.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ControllerError, ControllerResult};

/// A capture device as enumerated by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    /// Platform device identifier
    pub id: String,
    /// Human-readable label (may be empty before permission is granted)
    pub label: String,
}

/// Handle to an acquired local video (camera) track
pub trait LocalVideoTrack: Send + Sync {
    /// Track identifier, also used to verify publication
    fn id(&self) -> String;
    /// Whether the underlying device track has ended (device unplugged,
    /// permission revoked, OS reclaimed the camera)
    fn is_ended(&self) -> bool;
    /// Stop capture and release the device
    fn stop(&self);
}

/// Handle to an acquired local audio (microphone) track
pub trait LocalAudioTrack: Send + Sync {
    /// Track identifier
    fn id(&self) -> String;
    /// Whether the underlying device track has ended
    fn is_ended(&self) -> bool;
    /// Stop capture and release the device
    fn stop(&self);
}

/// Camera + microphone tracks acquired together
#[derive(Clone)]
pub struct CapturedMedia {
    /// Camera track to publish
    pub video: Arc<dyn LocalVideoTrack>,
    /// Microphone track to publish
    pub audio: Arc<dyn LocalAudioTrack>,
}

impl CapturedMedia {
    /// Stop both tracks and release the devices
    pub fn stop(&self) {
        self.video.stop();
        self.audio.stop();
    }
}

impl std::fmt::Debug for CapturedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedMedia")
            .field("video", &self.video.id())
            .field("audio", &self.audio.id())
            .finish()
    }
}

/// Capability that enumerates and acquires capture devices
#[async_trait]
pub trait DeviceAcquirer: Send + Sync {
    /// Enumerate available camera inputs, in preference order
    async fn list_video_inputs(&self) -> ControllerResult<Vec<MediaDeviceInfo>>;

    /// Acquire camera + microphone using the given camera input
    async fn acquire(&self, device: &MediaDeviceInfo) -> ControllerResult<CapturedMedia>;
}

/// Acquire capture media, falling back across available camera inputs.
///
/// Tries each enumerated device in order; a per-device failure (busy device,
/// hardware error) moves on to the next. Returns
/// [`ControllerError::DeviceError`] when enumeration fails, no devices
/// exist, or every device fails; that error is terminal and never retried.
pub async fn acquire_with_fallback(
    acquirer: &Arc<dyn DeviceAcquirer>,
) -> ControllerResult<CapturedMedia> {
    let devices = acquirer
        .list_video_inputs()
        .await
        .map_err(|e| ControllerError::device(format!("device enumeration failed: {e}")))?;

    if devices.is_empty() {
        return Err(ControllerError::device("no camera inputs available"));
    }

    let mut last_failure = None;
    for device in &devices {
        match acquirer.acquire(device).await {
            Ok(media) => {
                debug!(device_id = %device.id, "acquired capture media");
                return Ok(media);
            }
            Err(e) => {
                warn!(
                    device_id = %device.id,
                    error = %e,
                    "device acquisition failed, trying next device"
                );
                last_failure = Some(e);
            }
        }
    }

    Err(ControllerError::device(format!(
        "all {} camera inputs failed, last error: {}",
        devices.len(),
        last_failure.map(|e| e.to_string()).unwrap_or_default(),
    )))
}
