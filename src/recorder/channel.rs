//! Recording channel seam
//!
//! Types shared between the capture workers and the recording side:
//! the full-resolution frame sink and the event notification channel.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::capture::frame::Frame;
use crate::capture::traits::CameraId;

/// Consumer of full-resolution frames.
///
/// Implemented by the session recorder; called from worker threads after
/// the worker has released its own lock, so implementations may block on
/// file I/O without stalling the capture cycle's lock.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, camera: CameraId, frame: &Arc<Frame>);
}

/// Sink that discards frames; used when no session is consuming them.
pub struct NullSink;

impl FrameSink for NullSink {
    fn on_frame(&self, _camera: CameraId, _frame: &Arc<Frame>) {}
}

/// Events emitted by workers and the session recorder
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A device failed to open; that worker is dead, siblings unaffected
    DeviceUnavailable { camera: CameraId, reason: String },
    /// A frame read failed; emitted on the first failure of a streak
    ReadFailure { camera: CameraId },
    /// A writer failed mid-recording and was dropped from the session
    WriterError { camera: CameraId, reason: String },
    /// Video recording started
    RecordingStarted,
    /// Video recording stopped, writers closed
    RecordingStopped,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// A photo round completed with this many artifacts
    PhotoCaptured { count: usize },
}

/// Broadcast sender for capture events
pub type EventSender = broadcast::Sender<CaptureEvent>;

/// Broadcast receiver for capture events
pub type EventReceiver = broadcast::Receiver<CaptureEvent>;

/// Channel capacity for event fan-out
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

pub fn event_channel() -> (EventSender, EventReceiver) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
