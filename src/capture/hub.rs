//! Frame distribution hub
//!
//! Decouples per-camera producer cadence from the UI consumer cadence.
//! Latest-wins: at most one preview frame is retained per camera, so a
//! slow consumer sees the newest frame and never a backlog.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::frame::Frame;
use super::traits::CameraId;

/// Thread-safe map from camera identity to its latest preview frame.
///
/// A single lock guards the whole map; the hold time is an `Arc` swap or
/// clone, so contention between N workers and the consumer never pays
/// frame-copy cost. Full-resolution frames are never published here.
#[derive(Default)]
pub struct FrameHub {
    frames: Mutex<HashMap<CameraId, Arc<Frame>>>,
}

impl FrameHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored preview for `camera`. The previous frame, if
    /// any, is dropped.
    pub fn publish(&self, camera: CameraId, frame: Arc<Frame>) {
        self.frames.lock().insert(camera, frame);
    }

    /// Non-blocking read of the latest preview for `camera`.
    pub fn latest(&self, camera: CameraId) -> Option<Arc<Frame>> {
        self.frames.lock().get(&camera).cloned()
    }

    /// Drop the stored preview for `camera`.
    pub fn remove(&self, camera: CameraId) {
        self.frames.lock().remove(&camera);
    }

    /// Drop all stored previews.
    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Cameras that currently have a preview available.
    pub fn cameras(&self) -> Vec<CameraId> {
        self.frames.lock().keys().copied().collect()
    }
}
