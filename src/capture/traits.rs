//! Capture type definitions
//!
//! Device identities and device info shared across the capture and
//! recording modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a physical capture device.
///
/// Immutable once discovered. Webcams are addressed by OS device index;
/// an attached action camera is a distinct identity with no index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "index")]
pub enum CameraId {
    Webcam(u32),
    ActionCamera,
}

impl CameraId {
    /// Short tag used in artifact file names (`camera_0.mp4`,
    /// `photo_..._cam0.png`).
    pub fn tag(&self) -> String {
        match self {
            CameraId::Webcam(index) => index.to_string(),
            CameraId::ActionCamera => "gopro".to_string(),
        }
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraId::Webcam(index) => write!(f, "webcam-{index}"),
            CameraId::ActionCamera => write!(f, "action-camera"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Information about a discovered camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Device identity
    pub id: CameraId,

    /// Device name as reported by the OS backend
    pub name: String,

    /// Native capture resolution, when the probe could read it
    pub resolution: Option<Resolution>,
}
