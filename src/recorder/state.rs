//! Session state and configuration
//!
//! The session state machine, the operator-supplied location context, and
//! the capture/recording configuration values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::error::{CaptureError, CaptureResult};

/// What a session produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Photo,
    Video,
}

impl SessionMode {
    /// Root folder name for this mode's sessions
    pub fn folder(&self) -> &'static str {
        match self {
            SessionMode::Photo => "photo",
            SessionMode::Video => "video",
        }
    }
}

/// Current state of a recording session
///
/// Video sessions move `Idle → Recording → Paused → Recording → Idle`
/// (finish returns to Idle so another take can start in the same
/// session); photo sessions stay `Idle` between discrete captures.
/// `Complete` is reached when the session is shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    Complete,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Location metadata for one inspection session.
///
/// Passed explicitly to `start_session` and carried into every metadata
/// record; there is no ambient application state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Greenhouse complex name
    pub greenhouse: String,

    /// Block within the complex
    pub block: String,

    /// Garden bed / tray identifier
    pub garden_bed: String,

    /// Which side of the bed is inspected
    pub garden_bed_side: String,

    /// Task tag written into every record
    pub task: String,

    /// Pass/point number the session starts at
    pub pass_number: u32,
}

impl SessionContext {
    pub fn new(
        greenhouse: impl Into<String>,
        block: impl Into<String>,
        garden_bed: impl Into<String>,
        garden_bed_side: impl Into<String>,
    ) -> Self {
        Self {
            greenhouse: greenhouse.into(),
            block: block.into(),
            garden_bed: garden_bed.into(),
            garden_bed_side: garden_bed_side.into(),
            task: "crowns".to_string(),
            pass_number: 1,
        }
    }

    pub fn with_pass_number(mut self, pass_number: u32) -> Self {
        self.pass_number = pass_number;
        self
    }
}

/// Configuration for the capture and recording core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Root under which `photo/` and `video/` session folders are created
    pub output_root: PathBuf,

    /// Resolution requested from each camera
    pub capture_width: u32,
    pub capture_height: u32,
    pub capture_fps: u32,

    /// Resolution and frame rate declared at video-writer open
    pub video_width: u32,
    pub video_height: u32,
    pub video_fps: u32,

    /// Preview frame size published to the hub
    pub preview_width: u32,
    pub preview_height: u32,

    /// Acquisition cycle period in milliseconds
    pub frame_interval_ms: u64,

    /// Upper bound for webcam index probing
    pub max_probe_index: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            capture_width: 3840,
            capture_height: 2160,
            capture_fps: 30,
            video_width: 1920,
            video_height: 1080,
            video_fps: 30,
            preview_width: 640,
            preview_height: 480,
            frame_interval_ms: 30,
            max_probe_index: 4,
        }
    }
}

/// Handle describing a started session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub mode: SessionMode,
    pub dir: PathBuf,
    pub started_at: String,
}

/// Parse an operator-entered point/pass number.
///
/// Rejects anything that is not a plain decimal number before any state
/// is mutated.
pub fn parse_point(raw: &str) -> CaptureResult<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(CaptureError::InvalidInput(raw.to_string()));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| CaptureError::InvalidInput(raw.to_string()))
}
