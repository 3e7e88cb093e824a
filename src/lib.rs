//! Crowncam - multi-camera capture and recording core.
//!
//! Implements the capture side of a greenhouse crown-inspection rig: a
//! pool of per-camera capture workers feeding a shared preview hub, a
//! recording session manager producing per-camera video files and photo
//! snapshots with per-artifact metadata records, and camera discovery.
//!
//! The wizard UI on top of this crate only ever:
//! - discovers cameras ([`capture::discover_webcams`],
//!   [`capture::detect_action_camera`]),
//! - drives a [`recorder::RecordingCoordinator`]
//!   (`start_session`, `start_recording`/`capture_photo`,
//!   `pause`/`resume`, `finish_recording`),
//! - polls the [`capture::FrameHub`] for preview frames, and
//! - subscribes to [`recorder::CaptureEvent`] notifications.

pub mod capture;
pub mod recorder;
pub mod utils;

pub use capture::{CameraId, CameraInfo, Frame, FrameHub};
pub use recorder::{
    CaptureEvent, RecordingConfig, RecordingCoordinator, SessionContext, SessionMode, SessionState,
};
pub use utils::error::{CaptureError, CaptureResult, ErrorResponse};
