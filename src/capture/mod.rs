//! Camera capture
//!
//! Device discovery, per-camera capture workers, and the preview frame
//! hub that bridges worker threads to the UI consumer.

pub mod discovery;
pub mod frame;
pub mod hub;
pub mod source;
pub mod traits;
pub mod worker;

pub use discovery::{detect_action_camera, discover_webcams, list_cameras, probe_webcams};
pub use frame::{ColorLayout, Frame};
pub use hub::FrameHub;
pub use source::{CaptureRequest, FrameSource, SourceFactory, WebcamSource, WebcamSourceFactory};
pub use traits::{CameraId, CameraInfo, Resolution};
pub use worker::{CaptureWorker, WorkerSettings};
