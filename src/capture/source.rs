//! Frame sources
//!
//! `FrameSource` is the seam between a capture worker and the physical
//! device. The production implementation wraps a nokhwa webcam; tests
//! substitute synthetic sources.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

use super::frame::{ColorLayout, Frame};
use super::traits::CameraId;
use crate::utils::error::{CaptureError, CaptureResult};

/// One camera device as seen by a capture worker.
///
/// `open` failures are fatal to the worker; `read` failures are
/// transient and skipped by the acquisition loop.
pub trait FrameSource: Send {
    /// Open the device and request the capture format. Must be called
    /// before the first `read`.
    fn open(&mut self) -> CaptureResult<()>;

    /// Pull one frame. Blocks for the duration of hardware I/O.
    fn read(&mut self) -> CaptureResult<Frame>;

    /// Negotiated capture resolution, available after `open`.
    fn resolution(&self) -> Option<(u32, u32)>;
}

/// Creates frame sources for camera identities.
///
/// The coordinator uses this to spawn one source per discovered camera;
/// tests inject factories that produce synthetic sources.
pub trait SourceFactory: Send + Sync {
    fn create(&self, camera: CameraId, request: CaptureRequest) -> Box<dyn FrameSource>;
}

/// Capture format requested from the device
#[derive(Debug, Clone, Copy)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Webcam source backed by nokhwa
pub struct WebcamSource {
    index: u32,
    request: CaptureRequest,
    camera: Option<Camera>,
    sequence: u64,
}

impl WebcamSource {
    pub fn new(index: u32, request: CaptureRequest) -> Self {
        Self {
            index,
            request,
            camera: None,
            sequence: 0,
        }
    }
}

impl FrameSource for WebcamSource {
    fn open(&mut self) -> CaptureResult<()> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(self.request.width, self.request.height),
                FrameFormat::MJPEG,
                self.request.fps,
            ),
        ));

        let mut camera = Camera::new(CameraIndex::Index(self.index), requested).map_err(|e| {
            CaptureError::DeviceUnavailable {
                camera: CameraId::Webcam(self.index),
                reason: e.to_string(),
            }
        })?;

        camera
            .open_stream()
            .map_err(|e| CaptureError::DeviceUnavailable {
                camera: CameraId::Webcam(self.index),
                reason: e.to_string(),
            })?;

        let format = camera.camera_format();
        tracing::info!(
            index = self.index,
            width = format.resolution().width(),
            height = format.resolution().height(),
            fps = format.frame_rate(),
            "Webcam opened"
        );

        self.camera = Some(camera);
        Ok(())
    }

    fn read(&mut self) -> CaptureResult<Frame> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CaptureError::TransientRead("device not open".to_string()))?;

        let buffer = camera
            .frame()
            .map_err(|e| CaptureError::TransientRead(e.to_string()))?;

        // Decode the native camera format (MJPEG, YUYV, ...) to RGB for
        // preview display and persistence.
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::TransientRead(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        self.sequence += 1;
        Ok(Frame::new(
            self.sequence,
            width,
            height,
            ColorLayout::Rgb,
            decoded.into_raw(),
        ))
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        self.camera.as_ref().map(|camera| {
            let resolution = camera.camera_format().resolution();
            (resolution.width(), resolution.height())
        })
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!(index = self.index, "Error stopping camera stream: {e}");
            }
        }
    }
}

/// Production factory producing nokhwa-backed webcam sources.
///
/// Action-camera identities have no capture backend here; the vendor
/// control plane is an external collaborator.
pub struct WebcamSourceFactory;

impl SourceFactory for WebcamSourceFactory {
    fn create(&self, camera: CameraId, request: CaptureRequest) -> Box<dyn FrameSource> {
        match camera {
            CameraId::Webcam(index) => Box::new(WebcamSource::new(index, request)),
            CameraId::ActionCamera => Box::new(UnavailableSource { camera }),
        }
    }
}

/// Source for identities with no capture backend; `open` always fails
/// with `DeviceUnavailable` so the worker reports and terminates.
pub struct UnavailableSource {
    pub camera: CameraId,
}

impl FrameSource for UnavailableSource {
    fn open(&mut self) -> CaptureResult<()> {
        Err(CaptureError::DeviceUnavailable {
            camera: self.camera,
            reason: "no capture backend for this device".to_string(),
        })
    }

    fn read(&mut self) -> CaptureResult<Frame> {
        Err(CaptureError::TransientRead("device not open".to_string()))
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}
