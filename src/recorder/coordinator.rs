//! Recording coordinator
//!
//! Orchestrates the capture workers and the recording session: the UI
//! layer drives everything through this type and never touches workers
//! or writers directly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::channel::{event_channel, EventReceiver, EventSender, FrameSink};
use super::session::{SessionRecorder, StreamInput};
use super::state::{RecordingConfig, SessionContext, SessionHandle, SessionMode, SessionState};
use super::writer::{FfmpegWriterFactory, WriterFactory};
use crate::capture::frame::ColorLayout;
use crate::capture::hub::FrameHub;
use crate::capture::source::{CaptureRequest, SourceFactory, WebcamSourceFactory};
use crate::capture::traits::CameraId;
use crate::capture::worker::{CaptureWorker, WorkerSettings};
use crate::utils::error::{CaptureError, CaptureResult};

/// Manages workers and sessions for one capture rig.
pub struct RecordingCoordinator {
    config: RecordingConfig,
    writer_factory: Arc<dyn WriterFactory>,
    source_factory: Arc<dyn SourceFactory>,
    hub: Arc<FrameHub>,
    event_tx: EventSender,
    session: Option<Arc<SessionRecorder>>,
    workers: Vec<Arc<CaptureWorker>>,
}

impl RecordingCoordinator {
    /// Coordinator with the production backends: nokhwa webcam sources
    /// and ffmpeg video writers.
    pub fn new(config: RecordingConfig) -> Self {
        Self::with_factories(
            config,
            Arc::new(FfmpegWriterFactory),
            Arc::new(WebcamSourceFactory),
        )
    }

    /// Coordinator with injected backends.
    pub fn with_factories(
        config: RecordingConfig,
        writer_factory: Arc<dyn WriterFactory>,
        source_factory: Arc<dyn SourceFactory>,
    ) -> Self {
        let (event_tx, _) = event_channel();
        Self {
            config,
            writer_factory,
            source_factory,
            hub: Arc::new(FrameHub::new()),
            event_tx,
            session: None,
            workers: Vec::new(),
        }
    }

    /// The preview hub the UI polls.
    pub fn hub(&self) -> Arc<FrameHub> {
        self.hub.clone()
    }

    /// Latest preview frame for one camera.
    pub fn latest(&self, camera: CameraId) -> Option<Arc<crate::capture::frame::Frame>> {
        self.hub.latest(camera)
    }

    /// Subscribe to capture and recording events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Current session state; `Idle` when no session is open.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|session| session.state())
            .unwrap_or(SessionState::Idle)
    }

    /// Handle of the open session, if any.
    pub fn session_handle(&self) -> Option<SessionHandle> {
        self.session.as_ref().map(|session| session.handle())
    }

    /// Cameras whose workers are currently running.
    pub fn active_cameras(&self) -> Vec<CameraId> {
        self.workers
            .iter()
            .filter(|worker| worker.is_running())
            .map(|worker| worker.camera())
            .collect()
    }

    fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            frame_interval: Duration::from_millis(self.config.frame_interval_ms),
            preview_width: self.config.preview_width,
            preview_height: self.config.preview_height,
        }
    }

    /// Open a session and spawn one capture worker per camera.
    ///
    /// The session folder is created before any worker or writer exists.
    /// A camera that fails to open costs only its own worker; the
    /// session proceeds with the rest and the failure is broadcast.
    pub fn start_session(
        &mut self,
        mode: SessionMode,
        context: SessionContext,
        cameras: &[CameraId],
    ) -> CaptureResult<SessionHandle> {
        self.close_session();

        let session = SessionRecorder::begin(
            self.config.clone(),
            mode,
            context,
            cameras.to_vec(),
            self.writer_factory.clone(),
            self.event_tx.clone(),
        )?;

        let request = CaptureRequest {
            width: self.config.capture_width,
            height: self.config.capture_height,
            fps: self.config.capture_fps,
        };
        let sink: Arc<dyn FrameSink> = session.clone();

        for &camera in cameras {
            let worker = CaptureWorker::new(
                camera,
                self.worker_settings(),
                self.hub.clone(),
                sink.clone(),
                self.event_tx.clone(),
            );
            let source = self.source_factory.create(camera, request);
            match worker.start(source) {
                Ok(()) => self.workers.push(Arc::new(worker)),
                Err(e) => {
                    // Fatal to this camera only; the event was already
                    // broadcast by the worker.
                    tracing::warn!(camera = %camera, "Camera excluded from session: {e}");
                }
            }
        }

        let handle = session.handle();
        self.session = Some(session);
        Ok(handle)
    }

    fn session(&self) -> CaptureResult<&Arc<SessionRecorder>> {
        self.session
            .as_ref()
            .ok_or_else(|| CaptureError::Session("no active session".to_string()))
    }

    /// Start video recording: one writer per session camera at the
    /// configured target format.
    pub fn start_recording(&self) -> CaptureResult<()> {
        let session = self.session()?;

        let streams: Vec<StreamInput> = session
            .cameras()
            .iter()
            .map(|&camera| {
                let resolution = self
                    .workers
                    .iter()
                    .find(|worker| worker.camera() == camera)
                    .and_then(|worker| worker.resolution())
                    .unwrap_or((self.config.capture_width, self.config.capture_height));
                StreamInput {
                    camera,
                    width: resolution.0,
                    height: resolution.1,
                    layout: ColorLayout::Rgb,
                }
            })
            .collect();

        session.start_recording(&streams)
    }

    pub fn pause(&self) -> CaptureResult<()> {
        self.session()?.pause()
    }

    pub fn resume(&self) -> CaptureResult<()> {
        self.session()?.resume()
    }

    pub fn finish_recording(&self) -> CaptureResult<()> {
        self.session()?.finish_recording();
        Ok(())
    }

    /// Capture one photo per camera that currently has a frame. Cameras
    /// with no frame yet are skipped; one dead camera never blocks the
    /// round.
    pub fn capture_photo(&self) -> CaptureResult<Vec<PathBuf>> {
        let session = self.session()?;
        let frames: Vec<_> = self
            .workers
            .iter()
            .filter_map(|worker| {
                worker
                    .last_full_frame()
                    .map(|frame| (worker.camera(), frame))
            })
            .collect();
        session.capture_photos(&frames)
    }

    /// Advance to the next inspection point.
    pub fn advance_point(&self) -> CaptureResult<u32> {
        self.session()?.advance_point()
    }

    /// Jump to an operator-entered point number.
    pub fn set_point(&self, raw: &str) -> CaptureResult<u32> {
        self.session()?.set_point(raw)
    }

    /// Stop all workers, finalize any open recording, close the session.
    pub fn close_session(&mut self) {
        for worker in self.workers.drain(..) {
            worker.stop();
        }
        self.hub.clear();
        if let Some(session) = self.session.take() {
            session.complete();
            tracing::info!("Session closed");
        }
    }
}

impl Drop for RecordingCoordinator {
    fn drop(&mut self) {
        self.close_session();
    }
}
