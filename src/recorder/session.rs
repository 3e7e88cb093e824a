//! Recording session
//!
//! Owns the session folder, the per-camera video writers, the metadata
//! records, and the photo/point counters. All mutable session state sits
//! behind one lock, distinct from every per-worker lock, so `on_frame`
//! calls from worker threads never contend with capture-critical locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::channel::{CaptureEvent, EventSender, FrameSink};
use super::metadata::{timestamp_now, CaptureRecord};
use super::state::{parse_point, RecordingConfig, SessionContext, SessionHandle, SessionMode, SessionState};
use super::writer::{VideoWriter, WriterFactory, WriterSettings};
use crate::capture::frame::{ColorLayout, Frame};
use crate::capture::traits::CameraId;
use crate::utils::error::{CaptureError, CaptureResult};

/// Input format of one camera's stream, as negotiated by its worker.
#[derive(Debug, Clone, Copy)]
pub struct StreamInput {
    pub camera: CameraId,
    pub width: u32,
    pub height: u32,
    pub layout: ColorLayout,
}

struct SessionInner {
    config: RecordingConfig,
    mode: SessionMode,
    state: SessionState,
    context: SessionContext,
    cameras: Vec<CameraId>,
    session_dir: PathBuf,
    started_at: String,
    point: u32,
    shot: u32,
    writers: HashMap<CameraId, Box<dyn VideoWriter>>,
}

impl SessionInner {
    fn session_dir(config: &RecordingConfig, mode: SessionMode, ts: &str, point: u32) -> PathBuf {
        let folder = match mode {
            SessionMode::Video => format!("session_{ts}"),
            SessionMode::Photo => format!("session_{ts}_point_{point}"),
        };
        config.output_root.join(mode.folder()).join(folder)
    }
}

/// One bounded recording or photo-capture activity.
pub struct SessionRecorder {
    factory: Arc<dyn WriterFactory>,
    events: EventSender,
    inner: Mutex<SessionInner>,
}

impl SessionRecorder {
    /// Open a new session: the folder is created here, before any writer
    /// can exist, so no writer ever targets a missing directory.
    pub fn begin(
        config: RecordingConfig,
        mode: SessionMode,
        context: SessionContext,
        cameras: Vec<CameraId>,
        factory: Arc<dyn WriterFactory>,
        events: EventSender,
    ) -> CaptureResult<Arc<Self>> {
        let point = context.pass_number;
        let started_at = timestamp_now();
        let session_dir = SessionInner::session_dir(&config, mode, &started_at, point);
        std::fs::create_dir_all(&session_dir)?;

        tracing::info!(
            mode = ?mode,
            dir = %session_dir.display(),
            cameras = cameras.len(),
            "Session started"
        );

        Ok(Arc::new(Self {
            factory,
            events,
            inner: Mutex::new(SessionInner {
                config,
                mode,
                state: SessionState::Idle,
                context,
                cameras,
                session_dir,
                started_at,
                point,
                shot: 1,
                writers: HashMap::new(),
            }),
        }))
    }

    pub fn handle(&self) -> SessionHandle {
        let inner = self.inner.lock();
        SessionHandle {
            mode: inner.mode,
            dir: inner.session_dir.clone(),
            started_at: inner.started_at.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.lock().mode
    }

    pub fn point(&self) -> u32 {
        self.inner.lock().point
    }

    pub fn shot(&self) -> u32 {
        self.inner.lock().shot
    }

    /// Cameras enumerated when the session was opened.
    pub fn cameras(&self) -> Vec<CameraId> {
        self.inner.lock().cameras.clone()
    }

    /// Open one video writer per session camera and write its metadata
    /// record.
    ///
    /// Cameras whose writer fails to open are reported in the returned
    /// `WriterOpen` error; the cameras that succeeded keep recording —
    /// a partial failure is surfaced, never silently swallowed.
    pub fn start_recording(&self, streams: &[StreamInput]) -> CaptureResult<()> {
        let mut inner = self.inner.lock();
        if inner.mode != SessionMode::Video {
            return Err(CaptureError::Session(
                "photo session cannot record video".to_string(),
            ));
        }
        match inner.state {
            SessionState::Recording | SessionState::Paused => {
                return Err(CaptureError::AlreadyRecording)
            }
            SessionState::Complete => {
                return Err(CaptureError::Session("session is complete".to_string()))
            }
            SessionState::Idle => {}
        }

        let started = timestamp_now();
        let mut failed: Vec<(CameraId, String)> = Vec::new();

        for stream in streams {
            if !inner.cameras.contains(&stream.camera) {
                tracing::warn!(camera = %stream.camera, "Stream not enumerated at session start, ignoring");
                continue;
            }

            let path = inner
                .session_dir
                .join(format!("camera_{}.mp4", stream.camera.tag()));
            let settings = WriterSettings {
                input_width: stream.width,
                input_height: stream.height,
                layout: stream.layout,
                output_width: inner.config.video_width,
                output_height: inner.config.video_height,
                fps: inner.config.video_fps,
            };

            let writer = match self.factory.open(stream.camera, &path, &settings) {
                Ok(writer) => writer,
                Err(e) => {
                    tracing::error!(camera = %stream.camera, "Failed to open video writer: {e}");
                    failed.push((stream.camera, e.to_string()));
                    continue;
                }
            };

            // One record per artifact, written up front so the file is
            // accounted for even if recording is interrupted.
            let record = CaptureRecord::video(
                &inner.context,
                path.to_string_lossy().to_string(),
                &started,
            );
            let record_path = inner
                .session_dir
                .join(format!("session_{}.json", stream.camera.tag()));
            if let Err(e) = record.write(&record_path) {
                tracing::error!(camera = %stream.camera, "Failed to write metadata record: {e}");
                failed.push((stream.camera, e.to_string()));
                if let Err(e) = writer.finish() {
                    tracing::warn!(camera = %stream.camera, "Error closing orphaned writer: {e}");
                }
                continue;
            }

            inner.writers.insert(stream.camera, writer);
        }

        if !inner.writers.is_empty() {
            inner.state = SessionState::Recording;
            let _ = self.events.send(CaptureEvent::RecordingStarted);
            tracing::info!(writers = inner.writers.len(), "Recording started");
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(CaptureError::WriterOpen { failed })
        }
    }

    /// Pause recording. Writers stay open so the files remain continuous
    /// across the pause.
    pub fn pause(&self) -> CaptureResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Recording {
            return Err(CaptureError::NotRecording);
        }
        inner.state = SessionState::Paused;
        let _ = self.events.send(CaptureEvent::Paused);
        tracing::info!("Recording paused");
        Ok(())
    }

    pub fn resume(&self) -> CaptureResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Paused {
            return Err(CaptureError::NotRecording);
        }
        inner.state = SessionState::Recording;
        let _ = self.events.send(CaptureEvent::Resumed);
        tracing::info!("Recording resumed");
        Ok(())
    }

    /// Stop accepting frames, flush and close every writer.
    ///
    /// Idempotent: with no writers open this is a no-op. Per-camera
    /// close failures are reported as events, not errors.
    pub fn finish_recording(&self) {
        let mut inner = self.inner.lock();
        let writers: Vec<(CameraId, Box<dyn VideoWriter>)> = inner.writers.drain().collect();
        let had_writers = !writers.is_empty();

        for (camera, writer) in writers {
            let frames = writer.frames_written();
            if let Err(e) = writer.finish() {
                tracing::error!(camera = %camera, "Failed to finalize video writer: {e}");
                let _ = self.events.send(CaptureEvent::WriterError {
                    camera,
                    reason: e.to_string(),
                });
            } else {
                tracing::info!(camera = %camera, frames, "Video writer closed");
            }
        }

        if matches!(inner.state, SessionState::Recording | SessionState::Paused) {
            inner.state = SessionState::Idle;
            let _ = self.events.send(CaptureEvent::RecordingStopped);
        }
        if had_writers {
            tracing::info!("Recording finished");
        }
    }

    /// Persist one photo plus one metadata record per provided frame,
    /// using the current shot index, then advance the index.
    ///
    /// Callers pass only cameras that actually have a frame; a camera
    /// whose snapshot fails to encode is skipped so the rest of the
    /// round still lands.
    pub fn capture_photos(&self, frames: &[(CameraId, Arc<Frame>)]) -> CaptureResult<Vec<PathBuf>> {
        let mut inner = self.inner.lock();
        if inner.mode != SessionMode::Photo {
            return Err(CaptureError::Session(
                "video session cannot capture photos".to_string(),
            ));
        }
        if inner.state == SessionState::Complete {
            return Err(CaptureError::Session("session is complete".to_string()));
        }

        let taken = timestamp_now();
        let shot = inner.shot;
        let mut written = Vec::new();

        for (camera, frame) in frames {
            let path = inner.session_dir.join(format!(
                "photo_{taken}_num_{shot}_cam{}.png",
                camera.tag()
            ));
            if let Err(e) = super::writer::write_photo(&path, frame) {
                tracing::error!(camera = %camera, "Failed to write photo: {e}");
                let _ = self.events.send(CaptureEvent::WriterError {
                    camera: *camera,
                    reason: e.to_string(),
                });
                continue;
            }

            let record = CaptureRecord::photo(
                &inner.context,
                inner.point,
                path.to_string_lossy().to_string(),
                &taken,
            );
            let record_path = inner
                .session_dir
                .join(format!("session_{}_try_{shot}.json", camera.tag()));
            if let Err(e) = record.write(&record_path) {
                tracing::error!(camera = %camera, "Failed to write metadata record: {e}");
                let _ = self.events.send(CaptureEvent::WriterError {
                    camera: *camera,
                    reason: e.to_string(),
                });
                continue;
            }

            written.push(path);
        }

        inner.shot += 1;
        let _ = self.events.send(CaptureEvent::PhotoCaptured {
            count: written.len(),
        });
        tracing::info!(point = inner.point, shot, photos = written.len(), "Photo round captured");
        Ok(written)
    }

    /// Move to the next inspection point: new per-point folder, shot
    /// counter back to 1.
    pub fn advance_point(&self) -> CaptureResult<u32> {
        let inner = self.inner.lock();
        let next = inner.point + 1;
        drop(inner);
        self.move_to_point(next)
    }

    /// Jump to an operator-entered point. Input is validated before any
    /// state changes.
    pub fn set_point(&self, raw: &str) -> CaptureResult<u32> {
        let point = parse_point(raw)?;
        self.move_to_point(point)
    }

    fn move_to_point(&self, point: u32) -> CaptureResult<u32> {
        let mut inner = self.inner.lock();
        if inner.mode != SessionMode::Photo {
            return Err(CaptureError::Session(
                "points apply to photo sessions only".to_string(),
            ));
        }

        let started_at = timestamp_now();
        let session_dir = SessionInner::session_dir(&inner.config, inner.mode, &started_at, point);
        std::fs::create_dir_all(&session_dir)?;

        inner.point = point;
        inner.shot = 1;
        inner.session_dir = session_dir;
        inner.started_at = started_at;
        tracing::info!(point, dir = %inner.session_dir.display(), "Advanced to point");
        Ok(point)
    }

    /// Close the session for good: writers finalized, state `Complete`.
    pub fn complete(&self) {
        self.finish_recording();
        self.inner.lock().state = SessionState::Complete;
    }
}

impl FrameSink for SessionRecorder {
    /// Append a full-resolution frame to its camera's writer. No-op
    /// unless a recording is active and not paused. Invoked from worker
    /// threads; bounded by file-write latency only.
    fn on_frame(&self, camera: CameraId, frame: &Arc<Frame>) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Recording {
            return;
        }
        let Some(writer) = inner.writers.get_mut(&camera) else {
            return;
        };
        if let Err(e) = writer.write_frame(frame) {
            tracing::error!(camera = %camera, "Frame write failed, dropping writer: {e}");
            // One camera's writer failure never corrupts its siblings;
            // the dead writer is removed and reported.
            inner.writers.remove(&camera);
            let _ = self.events.send(CaptureEvent::WriterError {
                camera,
                reason: e.to_string(),
            });
        }
    }
}
