//! End-to-end session flows against synthetic cameras and in-memory
//! writers, driven entirely through the public surface.

use crowncam::capture::{
    CaptureRequest, ColorLayout, Frame, FrameSource, SourceFactory,
};
use crowncam::recorder::{
    CaptureEvent, VideoWriter, WriterFactory, WriterSettings,
};
use crowncam::{
    CameraId, CaptureError, CaptureResult, RecordingConfig, RecordingCoordinator, SessionContext,
    SessionMode, SessionState,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crowncam=debug".into()),
        )
        .try_init();
}

/// Deterministic camera: a gradient frame per read. `dead` cameras open
/// but never deliver a frame.
struct SyntheticSource {
    camera: CameraId,
    sequence: u64,
    dead: bool,
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> CaptureResult<()> {
        match self.camera {
            CameraId::Webcam(_) => Ok(()),
            CameraId::ActionCamera => Err(CaptureError::DeviceUnavailable {
                camera: self.camera,
                reason: "no capture backend".to_string(),
            }),
        }
    }

    fn read(&mut self) -> CaptureResult<Frame> {
        if self.dead {
            return Err(CaptureError::TransientRead("synthetic dead camera".to_string()));
        }
        self.sequence += 1;
        let value = (self.sequence % 251) as u8;
        Ok(Frame::new(
            self.sequence,
            32,
            24,
            ColorLayout::Rgb,
            vec![value; 32 * 24 * 3],
        ))
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        Some((32, 24))
    }
}

struct SyntheticSourceFactory {
    dead_cameras: Vec<CameraId>,
}

impl SourceFactory for SyntheticSourceFactory {
    fn create(&self, camera: CameraId, _request: CaptureRequest) -> Box<dyn FrameSource> {
        Box::new(SyntheticSource {
            camera,
            sequence: 0,
            dead: self.dead_cameras.contains(&camera),
        })
    }
}

/// Writer appending raw frame bytes to the target path.
struct FileWriter {
    file: std::fs::File,
    frames: u64,
}

impl VideoWriter for FileWriter {
    fn write_frame(&mut self, frame: &Frame) -> CaptureResult<()> {
        self.file.write_all(&frame.data)?;
        self.file.flush()?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(self: Box<Self>) -> CaptureResult<()> {
        Ok(())
    }
}

struct FileWriterFactory {
    fail_for: Vec<CameraId>,
}

impl WriterFactory for FileWriterFactory {
    fn open(
        &self,
        camera: CameraId,
        path: &Path,
        _settings: &WriterSettings,
    ) -> CaptureResult<Box<dyn VideoWriter>> {
        if self.fail_for.contains(&camera) {
            return Err(CaptureError::Encoder("injected writer failure".to_string()));
        }
        Ok(Box::new(FileWriter {
            file: std::fs::File::create(path)?,
            frames: 0,
        }))
    }
}

fn test_config(root: &Path) -> RecordingConfig {
    RecordingConfig {
        output_root: root.to_path_buf(),
        frame_interval_ms: 2,
        preview_width: 16,
        preview_height: 12,
        ..RecordingConfig::default()
    }
}

fn coordinator(
    root: &Path,
    fail_writers_for: Vec<CameraId>,
    dead_cameras: Vec<CameraId>,
) -> RecordingCoordinator {
    RecordingCoordinator::with_factories(
        test_config(root),
        Arc::new(FileWriterFactory {
            fail_for: fail_writers_for,
        }),
        Arc::new(SyntheticSourceFactory { dead_cameras }),
    )
}

fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn context() -> SessionContext {
    SessionContext::new("GH-1", "B4", "T12", "west")
}

#[test]
fn video_session_records_pauses_and_finishes() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let cams = [CameraId::Webcam(0), CameraId::Webcam(1)];
    let mut coordinator = coordinator(root.path(), vec![], vec![]);

    let handle = coordinator
        .start_session(SessionMode::Video, context(), &cams)
        .unwrap();
    assert!(handle.dir.is_dir());
    assert_eq!(coordinator.state(), SessionState::Idle);

    // Previews reach the hub for every camera before recording starts.
    for cam in cams {
        wait_for("preview", || coordinator.latest(cam).is_some());
        let preview = coordinator.latest(cam).unwrap();
        assert_eq!((preview.width, preview.height), (16, 12));
    }

    coordinator.start_recording().unwrap();
    assert_eq!(coordinator.state(), SessionState::Recording);

    let video_0 = handle.dir.join("camera_0.mp4");
    let video_1 = handle.dir.join("camera_1.mp4");
    wait_for("frames on disk", || {
        file_len(&video_0) > 0 && file_len(&video_1) > 0
    });
    // One metadata record per camera, written at recording start.
    assert!(handle.dir.join("session_0.json").is_file());
    assert!(handle.dir.join("session_1.json").is_file());

    coordinator.pause().unwrap();
    assert_eq!(coordinator.state(), SessionState::Paused);
    // Paused: the files stop growing even though workers keep capturing.
    std::thread::sleep(Duration::from_millis(20));
    let paused_len = file_len(&video_0);
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(file_len(&video_0), paused_len);

    coordinator.resume().unwrap();
    wait_for("post-resume growth", || file_len(&video_0) > paused_len);

    coordinator.finish_recording().unwrap();
    assert_eq!(coordinator.state(), SessionState::Idle);
    // Idempotent: a second finish with no writers open is a no-op.
    coordinator.finish_recording().unwrap();

    coordinator.close_session();
    assert_eq!(coordinator.state(), SessionState::Idle);
}

#[test]
fn partial_writer_failure_keeps_other_cameras_recording() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let a = CameraId::Webcam(0);
    let b = CameraId::Webcam(1);
    let c = CameraId::Webcam(2);
    let mut coordinator = coordinator(root.path(), vec![a], vec![]);

    let handle = coordinator
        .start_session(SessionMode::Video, context(), &[a, b, c])
        .unwrap();
    for cam in [a, b, c] {
        wait_for("preview", || coordinator.latest(cam).is_some());
    }

    let err = coordinator.start_recording().unwrap_err();
    match err {
        CaptureError::WriterOpen { failed } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].0, a);
        }
        other => panic!("unexpected error: {other}"),
    }

    // B and C record regardless of A's failure.
    wait_for("B and C frames", || {
        file_len(&handle.dir.join("camera_1.mp4")) > 0
            && file_len(&handle.dir.join("camera_2.mp4")) > 0
    });
    assert!(!handle.dir.join("camera_0.mp4").exists());

    coordinator.finish_recording().unwrap();
}

#[test]
fn photo_session_skips_cameras_without_frames() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let live = CameraId::Webcam(0);
    let dead = CameraId::Webcam(1);
    let mut coordinator = coordinator(root.path(), vec![], vec![dead]);

    let handle = coordinator
        .start_session(
            SessionMode::Photo,
            context().with_pass_number(5),
            &[live, dead],
        )
        .unwrap();
    assert!(handle
        .dir
        .to_string_lossy()
        .contains(&format!("session_{}_point_5", handle.started_at)));

    wait_for("live preview", || coordinator.latest(live).is_some());
    assert!(coordinator.latest(dead).is_none());

    // Exactly one image + one record: the dead camera is skipped.
    let written = coordinator.capture_photo().unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("_num_1_cam0.png"));
    assert!(handle.dir.join("session_0_try_1.json").is_file());
    assert!(!handle.dir.join("session_1_try_1.json").exists());

    // Shot counter advances per round.
    let written = coordinator.capture_photo().unwrap();
    assert_eq!(written.len(), 1);
    assert!(handle.dir.join("session_0_try_2.json").is_file());

    // Advancing the point opens a fresh folder and resets the counter.
    let point = coordinator.advance_point().unwrap();
    assert_eq!(point, 6);
    let new_dir = coordinator.session_handle().unwrap().dir;
    assert_ne!(new_dir, handle.dir);
    let written = coordinator.capture_photo().unwrap();
    assert!(written[0].starts_with(&new_dir));
    assert!(new_dir.join("session_0_try_1.json").is_file());

    // Operator typos are rejected before any state changes.
    let err = coordinator.set_point("12a").unwrap_err();
    assert!(matches!(err, CaptureError::InvalidInput(_)));
    assert_eq!(coordinator.session_handle().unwrap().dir, new_dir);

    coordinator.close_session();
}

#[test]
fn failed_camera_open_is_broadcast_and_isolated() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let webcam = CameraId::Webcam(0);
    let mut coordinator = coordinator(root.path(), vec![], vec![]);
    let mut events = coordinator.subscribe();

    // The action camera has no capture backend; its open failure must
    // not keep the webcam out of the session.
    coordinator
        .start_session(
            SessionMode::Photo,
            context(),
            &[webcam, CameraId::ActionCamera],
        )
        .unwrap();

    wait_for("webcam preview", || coordinator.latest(webcam).is_some());
    assert_eq!(coordinator.active_cameras(), vec![webcam]);

    let mut saw_unavailable = false;
    while let Ok(event) = events.try_recv() {
        if let CaptureEvent::DeviceUnavailable { camera, .. } = event {
            assert_eq!(camera, CameraId::ActionCamera);
            saw_unavailable = true;
        }
    }
    assert!(saw_unavailable, "DeviceUnavailable event expected");

    coordinator.close_session();
}
