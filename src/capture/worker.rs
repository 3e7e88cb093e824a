//! Capture worker
//!
//! One worker per camera device: owns the device handle through its
//! `FrameSource`, pulls frames at a fixed cadence on a dedicated thread,
//! keeps the latest full-resolution frame, and publishes downscaled
//! previews to the hub.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::frame::Frame;
use super::hub::FrameHub;
use super::source::FrameSource;
use super::traits::CameraId;
use crate::recorder::channel::{CaptureEvent, EventSender, FrameSink};
use crate::utils::error::CaptureResult;

/// Per-worker capture settings
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Target period between acquisition cycles (~30 ms)
    pub frame_interval: Duration,
    pub preview_width: u32,
    pub preview_height: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(30),
            preview_width: 640,
            preview_height: 480,
        }
    }
}

/// State shared between the worker handle and its acquisition thread.
///
/// The running flag and the frame buffer live under one lock so that a
/// `stop()` cannot interleave with a half-stored frame.
struct WorkerShared {
    running: bool,
    last_frame: Option<Arc<Frame>>,
}

/// A capture worker bound to one camera identity.
///
/// Exactly one worker exists per identity at a time; workers share no
/// device handles and never block each other.
pub struct CaptureWorker {
    camera: CameraId,
    settings: WorkerSettings,
    hub: Arc<FrameHub>,
    sink: Arc<dyn FrameSink>,
    events: EventSender,
    shared: Arc<Mutex<WorkerShared>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    resolution: Mutex<Option<(u32, u32)>>,
}

impl CaptureWorker {
    pub fn new(
        camera: CameraId,
        settings: WorkerSettings,
        hub: Arc<FrameHub>,
        sink: Arc<dyn FrameSink>,
        events: EventSender,
    ) -> Self {
        Self {
            camera,
            settings,
            hub,
            sink,
            events,
            shared: Arc::new(Mutex::new(WorkerShared {
                running: false,
                last_frame: None,
            })),
            handle: Mutex::new(None),
            resolution: Mutex::new(None),
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    /// Negotiated capture resolution, available after a successful `start`.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        *self.resolution.lock()
    }

    /// Latest full-resolution frame, if the worker has produced one.
    pub fn last_full_frame(&self) -> Option<Arc<Frame>> {
        self.shared.lock().last_frame.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Open the device and begin the acquisition loop on its own thread.
    ///
    /// If the device fails to open, a `DeviceUnavailable` event is
    /// emitted and the error returned; no thread is spawned.
    pub fn start(&self, mut source: Box<dyn FrameSource>) -> CaptureResult<()> {
        if let Err(e) = source.open() {
            tracing::error!(camera = %self.camera, "Failed to open camera: {e}");
            let _ = self.events.send(CaptureEvent::DeviceUnavailable {
                camera: self.camera,
                reason: e.to_string(),
            });
            return Err(e);
        }

        *self.resolution.lock() = source.resolution();
        self.shared.lock().running = true;

        let camera = self.camera;
        let settings = self.settings;
        let shared = self.shared.clone();
        let hub = self.hub.clone();
        let sink = self.sink.clone();
        let events = self.events.clone();

        let handle = std::thread::Builder::new()
            .name(format!("capture-{camera}"))
            .spawn(move || {
                acquisition_loop(camera, settings, source, shared, hub, sink, events);
            })
            .map_err(|e| {
                self.shared.lock().running = false;
                e
            })?;

        *self.handle.lock() = Some(handle);
        tracing::info!(camera = %self.camera, "Capture worker started");
        Ok(())
    }

    /// Stop the acquisition loop and wait for the thread to exit.
    ///
    /// After this returns the device handle is released and no further
    /// frames are published. Latency is bounded by one cycle period.
    pub fn stop(&self) {
        self.shared.lock().running = false;
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!(camera = %self.camera, "Capture thread panicked");
            }
        }
        tracing::info!(camera = %self.camera, "Capture worker stopped");
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquisition_loop(
    camera: CameraId,
    settings: WorkerSettings,
    mut source: Box<dyn FrameSource>,
    shared: Arc<Mutex<WorkerShared>>,
    hub: Arc<FrameHub>,
    sink: Arc<dyn FrameSink>,
    events: EventSender,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        let cycle_start = Instant::now();

        // Lock scope covers the read and the frame-buffer store only;
        // the inter-frame sleep happens outside so stop() is never
        // starved for more than one read.
        let produced = {
            let mut state = shared.lock();
            if !state.running {
                break;
            }

            match source.read() {
                Ok(frame) => {
                    let full = Arc::new(frame);
                    state.last_frame = Some(full.clone());
                    let preview =
                        full.downscaled(settings.preview_width, settings.preview_height);
                    Some((full, preview))
                }
                Err(e) => {
                    tracing::debug!(camera = %camera, "Frame read failed, skipping cycle: {e}");
                    None
                }
            }
        };

        match produced {
            Some((full, preview)) => {
                consecutive_failures = 0;
                if let Some(preview) = preview {
                    hub.publish(camera, Arc::new(preview));
                }
                // Worker lock released above: the sink may block on file
                // I/O without holding up stop() or preview reads.
                sink.on_frame(camera, &full);
            }
            None => {
                if consecutive_failures == 0 {
                    let _ = events.send(CaptureEvent::ReadFailure { camera });
                }
                consecutive_failures = consecutive_failures.saturating_add(1);
            }
        }

        let elapsed = cycle_start.elapsed();
        if elapsed < settings.frame_interval {
            std::thread::sleep(settings.frame_interval - elapsed);
        }
    }

    // `source` drops here: the device is released before the thread
    // exits, so stop()'s join doubles as the release barrier.
    tracing::debug!(camera = %camera, "Acquisition loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::ColorLayout;
    use crate::recorder::channel::{event_channel, NullSink};
    use crate::utils::error::CaptureError;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct SyntheticSource {
        camera: CameraId,
        sequence: u64,
        fail_open: bool,
        fail_every_other_read: bool,
        released: Arc<AtomicBool>,
    }

    impl SyntheticSource {
        fn new(camera: CameraId) -> Self {
            Self {
                camera,
                sequence: 0,
                fail_open: false,
                fail_every_other_read: false,
                released: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl FrameSource for SyntheticSource {
        fn open(&mut self) -> CaptureResult<()> {
            if self.fail_open {
                return Err(CaptureError::DeviceUnavailable {
                    camera: self.camera,
                    reason: "synthetic open failure".to_string(),
                });
            }
            Ok(())
        }

        fn read(&mut self) -> CaptureResult<Frame> {
            self.sequence += 1;
            if self.fail_every_other_read && self.sequence % 2 == 0 {
                return Err(CaptureError::TransientRead("synthetic glitch".to_string()));
            }
            Ok(Frame::new(
                self.sequence,
                32,
                24,
                ColorLayout::Rgb,
                vec![0x40; 32 * 24 * 3],
            ))
        }

        fn resolution(&self) -> Option<(u32, u32)> {
            Some((32, 24))
        }
    }

    impl Drop for SyntheticSource {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn fast_settings() -> WorkerSettings {
        WorkerSettings {
            frame_interval: Duration::from_millis(2),
            preview_width: 16,
            preview_height: 12,
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn worker_publishes_previews_and_keeps_full_frame() {
        let camera = CameraId::Webcam(0);
        let hub = Arc::new(FrameHub::new());
        let (events, _rx) = event_channel();
        let worker = CaptureWorker::new(
            camera,
            fast_settings(),
            hub.clone(),
            Arc::new(NullSink),
            events,
        );

        worker
            .start(Box::new(SyntheticSource::new(camera)))
            .expect("open succeeds");
        assert_eq!(worker.resolution(), Some((32, 24)));

        wait_for(|| hub.latest(camera).is_some());
        let preview = hub.latest(camera).unwrap();
        assert_eq!((preview.width, preview.height), (16, 12));

        wait_for(|| worker.last_full_frame().is_some());
        let full = worker.last_full_frame().unwrap();
        assert_eq!((full.width, full.height), (32, 24));

        worker.stop();
    }

    #[test]
    fn stop_releases_device_and_silences_publishes() {
        let camera = CameraId::Webcam(1);
        let hub = Arc::new(FrameHub::new());
        let (events, _rx) = event_channel();
        let worker = CaptureWorker::new(
            camera,
            fast_settings(),
            hub.clone(),
            Arc::new(NullSink),
            events,
        );

        let source = SyntheticSource::new(camera);
        let released = source.released.clone();
        worker.start(Box::new(source)).expect("open succeeds");
        wait_for(|| hub.latest(camera).is_some());

        worker.stop();
        assert!(!worker.is_running());
        assert!(released.load(Ordering::SeqCst), "device handle released");

        // No post-stop publishes: the hub sequence stays frozen.
        let sequence = hub.latest(camera).unwrap().sequence;
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(hub.latest(camera).unwrap().sequence, sequence);
    }

    #[test]
    fn stop_twice_is_harmless() {
        let camera = CameraId::Webcam(2);
        let (events, _rx) = event_channel();
        let worker = CaptureWorker::new(
            camera,
            fast_settings(),
            Arc::new(FrameHub::new()),
            Arc::new(NullSink),
            events,
        );
        worker
            .start(Box::new(SyntheticSource::new(camera)))
            .expect("open succeeds");
        worker.stop();
        worker.stop();
    }

    #[test]
    fn open_failure_reports_device_unavailable() {
        let camera = CameraId::Webcam(3);
        let (events, mut rx) = event_channel();
        let worker = CaptureWorker::new(
            camera,
            fast_settings(),
            Arc::new(FrameHub::new()),
            Arc::new(NullSink),
            events,
        );

        let mut source = SyntheticSource::new(camera);
        source.fail_open = true;
        let err = worker.start(Box::new(source)).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable { .. }));
        assert!(!worker.is_running());
        assert!(matches!(
            rx.try_recv(),
            Ok(CaptureEvent::DeviceUnavailable { camera: c, .. }) if c == camera
        ));
    }

    #[test]
    fn transient_read_failures_do_not_stop_the_loop() {
        let camera = CameraId::Webcam(4);
        let hub = Arc::new(FrameHub::new());
        let (events, _rx) = event_channel();
        let worker = CaptureWorker::new(
            camera,
            fast_settings(),
            hub.clone(),
            Arc::new(NullSink),
            events,
        );

        let mut source = SyntheticSource::new(camera);
        source.fail_every_other_read = true;
        worker.start(Box::new(source)).expect("open succeeds");

        // Odd sequences succeed, even ones fail; the stream must keep
        // advancing past the failures.
        wait_for(|| {
            hub.latest(camera)
                .map(|f| f.sequence >= 5)
                .unwrap_or(false)
        });
        worker.stop();
    }
}
