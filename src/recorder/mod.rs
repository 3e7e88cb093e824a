//! Recording system module
//!
//! Session lifecycle, per-camera video writers, per-artifact metadata
//! records, and the coordinator that ties workers to sessions.

pub mod channel;
pub mod coordinator;
pub mod metadata;
pub mod session;
pub mod state;
pub mod writer;

pub use channel::{event_channel, CaptureEvent, EventReceiver, EventSender, FrameSink, NullSink};
pub use coordinator::RecordingCoordinator;
pub use metadata::{timestamp_now, ArtifactKind, CaptureRecord};
pub use session::{SessionRecorder, StreamInput};
pub use state::{
    parse_point, RecordingConfig, SessionContext, SessionHandle, SessionMode, SessionState,
};
pub use writer::{FfmpegWriterFactory, VideoWriter, WriterFactory, WriterSettings};
