//! Error types and handling
//!
//! Common error types used across the capture and recording core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::traits::CameraId;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The device could not be opened. Fatal to that one worker, never to
    /// its siblings.
    #[error("Camera {camera} unavailable: {reason}")]
    DeviceUnavailable { camera: CameraId, reason: String },

    /// A single frame read failed. Callers skip the cycle and keep going.
    #[error("Frame read failed: {0}")]
    TransientRead(String),

    /// One or more video writers could not be created. Cameras whose
    /// writers did open keep recording; the failures are listed here.
    #[error("Video writer open failed for {failed:?}")]
    WriterOpen { failed: Vec<(CameraId, String)> },

    /// Operator input (point/pass number) was not a number. Rejected
    /// before any state mutation.
    #[error("Invalid point number: {0:?}")]
    InvalidInput(String),

    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Session error: {0}")]
    Session(String),

    #[error("Encoder error: {0}")]
    Encoder(String),
}

/// Error notification for the UI layer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<CaptureError> for ErrorResponse {
    fn from(error: CaptureError) -> Self {
        let code = match &error {
            CaptureError::Io(_) => "IO_ERROR",
            CaptureError::Serialization(_) => "SERIALIZATION_ERROR",
            CaptureError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            CaptureError::TransientRead(_) => "TRANSIENT_READ",
            CaptureError::WriterOpen { .. } => "WRITER_OPEN",
            CaptureError::InvalidInput(_) => "INVALID_INPUT",
            CaptureError::AlreadyRecording => "ALREADY_RECORDING",
            CaptureError::NotRecording => "NOT_RECORDING",
            CaptureError::Session(_) => "SESSION_ERROR",
            CaptureError::Encoder(_) => "ENCODER_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_codes() {
        let err = CaptureError::DeviceUnavailable {
            camera: CameraId::Webcam(2),
            reason: "busy".to_string(),
        };
        let resp = ErrorResponse::from(err);
        assert_eq!(resp.code, "DEVICE_UNAVAILABLE");
        assert!(resp.message.contains("webcam-2"));
    }

    #[test]
    fn invalid_input_keeps_raw_text() {
        let err = CaptureError::InvalidInput("abc".to_string());
        assert!(err.to_string().contains("abc"));
    }
}
