//! Camera discovery
//!
//! Probes a bounded range of device indices for working webcams and
//! checks the OS device list for an attached action camera.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::process::Command;

use super::traits::{CameraId, CameraInfo, Resolution};

/// Probe device indices `0..max_index` and return the identities that
/// opened successfully, in index order.
///
/// Every index up to the bound is tried regardless of earlier failures:
/// hot-pluggable devices make index gaps common, so stopping at the
/// first closed index would hide cameras behind a gap.
pub fn discover_webcams(max_index: u32) -> Vec<CameraId> {
    probe_webcams(max_index)
        .into_iter()
        .map(|info| info.id)
        .collect()
}

/// Probe device indices `0..max_index` and report name and native
/// resolution for each working webcam.
pub fn probe_webcams(max_index: u32) -> Vec<CameraInfo> {
    let mut found = Vec::new();

    for index in 0..max_index {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        match Camera::new(CameraIndex::Index(index), requested) {
            Ok(camera) => {
                let resolution = camera.camera_format().resolution();
                let name = camera.info().human_name().to_string();
                tracing::info!(
                    index,
                    name = %name,
                    width = resolution.width(),
                    height = resolution.height(),
                    "Webcam probe succeeded"
                );
                found.push(CameraInfo {
                    id: CameraId::Webcam(index),
                    name,
                    resolution: Some(Resolution {
                        width: resolution.width(),
                        height: resolution.height(),
                    }),
                });
            }
            Err(e) => {
                tracing::debug!(index, "Webcam probe failed: {e}");
            }
        }
    }

    found
}

/// List cameras via the OS backend enumeration, without opening them.
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .filter_map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => CameraId::Webcam(*i),
                    // String-addressed devices are not part of the
                    // index-probed pool
                    CameraIndex::String(_) => return None,
                };
                Some(CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    resolution: None,
                })
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {e}");
            Vec::new()
        }
    }
}

/// Check the OS device list for an attached GoPro.
///
/// The enumeration command is the external collaborator: `pnputil` on
/// Windows, `lsusb` elsewhere. Any failure to run or parse it reads as
/// "not attached".
pub fn detect_action_camera() -> bool {
    let output = if cfg!(target_os = "windows") {
        Command::new("pnputil")
            .args(["/enum-devices", "/class", "Camera"])
            .output()
    } else {
        Command::new("lsusb").output()
    };

    match output {
        Ok(output) => {
            let listing = String::from_utf8_lossy(&output.stdout);
            listing.contains("GoPro")
        }
        Err(e) => {
            tracing::debug!("Action camera enumeration unavailable: {e}");
            false
        }
    }
}
