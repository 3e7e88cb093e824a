//! Per-artifact metadata records
//!
//! One JSON record is written for every produced artifact: each photo,
//! and the start of each per-camera video. Records are append-only and
//! never mutated after write.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::state::SessionContext;
use crate::utils::error::CaptureResult;

/// Artifact kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Photo,
    Video,
}

/// Structured record describing one artifact.
///
/// Field names are the upload wire format and must not change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    pub green_house: String,
    pub block: String,
    pub garden_bed: String,
    pub garden_bed_side: String,

    /// Inspection point; present on photo records only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub garden_bed_point: Option<u32>,

    #[serde(rename = "fileURL")]
    pub file_url: String,

    pub file_type: ArtifactKind,
    pub task: String,

    /// Creation timestamp, `YYYYMMDD_HHMMSS`
    pub create_date: String,
}

impl CaptureRecord {
    /// Record for a per-camera video file, written at recording start.
    pub fn video(context: &SessionContext, file_url: impl Into<String>, created: &str) -> Self {
        Self {
            green_house: context.greenhouse.clone(),
            block: context.block.clone(),
            garden_bed: context.garden_bed.clone(),
            garden_bed_side: context.garden_bed_side.clone(),
            garden_bed_point: None,
            file_url: file_url.into(),
            file_type: ArtifactKind::Video,
            task: context.task.clone(),
            create_date: created.to_string(),
        }
    }

    /// Record for a single photo at an inspection point.
    pub fn photo(
        context: &SessionContext,
        point: u32,
        file_url: impl Into<String>,
        created: &str,
    ) -> Self {
        Self {
            green_house: context.greenhouse.clone(),
            block: context.block.clone(),
            garden_bed: context.garden_bed.clone(),
            garden_bed_side: context.garden_bed_side.clone(),
            garden_bed_point: Some(point),
            file_url: file_url.into(),
            file_type: ArtifactKind::Photo,
            task: context.task.clone(),
            create_date: created.to_string(),
        }
    }

    /// Write the record to `path` as JSON.
    pub fn write(&self, path: &Path) -> CaptureResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Current wall-clock timestamp in the session/record format.
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
