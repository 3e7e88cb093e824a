//! Frame buffer type and preview derivation

use image::imageops::FilterType;
use image::{ImageBuffer, Rgb, Rgba};
use std::time::Instant;

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorLayout {
    Rgb,
    Rgba,
}

impl ColorLayout {
    pub fn channels(&self) -> u8 {
        match self {
            ColorLayout::Rgb => 3,
            ColorLayout::Rgba => 4,
        }
    }
}

/// A timestamped pixel buffer.
///
/// Workers produce two logical resolutions per cycle: the capture-native
/// full-resolution frame (the only one ever persisted) and a downscaled
/// preview derived from it for on-screen feedback.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Per-source capture sequence number; strictly increasing per camera
    pub sequence: u64,

    /// Wall-clock-free capture instant
    pub captured_at: Instant,

    pub width: u32,
    pub height: u32,
    pub layout: ColorLayout,

    /// Owned pixel data, `width * height * channels` bytes
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(sequence: u64, width: u32, height: u32, layout: ColorLayout, data: Vec<u8>) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
            width,
            height,
            layout,
            data,
        }
    }

    pub fn channels(&self) -> u8 {
        self.layout.channels()
    }

    /// Expected buffer length for the declared dimensions and layout
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels() as usize
    }

    /// Derive a downscaled preview frame.
    ///
    /// Returns `None` when the buffer does not match the declared
    /// dimensions (malformed frames are skipped, not resized).
    pub fn downscaled(&self, width: u32, height: u32) -> Option<Frame> {
        if self.data.len() != self.expected_len() {
            return None;
        }

        let data = match self.layout {
            ColorLayout::Rgb => {
                let view: ImageBuffer<Rgb<u8>, &[u8]> =
                    ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())?;
                image::imageops::resize(&view, width, height, FilterType::Triangle).into_raw()
            }
            ColorLayout::Rgba => {
                let view: ImageBuffer<Rgba<u8>, &[u8]> =
                    ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())?;
                image::imageops::resize(&view, width, height, FilterType::Triangle).into_raw()
            }
        };

        Some(Frame {
            sequence: self.sequence,
            captured_at: self.captured_at,
            width,
            height,
            layout: self.layout,
            data,
        })
    }
}
