//! Artifact writers
//!
//! Video files are produced by piping raw frames into an `ffmpeg` child
//! process (H.264 MP4, one process per camera). Photo snapshots are
//! PNG-encoded in-process. `VideoWriter`/`WriterFactory` are trait seams
//! so the session logic can be exercised without spawning encoders.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::capture::frame::{ColorLayout, Frame};
use crate::capture::traits::CameraId;
use crate::utils::error::{CaptureError, CaptureResult};

/// Format declared when a video writer is opened.
///
/// Input dimensions are the camera's negotiated capture resolution;
/// output dimensions are the fixed recording target. Writers accept
/// only frames matching the declared input.
#[derive(Debug, Clone, Copy)]
pub struct WriterSettings {
    pub input_width: u32,
    pub input_height: u32,
    pub layout: ColorLayout,
    pub output_width: u32,
    pub output_height: u32,
    pub fps: u32,
}

/// One per-camera video file, open for appending frames.
pub trait VideoWriter: Send {
    /// Append one full-resolution frame.
    fn write_frame(&mut self, frame: &Frame) -> CaptureResult<()>;

    /// Frames appended so far.
    fn frames_written(&self) -> u64;

    /// Flush and close the file. Consumes the writer; it is never
    /// re-opened.
    fn finish(self: Box<Self>) -> CaptureResult<()>;
}

/// Opens video writers. The production implementation spawns ffmpeg;
/// tests substitute in-memory factories.
pub trait WriterFactory: Send + Sync {
    fn open(
        &self,
        camera: CameraId,
        path: &Path,
        settings: &WriterSettings,
    ) -> CaptureResult<Box<dyn VideoWriter>>;
}

fn pix_fmt(layout: ColorLayout) -> &'static str {
    match layout {
        ColorLayout::Rgb => "rgb24",
        ColorLayout::Rgba => "rgba",
    }
}

/// Factory spawning one ffmpeg encoder process per camera.
pub struct FfmpegWriterFactory;

impl WriterFactory for FfmpegWriterFactory {
    fn open(
        &self,
        camera: CameraId,
        path: &Path,
        settings: &WriterSettings,
    ) -> CaptureResult<Box<dyn VideoWriter>> {
        let writer = FfmpegVideoWriter::spawn(camera, path, *settings)?;
        Ok(Box::new(writer))
    }
}

/// ffmpeg child process fed raw frames on stdin.
///
/// Input: rawvideo at the camera's capture resolution. Output: H.264
/// MP4 at the fixed target resolution, scaled by ffmpeg when the two
/// differ.
struct FfmpegVideoWriter {
    camera: CameraId,
    /// `None` once finished; `Drop` reaps the child on error paths.
    process: Option<Child>,
    path: PathBuf,
    settings: WriterSettings,
    frames: u64,
    mismatch_logged: bool,
}

impl FfmpegVideoWriter {
    fn spawn(camera: CameraId, path: &Path, settings: WriterSettings) -> CaptureResult<Self> {
        let output_file = path.to_string_lossy().to_string();
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            pix_fmt(settings.layout).into(),
            "-video_size".into(),
            format!("{}x{}", settings.input_width, settings.input_height),
            "-framerate".into(),
            settings.fps.to_string(),
            "-i".into(),
            "-".into(),
        ];
        if (settings.output_width, settings.output_height)
            != (settings.input_width, settings.input_height)
        {
            args.push("-vf".into());
            args.push(format!(
                "scale={}:{}",
                settings.output_width, settings.output_height
            ));
        }
        let gop = (settings.fps * 2).to_string();
        for arg in [
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-pix_fmt",
            "yuv420p",
            "-crf",
            "18",
            "-g",
            gop.as_str(),
            "-movflags",
            "+faststart",
            output_file.as_str(),
        ] {
            args.push(arg.to_string());
        }

        let process = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptureError::Encoder(format!("failed to spawn ffmpeg: {e}")))?;

        tracing::info!(
            camera = %camera,
            input = %format!("{}x{}", settings.input_width, settings.input_height),
            output = %format!("{}x{}", settings.output_width, settings.output_height),
            fps = settings.fps,
            file = %output_file,
            "Started ffmpeg video writer"
        );

        Ok(Self {
            camera,
            process: Some(process),
            path: path.to_path_buf(),
            settings,
            frames: 0,
            mismatch_logged: false,
        })
    }
}

impl VideoWriter for FfmpegVideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> CaptureResult<()> {
        let expected = self.settings.input_width as usize
            * self.settings.input_height as usize
            * self.settings.layout.channels() as usize;
        if frame.data.len() != expected {
            // Raw pipes require exact frame sizes; a mismatched frame
            // would desynchronize every frame after it.
            if !self.mismatch_logged {
                tracing::warn!(
                    camera = %self.camera,
                    got = frame.data.len(),
                    expected,
                    "Skipping frame with unexpected size"
                );
                self.mismatch_logged = true;
            }
            return Ok(());
        }

        let stdin = self
            .process
            .as_mut()
            .and_then(|process| process.stdin.as_mut())
            .ok_or_else(|| CaptureError::Encoder("ffmpeg stdin closed".to_string()))?;
        stdin.write_all(&frame.data)?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> CaptureResult<()> {
        let mut process = self
            .process
            .take()
            .ok_or_else(|| CaptureError::Encoder("ffmpeg already finished".to_string()))?;
        // Closing stdin signals EOF; ffmpeg then finalizes the container.
        drop(process.stdin.take());
        let output = process
            .wait_with_output()
            .map_err(|e| CaptureError::Encoder(format!("ffmpeg wait failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Encoder(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!(
            camera = %self.camera,
            frames = self.frames,
            file = %self.path.display(),
            "Video writer finished"
        );
        Ok(())
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        // Error paths that never called finish(): close stdin and reap
        // the child so no zombie encoder outlives the session.
        if let Some(mut process) = self.process.take() {
            drop(process.stdin.take());
            let _ = process.wait();
        }
    }
}

/// Write one full-resolution frame as a PNG snapshot.
pub fn write_photo(path: &Path, frame: &Frame) -> CaptureResult<()> {
    if frame.data.len() != frame.expected_len() {
        return Err(CaptureError::Encoder(format!(
            "frame buffer {} does not match {}x{}x{}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.channels()
        )));
    }

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(match frame.layout {
        ColorLayout::Rgb => png::ColorType::Rgb,
        ColorLayout::Rgba => png::ColorType::Rgba,
    });
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| CaptureError::Encoder(e.to_string()))?;
    writer
        .write_image_data(&frame.data)
        .map_err(|e| CaptureError::Encoder(e.to_string()))?;
    Ok(())
}
