use std::path::PathBuf;
use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};

use crate::shared::constants::RECORDING_PURPOSE;
use crate::shared::download_directory::DownloadDirectory;
use crate::shared::frame::Frame;
use crate::video::domain::surface_encoder::{
    choose_format, EncodedChunk, RecordingFormat, SurfaceEncoder,
};

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("Start the camera before recording.")]
    CameraInactive,
    #[error("Already recording.")]
    AlreadyRecording,
    #[error("Not recording.")]
    NotRecording,
    #[error("Recording failed to start: {0}")]
    Start(String),
    #[error("Recording failed: {0}")]
    Encode(String),
    #[error("Failed to save recording: {0}")]
    Save(String),
}

struct ActiveRecording {
    format: RecordingFormat,
    width: u32,
    height: u32,
    started: Instant,
    frames_written: u64,
    chunks: Vec<EncodedChunk>,
}

/// Taps the surface at a fixed rate into an encoder and buffers the output
/// until the recording stops.
pub struct RecordSession {
    encoder: Box<dyn SurfaceEncoder>,
    downloads: DownloadDirectory,
    fps: u32,
    active: Option<ActiveRecording>,
}

impl RecordSession {
    pub fn new(encoder: Box<dyn SurfaceEncoder>, downloads: DownloadDirectory, fps: u32) -> Self {
        Self {
            encoder,
            downloads,
            fps: fps.max(1),
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Starts recording at the current surface size, which stays fixed for
    /// the whole recording. On failure the session stays stopped.
    pub fn start(
        &mut self,
        camera_active: bool,
        surface_size: (u32, u32),
        now: Instant,
    ) -> Result<RecordingFormat, RecordingError> {
        if !camera_active {
            return Err(RecordingError::CameraInactive);
        }
        if self.active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let format = choose_format(&*self.encoder);
        // 4:2:0 chroma needs even dimensions.
        let width = (surface_size.0 & !1).max(2);
        let height = (surface_size.1 & !1).max(2);
        self.encoder
            .start(&format, width, height, self.fps)
            .map_err(|e| RecordingError::Start(e.to_string()))?;

        log::info!("Recording started: {format} {width}x{height}");
        self.active = Some(ActiveRecording {
            format,
            width,
            height,
            started: now,
            frames_written: 0,
            chunks: Vec::new(),
        });
        Ok(format)
    }

    /// Feeds the surface as seen at `now`. Every frame slot that elapsed
    /// since the last tap is filled with this frame, so playback time tracks
    /// wall time.
    pub fn tap(&mut self, frame: &Frame, now: Instant) -> Result<(), RecordingError> {
        let Some(rec) = self.active.as_mut() else {
            return Ok(());
        };
        let elapsed = now.saturating_duration_since(rec.started).as_secs_f64();
        let due = (elapsed * self.fps as f64).floor() as u64 + 1;
        if due <= rec.frames_written {
            return Ok(());
        }

        let fitted = fit_frame(frame, rec.width, rec.height)?;
        let slots = (due - rec.frames_written).min(self.fps as u64);
        for _ in 0..slots {
            let chunks = self
                .encoder
                .encode(&fitted)
                .map_err(|e| RecordingError::Encode(e.to_string()))?;
            rec.chunks.extend(chunks);
        }
        rec.frames_written = due;
        Ok(())
    }

    /// Flushes, writes the buffered chunks as one file in the download
    /// directory and clears the buffer. The session is stopped afterwards
    /// even when saving fails.
    pub fn stop(&mut self) -> Result<PathBuf, RecordingError> {
        let mut rec = self.active.take().ok_or(RecordingError::NotRecording)?;

        let tail = self
            .encoder
            .finish()
            .map_err(|e| RecordingError::Save(e.to_string()))?;
        rec.chunks.extend(tail);

        let path = self
            .downloads
            .artifact_path(RECORDING_PURPOSE, rec.format.extension())
            .map_err(|e| RecordingError::Save(e.to_string()))?;
        self.encoder
            .assemble(&rec.chunks, &path)
            .map_err(|e| RecordingError::Save(e.to_string()))?;

        log::info!(
            "Recording saved: {} ({} frames)",
            path.display(),
            rec.frames_written
        );
        Ok(path)
    }
}

/// Scales `frame` to `width x height` when it differs.
fn fit_frame(frame: &Frame, width: u32, height: u32) -> Result<Frame, RecordingError> {
    if frame.width() == width && frame.height() == height {
        return Ok(frame.clone());
    }
    let view = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(frame.width(), frame.height(), frame.data())
        .ok_or_else(|| RecordingError::Encode("surface buffer is not RGB".into()))?;
    let scaled = imageops::resize(&view, width, height, FilterType::Triangle);
    Ok(Frame::new(
        scaled.into_raw(),
        width,
        height,
        3,
        frame.timestamp_ms(),
    ))
}
