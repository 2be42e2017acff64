use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::shared::frame::Frame;
use crate::video::domain::camera_source::{
    CameraConstraints, CameraError, CameraSource, FacingMode, StreamInfo,
};

enum CaptureMessage {
    Ended,
    Failed(String),
}

/// Single-frame mailbox between the decoder thread and the frame loop. A
/// newly decoded frame replaces one the loop has not picked up yet.
#[derive(Clone, Default)]
struct FrameSlot(Arc<Mutex<Option<Frame>>>);

impl FrameSlot {
    fn publish(&self, frame: Frame) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(frame);
        }
    }

    fn take(&self) -> Option<Frame> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Captures from a device (`video4linux2`, `avfoundation`, `dshow`) or plays
/// a media file in real time, via ffmpeg-next.
///
/// Decoding runs on a worker thread that owns the ffmpeg contexts. Only the
/// newest decoded frame is kept; older ones are dropped when the consumer
/// falls behind.
pub struct FfmpegCameraSource {
    events: Option<Receiver<CaptureMessage>>,
    slot: FrameSlot,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    latest: Option<Frame>,
    ended: bool,
}

impl FfmpegCameraSource {
    pub fn new() -> Self {
        Self {
            events: None,
            slot: FrameSlot::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
            worker: None,
            latest: None,
            ended: false,
        }
    }

    /// End-of-stream events are read before the slot so the final frame
    /// published ahead of them is not missed.
    fn drain(&mut self) {
        let Some(rx) = self.events.as_ref() else {
            return;
        };
        for message in rx.try_iter() {
            match message {
                CaptureMessage::Ended => self.ended = true,
                CaptureMessage::Failed(e) => {
                    log::warn!("Capture stopped: {e}");
                    self.ended = true;
                }
            }
        }
        if let Some(frame) = self.slot.take() {
            self.latest = Some(frame);
        }
    }
}

impl Default for FfmpegCameraSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FfmpegCameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl CameraSource for FfmpegCameraSource {
    fn start(&mut self, constraints: &CameraConstraints) -> Result<StreamInfo, CameraError> {
        self.stop();

        let (open_tx, open_rx) = crossbeam_channel::bounded(1);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let slot = FrameSlot::default();
        let cancelled = Arc::new(AtomicBool::new(false));

        let constraints = constraints.clone();
        let flag = Arc::clone(&cancelled);
        let publisher = slot.clone();
        let worker = thread::spawn(move || {
            capture(&constraints, &open_tx, &event_tx, &publisher, &flag)
        });

        let info = match open_rx.recv() {
            Ok(result) => result?,
            Err(_) => return Err(CameraError::Other("capture thread exited".into())),
        };

        log::info!("Camera started: {} ({}x{})", info.label, info.width, info.height);
        self.events = Some(event_rx);
        self.slot = slot;
        self.cancelled = cancelled;
        self.worker = Some(worker);
        self.latest = None;
        self.ended = false;
        Ok(info)
    }

    fn current_time_ms(&mut self) -> Option<f64> {
        self.drain();
        self.latest.as_ref().map(Frame::timestamp_ms)
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.latest.as_ref()
    }

    fn is_ended(&self) -> bool {
        self.ended
    }

    fn is_active(&self) -> bool {
        self.events.is_some()
    }

    fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.events = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            log::info!("Camera stopped");
        }
        self.latest = None;
        self.ended = false;
    }
}

/// Input URL and backend for the constraints. Without an explicit device
/// the platform's first camera is used.
fn resolve_input(constraints: &CameraConstraints) -> Result<(String, Option<String>), CameraError> {
    if let Some(device) = &constraints.device {
        return Ok((device.clone(), constraints.input_format.clone()));
    }
    let (device, backend) = if cfg!(target_os = "linux") {
        ("/dev/video0", "video4linux2")
    } else if cfg!(target_os = "macos") {
        ("0", "avfoundation")
    } else {
        // dshow needs a device name; there is no portable default.
        return Err(CameraError::NotFound);
    };
    Ok((
        device.to_string(),
        Some(constraints.input_format.clone().unwrap_or_else(|| backend.to_string())),
    ))
}

fn categorize(err: ffmpeg_next::Error) -> CameraError {
    if let ffmpeg_next::Error::Other { errno } = err {
        match std::io::Error::from_raw_os_error(errno).kind() {
            ErrorKind::PermissionDenied => return CameraError::PermissionDenied,
            ErrorKind::NotFound => return CameraError::NotFound,
            _ => {}
        }
    }
    CameraError::Other(err.to_string())
}

fn open_input(
    url: &str,
    backend: Option<&str>,
    constraints: &CameraConstraints,
) -> Result<ffmpeg_next::format::context::Input, CameraError> {
    ffmpeg_next::init().map_err(categorize)?;

    let Some(backend) = backend else {
        return ffmpeg_next::format::input(url).map_err(categorize);
    };

    ffmpeg_next::device::register_all();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == backend)
        .ok_or_else(|| CameraError::Other(format!("unknown input backend '{backend}'")))?;

    if constraints.facing == FacingMode::Environment {
        log::debug!("Facing mode is not selectable through {backend}; using {url}");
    }
    let mut opts = ffmpeg_next::Dictionary::new();
    opts.set(
        "video_size",
        &format!("{}x{}", constraints.width, constraints.height),
    );
    opts.set("framerate", "30");

    match ffmpeg_next::format::open_with(url, &format, opts).map_err(categorize)? {
        ffmpeg_next::format::context::Context::Input(ictx) => Ok(ictx),
        ffmpeg_next::format::context::Context::Output(_) => Err(CameraError::Other(format!(
            "{backend} opened {url} as an output"
        ))),
    }
}

/// Worker body: opens the input, reports the outcome on `open_tx`, then
/// decodes into `slot` until cancelled or out of packets.
fn capture(
    constraints: &CameraConstraints,
    open_tx: &Sender<Result<StreamInfo, CameraError>>,
    event_tx: &Sender<CaptureMessage>,
    slot: &FrameSlot,
    cancelled: &AtomicBool,
) {
    let opened = resolve_input(constraints).and_then(|(url, backend)| {
        let ictx = open_input(&url, backend.as_deref(), constraints)?;
        let stream = CaptureStream::new(ictx, &url, backend.is_none() && Path::new(&url).is_file())?;
        Ok((stream, url))
    });
    let (mut stream, url) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            let _ = open_tx.send(Err(e));
            return;
        }
    };
    let _ = open_tx.send(Ok(StreamInfo {
        width: stream.width,
        height: stream.height,
        label: url,
    }));

    match stream.run(slot, cancelled) {
        Ok(()) => {
            let _ = event_tx.send(CaptureMessage::Ended);
        }
        Err(e) => {
            let _ = event_tx.send(CaptureMessage::Failed(e.to_string()));
        }
    }
}

struct CaptureStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    time_base: f64,
    width: u32,
    height: u32,
    /// Files are released at their own frame rate instead of as fast as
    /// they decode.
    paced: bool,
    started: Instant,
    first_pts: Option<i64>,
    last_ts: f64,
}

impl CaptureStream {
    fn new(
        ictx: ffmpeg_next::format::context::Input,
        url: &str,
        paced: bool,
    ) -> Result<Self, CameraError> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CameraError::Other(format!("no video stream in {url}")))?;
        let stream_index = stream.index();
        let tb = stream.time_base();
        let time_base = if tb.denominator() != 0 {
            tb.numerator() as f64 / tb.denominator() as f64
        } else {
            0.0
        };
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(categorize)?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(categorize)?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            time_base,
            width,
            height,
            paced,
            started: Instant::now(),
            first_pts: None,
            last_ts: -1.0,
        })
    }

    fn run(&mut self, slot: &FrameSlot, cancelled: &AtomicBool) -> Result<(), ffmpeg_next::Error> {
        self.started = Instant::now();
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return Ok(());
            }
            // One packet per turn keeps cancellation responsive.
            let Some((stream, packet)) = self.ictx.packets().next() else {
                break;
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if !self.deliver_decoded(slot, cancelled)? {
                return Ok(());
            }
        }
        self.decoder.send_eof()?;
        self.deliver_decoded(slot, cancelled)?;
        Ok(())
    }

    /// Publishes every frame the decoder has ready. Returns `false` once
    /// capture is cancelled.
    fn deliver_decoded(
        &mut self,
        slot: &FrameSlot,
        cancelled: &AtomicBool,
    ) -> Result<bool, ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
            self.scaler.run(&decoded, &mut rgb_frame)?;

            let ts = self.playback_ms(decoded.timestamp().or(decoded.pts()));
            if self.paced {
                let due = self.started + Duration::from_secs_f64(ts / 1000.0);
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
            }
            if cancelled.load(Ordering::Relaxed) {
                return Ok(false);
            }

            let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
            slot.publish(Frame::new(pixels, self.width, self.height, 3, ts));
        }
        Ok(true)
    }

    /// Milliseconds since the first frame. Falls back to wall time when the
    /// stream carries no timestamps, and never goes backwards.
    fn playback_ms(&mut self, pts: Option<i64>) -> f64 {
        let ts = match pts {
            Some(pts) if self.time_base > 0.0 => {
                let first = *self.first_pts.get_or_insert(pts);
                (pts - first) as f64 * self.time_base * 1000.0
            }
            _ => self.started.elapsed().as_secs_f64() * 1000.0,
        };
        let ts = ts.max(self.last_ts);
        self.last_ts = ts;
        ts
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::surface_encoder::{
        Container, RecordingFormat, SurfaceEncoder, VideoCodec,
    };
    use crate::video::infrastructure::ffmpeg_surface_encoder::FfmpegSurfaceEncoder;
    use std::path::PathBuf;

    fn write_clip(dir: &Path, frames: u8) -> PathBuf {
        let path = dir.join("clip.mp4");
        let mut enc = FfmpegSurfaceEncoder::new();
        let format = RecordingFormat {
            codec: VideoCodec::Mpeg4,
            container: Container::Mp4,
        };
        enc.start(&format, 160, 120, 30).unwrap();
        let mut chunks = Vec::new();
        for i in 0..frames {
            let frame = Frame::new(vec![i * 20; 160 * 120 * 3], 160, 120, 3, 0.0);
            chunks.extend(enc.encode(&frame).unwrap());
        }
        chunks.extend(enc.finish().unwrap());
        enc.assemble(&chunks, &path).unwrap();
        path
    }

    fn file_constraints(path: &Path) -> CameraConstraints {
        CameraConstraints {
            device: Some(path.to_string_lossy().into_owned()),
            ..CameraConstraints::default()
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let mut source = FfmpegCameraSource::new();
        let err = source
            .start(&file_constraints(Path::new("/nonexistent/clip.mp4")))
            .unwrap_err();
        assert!(matches!(err, CameraError::NotFound), "got {err:?}");
        assert!(!source.is_active());
    }

    #[test]
    fn test_categorize_errno() {
        assert!(matches!(
            categorize(ffmpeg_next::Error::Other { errno: 13 }),
            CameraError::PermissionDenied
        ));
        assert!(matches!(
            categorize(ffmpeg_next::Error::Other { errno: 2 }),
            CameraError::NotFound
        ));
        assert!(matches!(
            categorize(ffmpeg_next::Error::InvalidData),
            CameraError::Other(_)
        ));
    }

    #[test]
    fn test_unknown_backend_is_reported() {
        let c = CameraConstraints {
            device: Some("x".into()),
            input_format: Some("no-such-backend".into()),
            ..CameraConstraints::default()
        };
        let err = FfmpegCameraSource::new().start(&c).unwrap_err();
        assert!(err.to_string().contains("no-such-backend"));
    }

    #[test]
    fn test_plays_file_with_advancing_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_clip(dir.path(), 6);

        let mut source = FfmpegCameraSource::new();
        let info = source.start(&file_constraints(&path)).unwrap();
        assert_eq!((info.width, info.height), (160, 120));
        assert!(source.is_active());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while !source.is_ended() && Instant::now() < deadline {
            if let Some(ts) = source.current_time_ms() {
                if seen.last() != Some(&ts) {
                    seen.push(ts);
                }
                let frame = source.current_frame().unwrap();
                assert_eq!((frame.width(), frame.height()), (160, 120));
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(source.is_ended());
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));

        source.stop();
        assert!(!source.is_active());
        assert!(source.current_time_ms().is_none());
    }

    fn ts_frame(ts: f64) -> Frame {
        Frame::new(vec![0; 2 * 2 * 3], 2, 2, 3, ts)
    }

    #[test]
    fn test_slot_keeps_newest_frame() {
        let slot = FrameSlot::default();
        for ts in [10.0, 20.0, 30.0] {
            slot.publish(ts_frame(ts));
        }
        assert_eq!(slot.take().map(|f| f.timestamp_ms()), Some(30.0));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_slow_consumer_sees_most_recent_frame() {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mut source = FfmpegCameraSource::new();
        source.events = Some(event_rx);
        let publisher = source.slot.clone();

        publisher.publish(ts_frame(0.0));
        assert_eq!(source.current_time_ms(), Some(0.0));

        // Three frames decoded while the loop was busy.
        for ts in [33.0, 66.0, 99.0] {
            publisher.publish(ts_frame(ts));
        }
        assert_eq!(source.current_time_ms(), Some(99.0));
        // Nothing new: the held frame stays current.
        assert_eq!(source.current_time_ms(), Some(99.0));

        publisher.publish(ts_frame(132.0));
        event_tx.send(CaptureMessage::Ended).unwrap();
        assert_eq!(source.current_time_ms(), Some(132.0));
        assert!(source.is_ended());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut source = FfmpegCameraSource::new();
        source.stop();
        source.stop();
        assert!(!source.is_active());
    }
}
