use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{select, Receiver};

use facecam_core::detection::domain::detector_options::{Delegate, DetectorOptions, RunningMode};
use facecam_core::detection::infrastructure::detector_loader::{self, DetectorLoadMessage};
use facecam_core::overlay::infrastructure::raster_overlay_renderer::RasterOverlayRenderer;
use facecam_core::session::events::{AppEvent, Command};
use facecam_core::session::session_controller::{
    SessionConfig, SessionController, SessionParts,
};
use facecam_core::session::session_observer::LogSessionObserver;
use facecam_core::shared::constants::BLAZEFACE_MODEL_NAME;
use facecam_core::shared::download_directory::DownloadDirectory;
use facecam_core::shared::model_resolver::ModelLocation;
use facecam_core::shared::settings::Settings;
use facecam_core::video::domain::camera_source::{CameraConstraints, FacingMode};
use facecam_core::video::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use facecam_core::video::infrastructure::ffmpeg_surface_encoder::FfmpegSurfaceEncoder;
use facecam_core::video::infrastructure::png_snapshot_writer::PngSnapshotWriter;

/// Live face detection over a camera feed, with blur, snapshots and recording.
///
/// Input (type and press Enter): c camera, b blur, r record, s snapshot, q quit,
/// or a display size such as 640x360.
#[derive(Parser, Debug)]
#[command(name = "facecam")]
struct Cli {
    /// Capture device, media file or URL (default: the platform camera).
    #[arg(long)]
    device: Option<String>,

    /// ffmpeg input format for the device, e.g. video4linux2 or avfoundation.
    #[arg(long)]
    input_format: Option<String>,

    /// Requested capture width.
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height.
    #[arg(long)]
    height: Option<u32>,

    /// Display surface width (0 or unset follows the source).
    #[arg(long)]
    display_width: Option<u32>,

    /// Display surface height (0 or unset follows the source).
    #[arg(long)]
    display_height: Option<u32>,

    /// Show the selfie-mirrored view.
    #[arg(long, conflicts_with = "no_mirror")]
    mirror: bool,

    /// Show the unmirrored view.
    #[arg(long)]
    no_mirror: bool,

    /// Local BlazeFace ONNX model file.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL the model is downloaded from when it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Minimum detection confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Overlap suppression threshold (0.0-1.0).
    #[arg(long)]
    suppression: Option<f64>,

    /// Inference acceleration: gpu or cpu.
    #[arg(long)]
    delegate: Option<String>,

    /// Start with face blurring enabled.
    #[arg(long)]
    blur: bool,

    /// Record this many seconds once the camera is live.
    #[arg(long)]
    record_seconds: Option<f64>,

    /// Take a snapshot after this many rendered frames.
    #[arg(long)]
    snapshot_after: Option<usize>,

    /// Quit after this many rendered frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Display refresh rate driving the frame loop.
    #[arg(long)]
    refresh_hz: Option<u32>,

    /// Directory for snapshots and recordings (default: Downloads).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log the HUD every N rendered frames.
    #[arg(long)]
    hud_interval: Option<u32>,

    /// Settings file to preload (default: <config dir>/facecam/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the merged settings back to the settings file.
    #[arg(long)]
    save_settings: bool,
}

/// One-shot actions requested on the command line.
#[derive(Debug, Default)]
struct Automation {
    record_seconds: Option<f64>,
    snapshot_after: Option<usize>,
    max_frames: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let file_settings = match &cli.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = merge(&cli, file_settings)?;
    let options = detector_options(&settings);
    validate(&settings, &options, &cli)?;

    if cli.save_settings {
        if let Some(path) = cli.settings.clone().or_else(Settings::config_path) {
            settings.save_to(&path)?;
            log::info!("Settings saved to {}", path.display());
        }
    }

    let automation = Automation {
        record_seconds: cli.record_seconds,
        snapshot_after: cli.snapshot_after,
        max_frames: cli.max_frames,
    };

    log::info!(
        "Loading face detector ({}, delegate {})",
        BLAZEFACE_MODEL_NAME,
        options.delegate
    );
    let detector_rx = detector_loader::spawn(options);
    let controller = build_controller(&settings);
    run_event_loop(controller, detector_rx, &settings, &automation)
}

/// File values first, then anything given on the command line.
fn merge(cli: &Cli, mut settings: Settings) -> Result<Settings, Box<dyn std::error::Error>> {
    if cli.device.is_some() {
        settings.device = cli.device.clone();
    }
    if cli.input_format.is_some() {
        settings.input_format = cli.input_format.clone();
    }
    if let Some(w) = cli.width {
        settings.camera_width = w;
    }
    if let Some(h) = cli.height {
        settings.camera_height = h;
    }
    if cli.display_width.is_some() {
        settings.display_width = cli.display_width;
    }
    if cli.display_height.is_some() {
        settings.display_height = cli.display_height;
    }
    if cli.mirror {
        settings.mirror = true;
    }
    if cli.no_mirror {
        settings.mirror = false;
    }
    if cli.model.is_some() {
        settings.model_path = cli.model.clone();
    }
    if cli.model_url.is_some() {
        settings.model_url = cli.model_url.clone();
    }
    if let Some(c) = cli.confidence {
        settings.confidence = c;
    }
    if let Some(s) = cli.suppression {
        settings.suppression_threshold = s;
    }
    if let Some(d) = &cli.delegate {
        settings.delegate = parse_delegate(d)?;
    }
    if cli.blur {
        settings.blur_on_start = true;
    }
    if let Some(hz) = cli.refresh_hz {
        settings.refresh_hz = hz;
    }
    if cli.output_dir.is_some() {
        settings.output_dir = cli.output_dir.clone();
    }
    if let Some(n) = cli.hud_interval {
        settings.hud_interval = n;
    }
    Ok(settings)
}

fn parse_delegate(value: &str) -> Result<Delegate, Box<dyn std::error::Error>> {
    match value.to_lowercase().as_str() {
        "gpu" => Ok(Delegate::Gpu),
        "cpu" => Ok(Delegate::Cpu),
        _ => Err(format!("Delegate must be 'gpu' or 'cpu', got '{value}'").into()),
    }
}

fn detector_options(settings: &Settings) -> DetectorOptions {
    DetectorOptions {
        model: ModelLocation {
            path: settings.model_path.clone(),
            name: BLAZEFACE_MODEL_NAME.to_string(),
            url: settings.model_url.clone(),
            bundled_dir: bundled_models_dir(),
        },
        min_detection_confidence: settings.confidence,
        min_suppression_threshold: settings.suppression_threshold,
        delegate: settings.delegate,
        running_mode: RunningMode::Video,
    }
}

/// `models/` next to the executable, where packaged builds ship the model.
fn bundled_models_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

fn validate(
    settings: &Settings,
    options: &DetectorOptions,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    options.validate()?;
    if let Some(path) = &settings.model_path {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
    }
    if settings.camera_width == 0 || settings.camera_height == 0 {
        return Err(format!(
            "Camera resolution must be non-zero, got {}x{}",
            settings.camera_width, settings.camera_height
        )
        .into());
    }
    if settings.refresh_hz == 0 || settings.refresh_hz > 240 {
        return Err(format!(
            "Refresh rate must be between 1 and 240, got {}",
            settings.refresh_hz
        )
        .into());
    }
    if settings.hud_interval == 0 {
        return Err("HUD interval must be at least 1".into());
    }
    if let Some(secs) = cli.record_seconds {
        if !(secs > 0.0 && secs.is_finite()) {
            return Err(format!("Record duration must be positive, got {secs}").into());
        }
    }
    if cli.max_frames == Some(0) {
        return Err("Frame limit must be at least 1".into());
    }
    Ok(())
}

fn build_controller(settings: &Settings) -> SessionController {
    let downloads = match &settings.output_dir {
        Some(dir) => DownloadDirectory::new(dir),
        None => DownloadDirectory::user_default(),
    };
    log::info!("Saving artifacts to {}", downloads.dir().display());

    let parts = SessionParts {
        camera: Box::new(FfmpegCameraSource::new()),
        renderer: Box::new(RasterOverlayRenderer::default()),
        encoder: Box::new(FfmpegSurfaceEncoder::new()),
        snapshots: Box::new(PngSnapshotWriter::new()),
        observer: Box::new(LogSessionObserver::new(settings.hud_interval as usize)),
        downloads,
    };
    let config = SessionConfig {
        constraints: CameraConstraints {
            width: settings.camera_width,
            height: settings.camera_height,
            facing: FacingMode::User,
            device: settings.device.clone(),
            input_format: settings.input_format.clone(),
        },
        mirrored: settings.mirror,
        blur_on_start: settings.blur_on_start,
        display_size: (
            settings.display_width.unwrap_or(0),
            settings.display_height.unwrap_or(0),
        ),
    };
    SessionController::new(parts, config)
}

/// A key (`c`, `b`, `r`, `s`, `q`) or a display size such as `640x360`.
fn parse_input_line(line: &str) -> Option<AppEvent> {
    if let Some(command) = Command::from_key(line) {
        return Some(AppEvent::Command(command));
    }
    let (w, h) = line.trim().split_once('x')?;
    Some(AppEvent::DisplayResized(w.parse().ok()?, h.parse().ok()?))
}

/// Forwards stdin lines as events. The channel closes at end of input.
fn spawn_input_reader() -> Receiver<AppEvent> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_input_line(&line) {
                Some(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("Unknown input '{}' (c, b, r, s, q or WxH)", line.trim()),
            }
        }
    });
    rx
}

fn run_event_loop(
    mut controller: SessionController,
    detector_rx: Receiver<DetectorLoadMessage>,
    settings: &Settings,
    automation: &Automation,
) -> Result<(), Box<dyn std::error::Error>> {
    let keys = spawn_input_reader();
    let mut keys_open = true;
    let mut detector_open = true;
    let closed_detector = crossbeam_channel::never();
    let closed_keys = crossbeam_channel::never();
    let ticker = crossbeam_channel::tick(Duration::from_secs_f64(
        1.0 / f64::from(settings.refresh_hz),
    ));

    let mut snapshot_taken = false;
    let mut recording_started: Option<Instant> = None;
    let mut was_active = false;

    loop {
        select! {
            recv(if detector_open { &detector_rx } else { &closed_detector }) -> msg => {
                let Ok(msg) = msg else {
                    detector_open = false;
                    continue;
                };
                let now = Instant::now();
                match msg {
                    DetectorLoadMessage::DownloadProgress(done, total) => {
                        download_progress(done, total);
                        controller.handle(AppEvent::Detector(msg), now);
                    }
                    DetectorLoadMessage::Failed(reason) => {
                        controller.handle(
                            AppEvent::Detector(DetectorLoadMessage::Failed(reason.clone())),
                            now,
                        );
                        controller.shutdown(now);
                        return Err(format!("Failed to load AI model: {reason}").into());
                    }
                    DetectorLoadMessage::Ready(_) => {
                        controller.handle(AppEvent::Detector(msg), now);
                        controller.start_camera(now)?;
                        if automation.record_seconds.is_some() {
                            controller.start_recording(now)?;
                            recording_started = Some(now);
                        }
                    }
                }
            }
            recv(if keys_open { &keys } else { &closed_keys }) -> input => {
                let Ok(event) = input else {
                    keys_open = false;
                    continue;
                };
                if !controller.handle(event, Instant::now()) {
                    return Ok(());
                }
            }
            recv(ticker) -> _ => {
                let Some(id) = controller.pending_refresh() else {
                    if was_active && !controller.state().camera_active && !keys_open {
                        break;
                    }
                    continue;
                };
                let now = Instant::now();
                controller.handle(AppEvent::Refresh(id), now);
                let rendered = controller.rendered_frames();
                was_active = true;

                if !snapshot_taken && automation.snapshot_after.is_some_and(|n| rendered >= n) {
                    snapshot_taken = true;
                    let _ = controller.take_snapshot(now);
                }
                if let (Some(started), Some(secs)) = (recording_started, automation.record_seconds) {
                    if controller.state().recording
                        && now.duration_since(started).as_secs_f64() >= secs
                    {
                        recording_started = None;
                        controller.stop_recording(now)?;
                    }
                }
                if automation.max_frames.is_some_and(|n| rendered >= n) {
                    break;
                }
            }
        }
    }

    controller.shutdown(Instant::now());
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
