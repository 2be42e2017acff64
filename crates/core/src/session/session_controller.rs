use std::path::PathBuf;
use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::detector_loader::DetectorLoadMessage;
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::overlay::domain::surface::{effective_display_size, Surface};
use crate::session::events::{AppEvent, Command};
use crate::session::frame_loop::{FrameLoop, LoopContext, TickOutcome};
use crate::session::frame_scheduler::CallbackId;
use crate::session::hud::HudMetrics;
use crate::session::notices::{Notice, NoticeBoard};
use crate::session::record_session::{RecordSession, RecordingError};
use crate::session::session_observer::SessionObserver;
use crate::session::session_state::SessionState;
use crate::shared::constants::{RECORDING_FPS, SNAPSHOT_PURPOSE};
use crate::shared::download_directory::DownloadDirectory;
use crate::video::domain::camera_source::{CameraConstraints, CameraError, CameraSource};
use crate::video::domain::snapshot_writer::SnapshotWriter;
use crate::video::domain::surface_encoder::SurfaceEncoder;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Face Detector not loaded yet.")]
    DetectorNotReady,
    #[error("Failed to load AI model: {0}")]
    DetectorFailed(String),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error("Start the camera before taking a snapshot.")]
    CameraInactive,
    #[error("Failed to save snapshot: {0}")]
    Snapshot(String),
}

/// External collaborators a session drives.
pub struct SessionParts {
    pub camera: Box<dyn CameraSource>,
    pub renderer: Box<dyn OverlayRenderer>,
    pub encoder: Box<dyn SurfaceEncoder>,
    pub snapshots: Box<dyn SnapshotWriter>,
    pub observer: Box<dyn SessionObserver>,
    pub downloads: DownloadDirectory,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub constraints: CameraConstraints,
    pub mirrored: bool,
    pub blur_on_start: bool,
    /// `(0, 0)` follows the source size.
    pub display_size: (u32, u32),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            constraints: CameraConstraints::default(),
            mirrored: true,
            blur_on_start: false,
            display_size: (0, 0),
        }
    }
}

/// Owns the session state and applies every event to it on one timeline.
///
/// User-visible failures are raised as banners and also returned, so a
/// caller can react without parsing messages.
pub struct SessionController {
    state: SessionState,
    detector: Option<Box<dyn FaceDetector>>,
    init_error: Option<String>,
    camera: Box<dyn CameraSource>,
    renderer: Box<dyn OverlayRenderer>,
    recorder: RecordSession,
    snapshots: Box<dyn SnapshotWriter>,
    downloads: DownloadDirectory,
    observer: Box<dyn SessionObserver>,
    surface: Surface,
    frame_loop: FrameLoop,
    notices: NoticeBoard,
    constraints: CameraConstraints,
    display_size: (u32, u32),
    last_hud: Option<HudMetrics>,
    frame_error_raised: bool,
    blur_on_start: bool,
    rendered_frames: usize,
}

impl SessionController {
    pub fn new(parts: SessionParts, config: SessionConfig) -> Self {
        let SessionParts {
            camera,
            renderer,
            encoder,
            snapshots,
            observer,
            downloads,
        } = parts;
        Self {
            state: SessionState::new(config.blur_on_start),
            detector: None,
            init_error: None,
            camera,
            renderer,
            recorder: RecordSession::new(encoder, downloads.clone(), RECORDING_FPS),
            snapshots,
            downloads,
            observer,
            surface: Surface::new(0, 0, config.mirrored),
            frame_loop: FrameLoop::new(),
            notices: NoticeBoard::default(),
            constraints: config.constraints,
            display_size: config.display_size,
            last_hud: None,
            frame_error_raised: false,
            blur_on_start: config.blur_on_start,
            rendered_frames: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn last_hud(&self) -> Option<HudMetrics> {
        self.last_hud
    }

    pub fn active_notices(&mut self, now: Instant) -> &[Notice] {
        self.notices.active(now)
    }

    /// Frames run through detection and rendering since startup.
    pub fn rendered_frames(&self) -> usize {
        self.rendered_frames
    }

    /// The display-refresh callback the loop is waiting for, if any.
    pub fn pending_refresh(&self) -> Option<CallbackId> {
        self.frame_loop.pending()
    }

    /// Applies one event. Returns `false` once the session should end.
    pub fn handle(&mut self, event: AppEvent, now: Instant) -> bool {
        match event {
            AppEvent::Detector(DetectorLoadMessage::DownloadProgress(done, total)) => {
                if total > 0 {
                    log::debug!("Model download: {done}/{total} bytes");
                }
            }
            AppEvent::Detector(DetectorLoadMessage::Ready(detector)) => {
                self.detector_ready(detector);
            }
            AppEvent::Detector(DetectorLoadMessage::Failed(reason)) => {
                self.detector_failed(reason, now);
            }
            AppEvent::Command(Command::Quit) => {
                self.shutdown(now);
                return false;
            }
            AppEvent::Command(command) => {
                let _ = self.run_command(command, now);
            }
            AppEvent::Refresh(id) => {
                self.on_refresh(id, now);
            }
            AppEvent::DisplayResized(w, h) => self.display_size = (w, h),
        }
        true
    }

    pub fn run_command(&mut self, command: Command, now: Instant) -> Result<(), SessionError> {
        match command {
            Command::ToggleCamera => self.toggle_camera(now),
            Command::ToggleBlur => {
                self.toggle_blur();
                Ok(())
            }
            Command::ToggleRecording => self.toggle_recording(now).map(|_| ()),
            Command::Snapshot => self.take_snapshot(now).map(|_| ()),
            Command::Quit => {
                self.shutdown(now);
                Ok(())
            }
        }
    }

    pub fn detector_ready(&mut self, detector: Box<dyn FaceDetector>) {
        log::info!("Face detector ready");
        self.detector = Some(detector);
        self.init_error = None;
        self.state.detector_ready = true;
        self.observer.state_changed(&self.state);
    }

    /// Terminal: the camera stays disabled for the rest of the session.
    pub fn detector_failed(&mut self, reason: String, now: Instant) {
        self.init_error = Some(reason.clone());
        self.report(SessionError::DetectorFailed(reason), now);
    }

    pub fn toggle_camera(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.state.camera_active {
            self.stop_camera(now);
            return Ok(());
        }
        self.start_camera(now)
    }

    pub fn start_camera(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.detector.is_none() {
            let err = match &self.init_error {
                Some(reason) => SessionError::DetectorFailed(reason.clone()),
                None => SessionError::DetectorNotReady,
            };
            return Err(self.report(err, now));
        }
        if self.state.camera_active {
            return Ok(());
        }
        let info = match self.camera.start(&self.constraints) {
            Ok(info) => info,
            Err(e) => return Err(self.report(e.into(), now)),
        };

        let (w, h) = effective_display_size(self.display_size, (info.width, info.height));
        self.surface.resize_if_needed(w, h);
        self.state.camera_active = true;
        self.state.last_processed_source_timestamp = -1.0;
        self.frame_error_raised = false;
        self.frame_loop.start();
        self.observer.state_changed(&self.state);
        Ok(())
    }

    /// Stops the loop and the device. An active recording is finalized
    /// first.
    pub fn stop_camera(&mut self, now: Instant) {
        if !self.state.camera_active {
            return;
        }
        if self.state.recording {
            let _ = self.stop_recording(now);
        }
        self.frame_loop.stop();
        self.camera.stop();
        self.state.reset_for_camera_stop(self.blur_on_start);
        self.surface.frame_mut().data_mut().fill(0);
        self.last_hud = None;
        self.observer.state_changed(&self.state);
    }

    /// Affects painting only; detections are unchanged.
    pub fn toggle_blur(&mut self) {
        self.state.blur_enabled = !self.state.blur_enabled;
        self.observer.state_changed(&self.state);
    }

    /// Returns the saved file when this call stopped a recording.
    pub fn toggle_recording(&mut self, now: Instant) -> Result<Option<PathBuf>, SessionError> {
        if self.state.recording {
            return self.stop_recording(now).map(Some);
        }
        self.start_recording(now).map(|_| None)
    }

    pub fn start_recording(&mut self, now: Instant) -> Result<(), SessionError> {
        let size = (self.surface.width(), self.surface.height());
        match self.recorder.start(self.state.camera_active, size, now) {
            Ok(_) => {
                self.state.recording = true;
                self.observer.state_changed(&self.state);
                Ok(())
            }
            Err(e) => Err(self.report(e.into(), now)),
        }
    }

    pub fn stop_recording(&mut self, now: Instant) -> Result<PathBuf, SessionError> {
        if !self.state.recording {
            return Err(self.report(RecordingError::NotRecording.into(), now));
        }
        self.state.recording = false;
        let result = self.recorder.stop();
        self.observer.state_changed(&self.state);
        match result {
            Ok(path) => {
                self.observer.artifact_saved("Recording", &path);
                Ok(path)
            }
            Err(e) => Err(self.report(e.into(), now)),
        }
    }

    /// Saves what the user sees, at source resolution.
    pub fn take_snapshot(&mut self, now: Instant) -> Result<PathBuf, SessionError> {
        if !self.state.camera_active {
            return Err(self.report(SessionError::CameraInactive, now));
        }
        let size = self
            .camera
            .current_frame()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((self.surface.width(), self.surface.height()));

        let result = self
            .downloads
            .artifact_path(SNAPSHOT_PURPOSE, "png")
            .map_err(|e| e.to_string())
            .and_then(|path| {
                self.snapshots
                    .write_png(&path, &self.surface.displayed(), size)
                    .map(|()| path)
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(path) => {
                self.observer.artifact_saved("Snapshot", &path);
                Ok(path)
            }
            Err(e) => Err(self.report(SessionError::Snapshot(e), now)),
        }
    }

    /// Runs the display-refresh callback `id`.
    pub fn on_refresh(&mut self, id: CallbackId, now: Instant) -> TickOutcome {
        let Some(detector) = self.detector.as_deref_mut() else {
            return TickOutcome::Ignored;
        };
        let outcome = self.frame_loop.tick(
            id,
            LoopContext {
                camera: &mut *self.camera,
                detector,
                renderer: &mut *self.renderer,
                surface: &mut self.surface,
                state: &mut self.state,
                display_size: self.display_size,
            },
        );

        if matches!(outcome, TickOutcome::Ignored) {
            return outcome;
        }
        match &outcome {
            TickOutcome::Rendered { hud, .. } => {
                self.last_hud = Some(*hud);
                self.rendered_frames += 1;
                self.frame_error_raised = false;
                self.observer.hud(hud);
            }
            TickOutcome::Failed { error, .. } => {
                if !self.frame_error_raised {
                    self.frame_error_raised = true;
                    let message = format!("Detection failed, skipping frames: {error}");
                    let notice = self.notices.raise(message, now);
                    self.observer.notice(notice);
                }
            }
            TickOutcome::Skipped { .. } | TickOutcome::Ignored => {}
        }

        if self.state.recording {
            if let Err(e) = self.recorder.tap(&self.surface.displayed(), now) {
                self.report(e.into(), now);
                let _ = self.stop_recording(now);
            }
        }

        if self.camera.is_ended() {
            log::info!("Video source ended");
            self.stop_camera(now);
        }
        outcome
    }

    /// Stops everything and emits the observer summary.
    pub fn shutdown(&mut self, now: Instant) {
        self.stop_camera(now);
        self.observer.summary();
    }

    fn report(&mut self, err: SessionError, now: Instant) -> SessionError {
        let notice = self.notices.raise(err.to_string(), now);
        self.observer.notice(notice);
        err
    }
}
