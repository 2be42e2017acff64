use std::time::Instant;

use crate::detection::domain::detection::DetectionList;
use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::domain::coordinate_mapper::map_detections;
use crate::overlay::domain::frame_geometry::FrameGeometry;
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::overlay::domain::surface::{effective_display_size, Surface};
use crate::session::frame_scheduler::{CallbackId, FrameScheduler};
use crate::session::hud::HudMetrics;
use crate::session::session_state::SessionState;
use crate::video::domain::camera_source::CameraSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Collaborators borrowed for one iteration.
pub struct LoopContext<'a> {
    pub camera: &'a mut dyn CameraSource,
    pub detector: &'a mut dyn FaceDetector,
    pub renderer: &'a mut dyn OverlayRenderer,
    pub surface: &'a mut Surface,
    pub state: &'a mut SessionState,
    /// Reported display size; a zero dimension falls back to the source size.
    pub display_size: (u32, u32),
}

#[derive(Debug)]
pub enum TickOutcome {
    /// Stale callback or idle loop. Nothing was done or scheduled.
    Ignored,
    /// No new source frame. The next callback is scheduled.
    Skipped { next: CallbackId },
    Rendered {
        hud: HudMetrics,
        detections: DetectionList,
        next: CallbackId,
    },
    /// Detection or painting failed for this frame only.
    Failed { error: String, next: CallbackId },
}

enum Iteration {
    Skipped,
    Rendered(HudMetrics, DetectionList),
    Failed(String),
}

/// Drives one detection and render pass per display refresh while the
/// camera runs.
pub struct FrameLoop {
    state: LoopState,
    scheduler: FrameScheduler,
    clock_origin: Instant,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            scheduler: FrameScheduler::new(),
            clock_origin: Instant::now(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn pending(&self) -> Option<CallbackId> {
        self.scheduler.pending()
    }

    /// Enters `Running` and requests the first callback.
    pub fn start(&mut self) -> CallbackId {
        self.state = LoopState::Running;
        self.scheduler.request()
    }

    /// Enters `Idle` and cancels the pending callback.
    pub fn stop(&mut self) {
        self.state = LoopState::Idle;
        self.scheduler.cancel();
    }

    pub fn tick(&mut self, id: CallbackId, ctx: LoopContext<'_>) -> TickOutcome {
        if !self.scheduler.fire(id) || self.state == LoopState::Idle {
            return TickOutcome::Ignored;
        }
        let iteration = self.iterate(ctx);
        let next = self.scheduler.request();
        match iteration {
            Iteration::Skipped => TickOutcome::Skipped { next },
            Iteration::Rendered(hud, detections) => TickOutcome::Rendered {
                hud,
                detections,
                next,
            },
            Iteration::Failed(error) => {
                log::warn!("Frame skipped: {error}");
                TickOutcome::Failed { error, next }
            }
        }
    }

    fn iterate(&self, ctx: LoopContext<'_>) -> Iteration {
        let LoopContext {
            camera,
            detector,
            renderer,
            surface,
            state,
            display_size,
        } = ctx;

        let Some(source_ts) = camera.current_time_ms() else {
            return Iteration::Skipped;
        };
        let Some(frame) = camera.current_frame() else {
            return Iteration::Skipped;
        };

        let source_size = (frame.width(), frame.height());
        let (dw, dh) = effective_display_size(display_size, source_size);
        surface.resize_if_needed(dw, dh);

        if source_ts == state.last_processed_source_timestamp {
            return Iteration::Skipped;
        }
        state.last_processed_source_timestamp = source_ts;

        // Detector timestamps come from one monotonic clock, so a restarted
        // camera whose playback time resets never looks like time going back.
        let detect_ts = self.clock_origin.elapsed().as_secs_f64() * 1000.0;
        let started = Instant::now();
        let detections = match detector.detect(frame, detect_ts) {
            Ok(d) => d,
            Err(e) => return Iteration::Failed(format!("detection failed: {e}")),
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let Some(geometry) = FrameGeometry::new(source_size, (dw, dh)) else {
            return Iteration::Failed("source frame has no pixels".into());
        };
        let mapped = map_detections(&detections, &geometry);
        if let Err(e) = renderer.render(frame, &mapped, state.blur_enabled, surface) {
            return Iteration::Failed(format!("render failed: {e}"));
        }

        let hud = HudMetrics::new(latency_ms, detections.len());
        log::debug!(
            "Frame {source_ts:.1}ms: {} face(s) in {latency_ms:.1}ms",
            detections.len()
        );
        Iteration::Rendered(hud, detections)
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::video::domain::camera_source::CameraConstraints;

    struct Rig {
        camera: ScriptedCamera,
        detector: CountingDetector,
        renderer: RecordingRenderer,
        surface: Surface,
        state: SessionState,
    }

    impl Rig {
        fn new(script: &[f64]) -> Self {
            let mut camera = ScriptedCamera::new(script);
            camera.start(&CameraConstraints::default()).unwrap();
            Self {
                camera,
                detector: CountingDetector::default(),
                renderer: RecordingRenderer::default(),
                surface: Surface::new(0, 0, false),
                state: SessionState::default(),
            }
        }

        fn ctx(&mut self, display_size: (u32, u32)) -> LoopContext<'_> {
            LoopContext {
                camera: &mut self.camera,
                detector: &mut self.detector,
                renderer: &mut self.renderer,
                surface: &mut self.surface,
                state: &mut self.state,
                display_size,
            }
        }
    }

    #[test]
    fn test_repeated_timestamps_are_processed_once() {
        let mut rig = Rig::new(&[5.0, 5.0, 6.0, 6.0, 7.0]);
        let mut fl = FrameLoop::new();
        let mut id = fl.start();
        let mut rendered_at = Vec::new();
        for i in 0..5 {
            id = match fl.tick(id, rig.ctx((0, 0))) {
                TickOutcome::Rendered { next, .. } => {
                    rendered_at.push(i);
                    next
                }
                TickOutcome::Skipped { next } => next,
                other => panic!("unexpected {other:?}"),
            };
        }
        assert_eq!(rendered_at, vec![0, 2, 4]);
        assert_eq!(rig.detector.calls, 3);
        assert_eq!(rig.renderer.calls.len(), 3);
        assert_eq!(rig.state.last_processed_source_timestamp, 7.0);
    }

    #[test]
    fn test_stale_callback_is_ignored() {
        let mut rig = Rig::new(&[1.0, 2.0]);
        let mut fl = FrameLoop::new();
        let first = fl.start();
        fl.stop();
        let second = fl.start();
        assert!(matches!(fl.tick(first, rig.ctx((0, 0))), TickOutcome::Ignored));
        assert_eq!(rig.detector.calls, 0);
        assert!(matches!(
            fl.tick(second, rig.ctx((0, 0))),
            TickOutcome::Rendered { .. }
        ));
    }

    #[test]
    fn test_idle_loop_schedules_nothing() {
        let mut rig = Rig::new(&[1.0]);
        let mut fl = FrameLoop::new();
        let id = fl.start();
        fl.stop();
        assert!(matches!(fl.tick(id, rig.ctx((0, 0))), TickOutcome::Ignored));
        assert!(fl.pending().is_none());
        assert_eq!(fl.state(), LoopState::Idle);
    }

    #[test]
    fn test_surface_tracks_display_size_with_source_fallback() {
        let mut rig = Rig::new(&[1.0, 2.0]);
        let mut fl = FrameLoop::new();
        let id = fl.start();
        let TickOutcome::Rendered { next, .. } = fl.tick(id, rig.ctx((0, 0))) else {
            panic!("expected render");
        };
        assert_eq!((rig.surface.width(), rig.surface.height()), (64, 48));
        fl.tick(next, rig.ctx((32, 24)));
        assert_eq!((rig.surface.width(), rig.surface.height()), (32, 24));
    }

    #[test]
    fn test_detections_are_mapped_to_surface() {
        let mut rig = Rig::new(&[1.0]);
        let mut fl = FrameLoop::new();
        let id = fl.start();
        fl.tick(id, rig.ctx((32, 24)));
        let mapped = &rig.renderer.last[0];
        assert_eq!(mapped.rect.x, 8.0);
        assert_eq!(mapped.rect.w, 16.0);
        assert_eq!(mapped.keypoints[0].x, 16.0);
        assert_eq!(mapped.label.as_deref(), Some("87%"));
    }

    #[test]
    fn test_detection_failure_skips_frame_and_keeps_running() {
        let mut rig = Rig::new(&[1.0, 2.0]);
        rig.detector.fail = true;
        let mut fl = FrameLoop::new();
        let id = fl.start();
        let next = match fl.tick(id, rig.ctx((0, 0))) {
            TickOutcome::Failed { error, next } => {
                assert!(error.contains("inference error"));
                next
            }
            other => panic!("unexpected {other:?}"),
        };
        assert!(rig.renderer.calls.is_empty());
        assert!(fl.is_running());
        assert_eq!(fl.pending(), Some(next));

        rig.detector.fail = false;
        assert!(matches!(fl.tick(next, rig.ctx((0, 0))), TickOutcome::Rendered { .. }));
    }

    #[test]
    fn test_no_frame_yet_is_skipped() {
        let mut rig = Rig::new(&[]);
        let mut fl = FrameLoop::new();
        let id = fl.start();
        assert!(matches!(fl.tick(id, rig.ctx((0, 0))), TickOutcome::Skipped { .. }));
        assert_eq!(rig.detector.calls, 0);
    }

    #[test]
    fn test_detector_timestamps_never_decrease() {
        let mut rig = Rig::new(&[100.0, 0.5, 0.7]);
        let mut fl = FrameLoop::new();
        let mut id = fl.start();
        let mut seen = Vec::new();
        for _ in 0..3 {
            let outcome = fl.tick(id, rig.ctx((0, 0)));
            seen.push(rig.detector.last_timestamp.unwrap());
            id = match outcome {
                TickOutcome::Rendered { next, .. } => next,
                other => panic!("unexpected {other:?}"),
            };
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
