use std::path::Path;
use std::time::Instant;

use crate::session::hud::HudMetrics;
use crate::session::notices::Notice;
use crate::session::session_state::SessionState;

/// Presentation hook for session events.
///
/// The controller reports here instead of printing, so the terminal front
/// end and tests observe the same stream.
pub trait SessionObserver: Send {
    fn hud(&mut self, metrics: &HudMetrics);

    fn notice(&mut self, notice: &Notice);

    fn state_changed(&mut self, state: &SessionState);

    /// A snapshot or recording landed on disk.
    fn artifact_saved(&mut self, kind: &str, path: &Path);

    /// End-of-session report. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullSessionObserver;

impl SessionObserver for NullSessionObserver {
    fn hud(&mut self, _metrics: &HudMetrics) {}
    fn notice(&mut self, _notice: &Notice) {}
    fn state_changed(&mut self, _state: &SessionState) {}
    fn artifact_saved(&mut self, _kind: &str, _path: &Path) {}
}

/// Logs through the `log` facade, throttling the HUD to one line every
/// `throttle_frames` rendered frames, and keeps totals for a summary.
pub struct LogSessionObserver {
    throttle_frames: usize,
    frames: usize,
    latency_total_ms: u64,
    slow_frames: usize,
    max_faces: usize,
    artifacts: Vec<String>,
    start_time: Instant,
}

impl LogSessionObserver {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            frames: 0,
            latency_total_ms: 0,
            slow_frames: 0,
            max_faces: 0,
            artifacts: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns the formatted summary, or `None` if nothing was rendered.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 {
            return None;
        }
        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let avg = self.latency_total_ms as f64 / self.frames as f64;
        let mut lines = vec![
            format!("Session summary ({} frames, {elapsed_s:.1}s):", self.frames),
            format!("  latency: avg {avg:.1}ms, {} slow frame(s)", self.slow_frames),
            format!("  faces: max {}", self.max_faces),
        ];
        if elapsed_s > 0.0 {
            lines.push(format!(
                "  throughput: {:.1} fps",
                self.frames as f64 / elapsed_s
            ));
        }
        for artifact in &self.artifacts {
            lines.push(format!("  saved: {artifact}"));
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogSessionObserver {
    fn default() -> Self {
        Self::new(30)
    }
}

impl SessionObserver for LogSessionObserver {
    fn hud(&mut self, metrics: &HudMetrics) {
        self.frames += 1;
        self.latency_total_ms += metrics.latency_ms;
        self.max_faces = self.max_faces.max(metrics.face_count);
        if metrics.is_slow() {
            self.slow_frames += 1;
        }
        if self.frames % self.throttle_frames == 1 || self.throttle_frames == 1 {
            log::info!("{metrics}");
        }
    }

    fn notice(&mut self, notice: &Notice) {
        log::warn!("{}", notice.message);
    }

    fn state_changed(&mut self, state: &SessionState) {
        log::info!(
            "camera: {}, blur: {}, recording: {}",
            on_off(state.camera_active),
            on_off(state.blur_enabled),
            on_off(state.recording)
        );
    }

    fn artifact_saved(&mut self, kind: &str, path: &Path) {
        log::info!("{kind} saved to {}", path.display());
        self.artifacts.push(path.display().to_string());
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_observer_all_methods_are_noop() {
        let mut observer = NullSessionObserver;
        observer.hud(&HudMetrics::new(5.0, 1));
        observer.state_changed(&SessionState::default());
        observer.artifact_saved("Snapshot", Path::new("x.png"));
        observer.summary();
    }

    #[test]
    fn test_summary_none_before_any_frame() {
        assert!(LogSessionObserver::new(10).summary_string().is_none());
    }

    #[test]
    fn test_summary_aggregates_hud() {
        let mut observer = LogSessionObserver::new(10);
        observer.hud(&HudMetrics::new(10.0, 1));
        observer.hud(&HudMetrics::new(90.0, 3));
        observer.artifact_saved("Recording", Path::new("/tmp/face-record-1.webm"));
        let text = observer.summary_string().unwrap();
        assert!(text.contains("2 frames"));
        assert!(text.contains("avg 50.0ms, 1 slow"));
        assert!(text.contains("max 3"));
        assert!(text.contains("face-record-1.webm"));
        assert_eq!(observer.frames(), 2);
    }
}
