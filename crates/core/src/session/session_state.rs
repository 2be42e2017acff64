/// Everything the presentation layer observes about a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub detector_ready: bool,
    pub camera_active: bool,
    pub blur_enabled: bool,
    pub recording: bool,
    /// Source playback time of the last frame run through detection, or
    /// `-1` before the first one.
    pub last_processed_source_timestamp: f64,
}

impl SessionState {
    pub fn new(blur_enabled: bool) -> Self {
        Self {
            detector_ready: false,
            camera_active: false,
            blur_enabled,
            recording: false,
            last_processed_source_timestamp: -1.0,
        }
    }

    /// Camera stopped: every field returns to its startup value, with blur
    /// back at `initial_blur`. Detector readiness outlives the camera.
    pub fn reset_for_camera_stop(&mut self, initial_blur: bool) {
        *self = Self {
            detector_ready: self.detector_ready,
            ..Self::new(initial_blur)
        };
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(false)
    }
}
