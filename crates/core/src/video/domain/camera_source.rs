use crate::shared::constants::{DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH};
use crate::shared::frame::Frame;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// What to ask the camera for. Devices may deliver a different size.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
    /// Capture device or media URL; `None` picks the platform default.
    pub device: Option<String>,
    /// Input backend name such as `video4linux2` or `avfoundation`.
    pub input_format: Option<String>,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            facing: FacingMode::User,
            device: None,
            input_format: None,
        }
    }
}

/// Properties of an opened stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub label: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Camera access denied. Please allow permissions.")]
    PermissionDenied,
    #[error("No camera found on this device.")]
    NotFound,
    #[error("Error accessing camera: {0}")]
    Other(String),
}

/// A live video stream.
///
/// The current frame's timestamp is the stream's playback time. Repeated
/// reads without a new frame arriving return the same timestamp.
pub trait CameraSource: Send {
    fn start(&mut self, constraints: &CameraConstraints) -> Result<StreamInfo, CameraError>;

    /// Playback time of the newest frame, or `None` before the first one.
    fn current_time_ms(&mut self) -> Option<f64>;

    /// The frame at [`CameraSource::current_time_ms`].
    fn current_frame(&self) -> Option<&Frame>;

    /// A finite source (a media file) ran out of frames.
    fn is_ended(&self) -> bool;

    fn is_active(&self) -> bool;

    /// Releases the device. Safe to call when already stopped.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints_request_user_facing_720p() {
        let c = CameraConstraints::default();
        assert_eq!((c.width, c.height), (1280, 720));
        assert_eq!(c.facing, FacingMode::User);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CameraError::PermissionDenied.to_string(),
            "Camera access denied. Please allow permissions."
        );
        assert_eq!(
            CameraError::NotFound.to_string(),
            "No camera found on this device."
        );
        assert_eq!(
            CameraError::Other("busy".into()).to_string(),
            "Error accessing camera: busy"
        );
    }
}
