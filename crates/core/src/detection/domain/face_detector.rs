use crate::detection::domain::detection::DetectionList;
use crate::shared::frame::Frame;

/// Domain interface for the face detection engine.
///
/// Implementations are streaming and stateful, hence `&mut self`. In video
/// mode `timestamp_ms` must not decrease between calls.
pub trait FaceDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        timestamp_ms: f64,
    ) -> Result<DetectionList, Box<dyn std::error::Error>>;
}
