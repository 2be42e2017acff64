use crate::detection::domain::detection::{BoundingBox, Detection, Keypoint};
use crate::overlay::domain::frame_geometry::FrameGeometry;

/// Box in destination-surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DestRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DestPoint {
    pub x: f64,
    pub y: f64,
}

/// A detection projected into destination space, ready to paint.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedDetection {
    pub rect: DestRect,
    pub keypoints: Vec<DestPoint>,
    /// `None` when the detection carries no category.
    pub label: Option<String>,
}

pub fn map_box(bbox: &BoundingBox, geometry: &FrameGeometry) -> DestRect {
    DestRect {
        x: bbox.origin_x * geometry.scale_x,
        y: bbox.origin_y * geometry.scale_y,
        w: bbox.width * geometry.scale_x,
        h: bbox.height * geometry.scale_y,
    }
}

/// Keypoints are normalized, so they go through source pixels before the
/// per-axis scale.
pub fn map_keypoint(kp: &Keypoint, geometry: &FrameGeometry) -> DestPoint {
    DestPoint {
        x: kp.x * geometry.source_width * geometry.scale_x,
        y: kp.y * geometry.source_height * geometry.scale_y,
    }
}

/// `round(score * 100)` followed by `%`.
pub fn confidence_label(score: f64) -> String {
    format!("{}%", (score * 100.0).round() as i64)
}

pub fn map_detection(detection: &Detection, geometry: &FrameGeometry) -> MappedDetection {
    MappedDetection {
        rect: map_box(&detection.bounding_box, geometry),
        keypoints: detection
            .keypoints
            .iter()
            .map(|kp| map_keypoint(kp, geometry))
            .collect(),
        label: detection.primary_score().map(confidence_label),
    }
}

pub fn map_detections(detections: &[Detection], geometry: &FrameGeometry) -> Vec<MappedDetection> {
    detections
        .iter()
        .map(|d| map_detection(d, geometry))
        .collect()
}
