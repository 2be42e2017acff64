/// Face bounding box in source-frame pixel units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Landmark in normalized [0, 1] source-frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Category {
    /// Confidence in [0, 1].
    pub score: f64,
}

/// One face reported by the detector for one frame.
///
/// Note the mixed units: the box is in source pixels, keypoints are
/// normalized. Consumers must not treat them alike.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub keypoints: Vec<Keypoint>,
    /// First entry is the primary category.
    pub categories: Vec<Category>,
}

impl Detection {
    pub fn primary_score(&self) -> Option<f64> {
        self.categories.first().map(|c| c.score)
    }
}

/// Detections for one frame, in model output order.
pub type DetectionList = Vec<Detection>;
