/// BlazeFace short-range face detector using ONNX Runtime via `ort`.
///
/// Produces boxes in source-frame pixels, six normalized keypoints and one
/// confidence category per face.
use std::path::Path;

use thiserror::Error;

use crate::detection::domain::detection::{
    BoundingBox, Category, Detection, DetectionList, Keypoint,
};
use crate::detection::domain::detector_options::{Delegate, DetectorOptions, RunningMode};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{self, ModelResolveError, ProgressFn};

use super::execution_provider::execution_providers_for;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Regressor values per anchor: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

const NUM_KEYPOINTS: usize = 6;

#[derive(Error, Debug)]
pub enum DetectorInitError {
    #[error("model asset unavailable: {0}")]
    Model(#[from] ModelResolveError),
    #[error("{delegate} acceleration unavailable: {reason}")]
    Acceleration { delegate: Delegate, reason: String },
    #[error("failed to load model session: {0}")]
    Session(String),
    #[error("invalid detector options: {0}")]
    Options(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum DetectError {
    #[error("timestamp {current}ms precedes previous {previous}ms in video mode")]
    NonMonotonicTimestamp { previous: f64, current: f64 },
    #[error("model expected 2 outputs, got {0}")]
    OutputCount(usize),
}

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    suppression_threshold: f64,
    running_mode: RunningMode,
    anchors: Vec<[f32; 2]>,
    last_timestamp_ms: Option<f64>,
}

impl OnnxBlazefaceDetector {
    /// Resolves the model asset and builds an inference session.
    pub fn create(
        options: &DetectorOptions,
        progress: Option<ProgressFn>,
    ) -> Result<Self, DetectorInitError> {
        options.validate().map_err(DetectorInitError::Options)?;
        let model_path = model_resolver::resolve(&options.model, progress)?;
        Self::from_model_file(&model_path, options)
    }

    pub fn from_model_file(
        model_path: &Path,
        options: &DetectorOptions,
    ) -> Result<Self, DetectorInitError> {
        let mut builder = ort::session::Session::builder()
            .map_err(|e| DetectorInitError::Session(e.to_string()))?;

        let providers = execution_providers_for(options.delegate);
        if providers.is_empty() {
            if options.delegate == Delegate::Gpu {
                log::warn!("No GPU execution provider on this platform, running on CPU");
            }
        } else {
            builder = builder.with_execution_providers(providers).map_err(|e| {
                DetectorInitError::Acceleration {
                    delegate: options.delegate,
                    reason: e.to_string(),
                }
            })?;
        }

        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| DetectorInitError::Session(e.to_string()))?;
        log::info!(
            "Loaded face detector from {} (delegate={}, mode={:?})",
            model_path.display(),
            options.delegate,
            options.running_mode
        );

        Ok(Self {
            session,
            confidence: options.min_detection_confidence,
            suppression_threshold: options.min_suppression_threshold,
            running_mode: options.running_mode,
            anchors: generate_anchors(),
            last_timestamp_ms: None,
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        timestamp_ms: f64,
    ) -> Result<DetectionList, Box<dyn std::error::Error>> {
        if self.running_mode == RunningMode::Video {
            check_monotonic(self.last_timestamp_ms, timestamp_ms)?;
            self.last_timestamp_ms = Some(timestamp_ms);
        }

        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(Box::new(DetectError::OutputCount(outputs.len())));
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut raw = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence as f32,
        );
        let kept = nms(&mut raw, self.suppression_threshold);
        Ok(kept
            .iter()
            .map(|d| d.to_detection(frame.width(), frame.height()))
            .collect())
    }
}

fn check_monotonic(previous: Option<f64>, current: f64) -> Result<(), DetectError> {
    match previous {
        Some(previous) if current < previous => {
            Err(DetectError::NonMonotonicTimestamp { previous, current })
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [-1,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 127.5 - 1.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchors and decoding
// ---------------------------------------------------------------------------

/// The short-range model uses two feature maps, 16×16 and 8×8, with 2 and 6
/// anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

/// Candidate in normalized [0,1] frame coordinates.
#[derive(Clone, Debug)]
struct RawDet {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
    keypoints: [[f64; 2]; NUM_KEYPOINTS],
}

impl RawDet {
    fn to_detection(&self, frame_width: u32, frame_height: u32) -> Detection {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let x1 = self.x1.clamp(0.0, 1.0);
        let y1 = self.y1.clamp(0.0, 1.0);
        let x2 = self.x2.clamp(0.0, 1.0);
        let y2 = self.y2.clamp(0.0, 1.0);
        Detection {
            bounding_box: BoundingBox {
                origin_x: x1 * fw,
                origin_y: y1 * fh,
                width: (x2 - x1) * fw,
                height: (y2 - y1) * fh,
            },
            keypoints: self
                .keypoints
                .iter()
                .map(|&[x, y]| Keypoint { x, y })
                .collect(),
            categories: vec![Category { score: self.score }],
        }
    }
}

fn decode(reg_data: &[f32], score_data: &[f32], anchors: &[[f32; 2]], confidence: f32) -> Vec<RawDet> {
    let mut raw_dets = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);
    let size = INPUT_SIZE as f32;

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score);
        if score < confidence {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        if offset + REGRESSOR_STRIDE > reg_data.len() {
            break;
        }
        let reg = &reg_data[offset..offset + REGRESSOR_STRIDE];
        let [ax, ay] = anchors[i];

        let cx = ax + reg[0] / size;
        let cy = ay + reg[1] / size;
        let w = reg[2] / size;
        let h = reg[3] / size;

        let mut keypoints = [[0.0f64; 2]; NUM_KEYPOINTS];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            kp[0] = (ax + reg[4 + 2 * k] / size) as f64;
            kp[1] = (ay + reg[5 + 2 * k] / size) as f64;
        }

        raw_dets.push(RawDet {
            x1: (cx - w / 2.0) as f64,
            y1: (cy - h / 2.0) as f64,
            x2: (cx + w / 2.0) as f64,
            y2: (cy + h / 2.0) as f64,
            score: score as f64,
            keypoints,
        });
    }

    raw_dets
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> RawDet {
        RawDet {
            x1,
            y1,
            x2,
            y2,
            score,
            keypoints: [[0.5, 0.5]; NUM_KEYPOINTS],
        }
    }

    #[test]
    fn test_preprocess_shape() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0.0);
        let tensor = preprocess(&frame, 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_range() {
        let white = Frame::new(vec![255u8; 50 * 50 * 3], 50, 50, 3, 0.0);
        let black = Frame::new(vec![0u8; 50 * 50 * 3], 50, 50, 3, 0.0);
        assert_relative_eq!(preprocess(&white, 128)[[0, 0, 0, 0]], 1.0);
        assert_relative_eq!(preprocess(&black, 128)[[0, 2, 5, 5]], -1.0);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 grid × 2 anchors + 8×8 grid × 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_decode_filters_by_confidence_and_reads_keypoints() {
        let anchors = vec![[0.5f32, 0.5f32], [0.25, 0.25]];
        let mut regs = vec![0.0f32; 2 * REGRESSOR_STRIDE];
        // anchor 0: box 64x32 input pixels centred on the anchor
        regs[2] = 64.0;
        regs[3] = 32.0;
        // first keypoint offset +12.8 input px in x → +0.1 normalized
        regs[4] = 12.8;
        let scores = vec![5.0f32, -5.0];

        let dets = decode(&regs, &scores, &anchors, 0.5);
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_relative_eq!(d.x1, 0.25, epsilon = 1e-6);
        assert_relative_eq!(d.x2, 0.75, epsilon = 1e-6);
        assert_relative_eq!(d.y1, 0.375, epsilon = 1e-6);
        assert_relative_eq!(d.keypoints[0][0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(d.keypoints[0][1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_to_detection_uses_source_pixels_for_box_and_normalized_keypoints() {
        let det = raw(0.25, 0.5, 0.75, 1.0, 0.87).to_detection(1280, 720);
        assert_relative_eq!(det.bounding_box.origin_x, 320.0);
        assert_relative_eq!(det.bounding_box.origin_y, 360.0);
        assert_relative_eq!(det.bounding_box.width, 640.0);
        assert_relative_eq!(det.bounding_box.height, 360.0);
        assert_eq!(det.keypoints.len(), NUM_KEYPOINTS);
        assert_relative_eq!(det.keypoints[0].x, 0.5);
        assert_eq!(det.primary_score(), Some(0.87));
    }

    #[test]
    fn test_to_detection_clamps_box_to_frame() {
        let det = raw(-0.1, -0.1, 0.5, 0.5, 0.9).to_detection(100, 100);
        assert_relative_eq!(det.bounding_box.origin_x, 0.0);
        assert_relative_eq!(det.bounding_box.width, 50.0);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let mut dets = vec![raw(0.0, 0.0, 0.5, 0.5, 0.7), raw(0.02, 0.02, 0.52, 0.52, 0.9)];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut dets = vec![raw(0.0, 0.0, 0.2, 0.2, 0.9), raw(0.6, 0.6, 0.8, 0.8, 0.8)];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_monotonic_timestamps() {
        assert!(check_monotonic(None, 5.0).is_ok());
        assert!(check_monotonic(Some(5.0), 5.0).is_ok());
        assert!(check_monotonic(Some(5.0), 6.0).is_ok());
        assert_eq!(
            check_monotonic(Some(6.0), 5.0),
            Err(DetectError::NonMonotonicTimestamp {
                previous: 6.0,
                current: 5.0
            })
        );
    }
}
