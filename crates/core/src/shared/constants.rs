/// BlazeFace short-range model file looked up in the model cache.
pub const BLAZEFACE_MODEL_NAME: &str = "blaze_face_short_range.onnx";

pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MIN_SUPPRESSION_THRESHOLD: f64 = 0.3;

/// Requested camera resolution.
pub const DEFAULT_CAMERA_WIDTH: u32 = 1280;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 720;

/// Surface tap rate for recordings.
pub const RECORDING_FPS: u32 = 30;

/// HUD latency readout is flagged slow above this many milliseconds.
pub const SLOW_LATENCY_MS: u64 = 50;

/// Banners auto-dismiss after this many milliseconds.
pub const NOTICE_TTL_MS: u64 = 5000;

pub const SNAPSHOT_PURPOSE: &str = "face-detect-snap";
pub const RECORDING_PURPOSE: &str = "face-record";

pub const SETTINGS_FILENAME: &str = "settings.json";
