use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detection::domain::detector_options::Delegate;
use crate::shared::constants::{
    DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DEFAULT_MIN_DETECTION_CONFIDENCE,
    DEFAULT_MIN_SUPPRESSION_THRESHOLD, SETTINGS_FILENAME,
};

/// Persisted user preferences. Every field has a default so partial files
/// written by older versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Capture device or media path. `None` picks the platform default camera.
    pub device: Option<String>,
    /// ffmpeg input format, e.g. `video4linux2`.
    pub input_format: Option<String>,
    pub camera_width: u32,
    pub camera_height: u32,
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    pub mirror: bool,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub confidence: f64,
    pub suppression_threshold: f64,
    pub delegate: Delegate,
    pub blur_on_start: bool,
    pub refresh_hz: u32,
    pub output_dir: Option<PathBuf>,
    pub hud_interval: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: None,
            input_format: None,
            camera_width: DEFAULT_CAMERA_WIDTH,
            camera_height: DEFAULT_CAMERA_HEIGHT,
            display_width: None,
            display_height: None,
            mirror: true,
            model_path: None,
            model_url: None,
            confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            suppression_threshold: DEFAULT_MIN_SUPPRESSION_THRESHOLD,
            delegate: Delegate::Gpu,
            blur_on_start: false,
            refresh_hz: 60,
            output_dir: None,
            hud_interval: 30,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("facecam").join(SETTINGS_FILENAME))
    }

    /// Loads from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// A missing or unreadable file yields defaults; a malformed one is
    /// logged and also yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring malformed settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, r#"{"confidence": 0.7, "delegate": "cpu"}"#).unwrap();
        let s = Settings::load_from(&path);
        assert_eq!(s.confidence, 0.7);
        assert_eq!(s.delegate, Delegate::Cpu);
        assert_eq!(s.camera_width, DEFAULT_CAMERA_WIDTH);
        assert!(s.mirror);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILENAME);
        let s = Settings {
            blur_on_start: true,
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..Settings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
    }
}
