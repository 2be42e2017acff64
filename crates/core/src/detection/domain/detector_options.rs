use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    BLAZEFACE_MODEL_NAME, DEFAULT_MIN_DETECTION_CONFIDENCE, DEFAULT_MIN_SUPPRESSION_THRESHOLD,
};
use crate::shared::model_resolver::ModelLocation;

/// Acceleration preference for the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    Gpu,
    Cpu,
}

impl std::fmt::Display for Delegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delegate::Gpu => write!(f, "GPU"),
            Delegate::Cpu => write!(f, "CPU"),
        }
    }
}

/// Streaming (timestamps must advance) or independent single-shot calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunningMode {
    Video,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    pub model: ModelLocation,
    pub min_detection_confidence: f64,
    pub min_suppression_threshold: f64,
    pub delegate: Delegate,
    pub running_mode: RunningMode,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            model: ModelLocation {
                name: BLAZEFACE_MODEL_NAME.to_string(),
                ..ModelLocation::default()
            },
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            min_suppression_threshold: DEFAULT_MIN_SUPPRESSION_THRESHOLD,
            delegate: Delegate::Gpu,
            running_mode: RunningMode::Video,
        }
    }
}

impl DetectorOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {}",
                self.min_detection_confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.min_suppression_threshold) {
            return Err(format!(
                "Suppression threshold must be between 0.0 and 1.0, got {}",
                self.min_suppression_threshold
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let opts = DetectorOptions::default();
        assert_eq!(opts.min_detection_confidence, 0.5);
        assert_eq!(opts.min_suppression_threshold, 0.3);
        assert_eq!(opts.delegate, Delegate::Gpu);
        assert_eq!(opts.running_mode, RunningMode::Video);
        assert_eq!(opts.model.name, BLAZEFACE_MODEL_NAME);
        assert!(opts.validate().is_ok());
    }

    #[rstest]
    #[case(-0.1, 0.3)]
    #[case(1.5, 0.3)]
    #[case(0.5, 1.01)]
    fn test_validate_rejects_out_of_range(#[case] confidence: f64, #[case] suppression: f64) {
        let opts = DetectorOptions {
            min_detection_confidence: confidence,
            min_suppression_threshold: suppression,
            ..DetectorOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_delegate_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Delegate::Gpu).unwrap(), "\"gpu\"");
        let d: Delegate = serde_json::from_str("\"cpu\"").unwrap();
        assert_eq!(d, Delegate::Cpu);
    }
}
