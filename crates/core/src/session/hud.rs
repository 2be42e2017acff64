use std::fmt;

use crate::shared::constants::SLOW_LATENCY_MS;

/// Per-iteration readout: detection latency and face count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HudMetrics {
    pub latency_ms: u64,
    pub face_count: usize,
}

impl HudMetrics {
    pub fn new(latency_ms: f64, face_count: usize) -> Self {
        Self {
            latency_ms: latency_ms.max(0.0).round() as u64,
            face_count,
        }
    }

    pub fn is_slow(&self) -> bool {
        self.latency_ms > SLOW_LATENCY_MS
    }

    pub fn latency_text(&self) -> String {
        format!("Latency: {}ms", self.latency_ms)
    }

    pub fn faces_text(&self) -> String {
        format!("Faces: {}", self.face_count)
    }
}

impl fmt::Display for HudMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.latency_text(), self.faces_text())?;
        if self.is_slow() {
            write!(f, "  (slow)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_readout_text() {
        let hud = HudMetrics::new(12.4, 2);
        assert_eq!(hud.latency_text(), "Latency: 12ms");
        assert_eq!(hud.faces_text(), "Faces: 2");
        assert_eq!(hud.to_string(), "Latency: 12ms  Faces: 2");
    }

    #[rstest]
    #[case(50.0, false)]
    #[case(50.4, false)]
    #[case(50.6, true)]
    #[case(120.0, true)]
    fn test_slow_above_fifty_ms(#[case] latency: f64, #[case] slow: bool) {
        assert_eq!(HudMetrics::new(latency, 0).is_slow(), slow);
    }
}
