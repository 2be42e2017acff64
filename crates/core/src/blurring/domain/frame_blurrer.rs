use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for clipped blur.
///
/// Redraws `source` blurred into `target`, touching only pixels inside
/// `clip`. Both frames share dimensions. Pixels near the clip edge sample
/// `source` outside the clip, as a filter applied before clipping would.
pub trait FrameBlurrer: Send {
    fn blur_into(
        &self,
        source: &Frame,
        target: &mut Frame,
        clip: &Region,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
