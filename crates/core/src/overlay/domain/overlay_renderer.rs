use crate::overlay::domain::coordinate_mapper::MappedDetection;
use crate::overlay::domain::surface::Surface;
use crate::shared::frame::Frame;

/// Paints one loop iteration onto the surface.
///
/// Implementations fully repaint: the source frame scaled to the surface,
/// then each detection in order. An empty slice still repaints the frame.
pub trait OverlayRenderer: Send {
    fn render(
        &mut self,
        source: &Frame,
        detections: &[MappedDetection],
        blur_enabled: bool,
        surface: &mut Surface,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
