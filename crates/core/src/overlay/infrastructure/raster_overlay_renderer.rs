use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::draw_filled_circle_mut;

use crate::blurring::domain::frame_blurrer::FrameBlurrer;
use crate::blurring::infrastructure::cpu_region_blurrer::CpuRegionBlurrer;
use crate::overlay::domain::coordinate_mapper::{DestRect, MappedDetection};
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::overlay::domain::overlay_style::OverlayStyle;
use crate::overlay::domain::surface::Surface;
use crate::overlay::infrastructure::glyphs;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// CPU rasterizer for the detection overlay.
///
/// Keeps the scaled background of the current iteration so the blur pass
/// samples the clean frame rather than strokes drawn for earlier faces.
pub struct RasterOverlayRenderer {
    style: OverlayStyle,
    blurrer: Box<dyn FrameBlurrer>,
    background: Frame,
}

impl RasterOverlayRenderer {
    pub fn new(style: OverlayStyle, blurrer: Box<dyn FrameBlurrer>) -> Self {
        Self {
            style,
            blurrer,
            background: Frame::black(0, 0),
        }
    }

    fn paint_background(&mut self, source: &Frame, width: u32, height: u32) -> Result<(), String> {
        if source.channels() != 3 {
            return Err(format!(
                "Expected an RGB source frame, got {} channels",
                source.channels()
            ));
        }
        let data = if source.width() == width && source.height() == height {
            source.data().to_vec()
        } else {
            let view =
                ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(source.width(), source.height(), source.data())
                    .ok_or("Source frame buffer is smaller than its dimensions")?;
            imageops::resize(&view, width, height, FilterType::Triangle).into_raw()
        };
        self.background = Frame::new(data, width, height, 3, source.timestamp_ms());
        Ok(())
    }

    fn stroke_box(&self, frame: &mut Frame, rect: &DestRect) {
        stroke_rounded_rect(
            frame,
            rect,
            self.style.box_corner_radius,
            self.style.box_stroke_width,
            self.style.box_color,
        );
    }

    fn draw_keypoints(&self, frame: &mut Frame, detection: &MappedDetection) -> Result<(), String> {
        if detection.keypoints.is_empty() {
            return Ok(());
        }
        let (w, h) = (frame.width(), frame.height());
        let mut canvas = ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(w, h, frame.data_mut())
            .ok_or("Surface buffer is smaller than its dimensions")?;
        for kp in &detection.keypoints {
            draw_filled_circle_mut(
                &mut canvas,
                (kp.x.round() as i32, kp.y.round() as i32),
                self.style.keypoint_radius,
                Rgb(self.style.keypoint_color),
            );
        }
        Ok(())
    }

    /// Label sits `label_offset` pixels above the box top. On a mirrored
    /// surface it is anchored to the box's right edge in buffer space, which
    /// is its left edge on screen.
    fn draw_label(&self, frame: &mut Frame, rect: &DestRect, label: &str, mirrored: bool) {
        let scale = self.style.glyph_scale;
        let tw = glyphs::text_width(label, scale);
        let top = rect.y.round() as i32 - self.style.label_offset - glyphs::text_height(scale);
        let x = if mirrored {
            (rect.x + rect.w).round() as i32 - tw
        } else {
            rect.x.round() as i32
        };
        glyphs::draw_text(frame, x, top, label, scale, self.style.label_color, mirrored);
    }
}

impl Default for RasterOverlayRenderer {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self::new(style, Box::new(CpuRegionBlurrer::new(style.blur_sigma)))
    }
}

impl OverlayRenderer for RasterOverlayRenderer {
    fn render(
        &mut self,
        source: &Frame,
        detections: &[MappedDetection],
        blur_enabled: bool,
        surface: &mut Surface,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (w, h) = (surface.width(), surface.height());
        self.paint_background(source, w, h)?;
        let mirrored = surface.is_mirrored();
        let frame = surface.frame_mut();
        frame.data_mut().copy_from_slice(self.background.data());
        frame.set_timestamp_ms(source.timestamp_ms());

        for detection in detections {
            let rect = &detection.rect;
            if blur_enabled {
                let clip = Region::covering(rect.x, rect.y, rect.w, rect.h);
                self.blurrer.blur_into(&self.background, frame, &clip)?;
            }
            self.stroke_box(frame, rect);
            self.draw_keypoints(frame, detection)?;
            if let Some(label) = &detection.label {
                self.draw_label(frame, rect, label, mirrored);
            }
        }
        Ok(())
    }
}

/// Strokes the outline of a rounded rectangle, centred on its edge, using a
/// signed distance test at each pixel centre.
fn stroke_rounded_rect(frame: &mut Frame, rect: &DestRect, radius: f64, stroke: f64, color: [u8; 3]) {
    if rect.w <= 0.0 || rect.h <= 0.0 {
        return;
    }
    let half_stroke = stroke / 2.0;
    let hx = rect.w / 2.0;
    let hy = rect.h / 2.0;
    let cx = rect.x + hx;
    let cy = rect.y + hy;
    let r = radius.min(hx).min(hy);

    let Some(bounds) = Region::covering(rect.x, rect.y, rect.w, rect.h)
        .expanded(half_stroke.ceil() as i32 + 1)
        .clamped(frame.width(), frame.height())
    else {
        return;
    };

    let fw = frame.width() as usize;
    let c = frame.channels() as usize;
    let data = frame.data_mut();
    for py in bounds.y..bounds.bottom() {
        for px in bounds.x..bounds.right() {
            let d = rounded_rect_distance(px as f64 + 0.5 - cx, py as f64 + 0.5 - cy, hx, hy, r);
            if d.abs() <= half_stroke {
                let offset = (py as usize * fw + px as usize) * c;
                data[offset..offset + 3].copy_from_slice(&color);
            }
        }
    }
}

/// Signed distance from `(x, y)` (relative to the centre) to a rounded
/// rectangle with half extents `(hx, hy)` and corner radius `r`.
fn rounded_rect_distance(x: f64, y: f64, hx: f64, hy: f64, r: f64) -> f64 {
    let qx = x.abs() - hx + r;
    let qy = y.abs() - hy + r;
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    outside + qx.max(qy).min(0.0) - r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::domain::coordinate_mapper::DestPoint;
    use crate::overlay::domain::overlay_style::{EMERALD, KEYPOINT_BLUE};
    use approx::assert_relative_eq;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> Frame {
        let data = (0..w * h).flat_map(|_| rgb).collect();
        Frame::new(data, w, h, 3, 42.0)
    }

    fn striped(w: u32, h: u32) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for _y in 0..h {
            for x in 0..w {
                let v = if x % 2 == 0 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(data, w, h, 3, 0.0)
    }

    fn mapped(x: f64, y: f64, w: f64, h: f64, label: Option<&str>) -> MappedDetection {
        MappedDetection {
            rect: DestRect { x, y, w, h },
            keypoints: vec![],
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_detections_repaint_scaled_frame() {
        let mut r = RasterOverlayRenderer::default();
        let mut surface = Surface::new(8, 6, false);
        surface.frame_mut().data_mut().fill(200);
        let source = solid(16, 12, [10, 20, 30]);
        r.render(&source, &[], false, &mut surface).unwrap();
        assert!(surface
            .frame()
            .data()
            .chunks_exact(3)
            .all(|p| p == [10, 20, 30]));
        assert_eq!(surface.frame().timestamp_ms(), 42.0);
    }

    #[test]
    fn test_box_is_stroked_on_edges_not_inside() {
        let mut r = RasterOverlayRenderer::default();
        let mut surface = Surface::new(100, 100, false);
        let source = solid(100, 100, [0, 0, 0]);
        r.render(&source, &[mapped(20.0, 40.0, 50.0, 40.0, None)], false, &mut surface)
            .unwrap();
        let f = surface.frame();
        // Middle of the top edge.
        assert_eq!(f.pixel(45, 40), &EMERALD);
        // Middle of the left edge.
        assert_eq!(f.pixel(20, 60), &EMERALD);
        assert_eq!(f.pixel(45, 60), &[0, 0, 0]);
        // Corner is rounded off.
        assert_eq!(f.pixel(20, 40), &[0, 0, 0]);
    }

    #[test]
    fn test_keypoints_are_filled_circles() {
        let mut r = RasterOverlayRenderer::default();
        let mut surface = Surface::new(64, 64, false);
        let source = solid(64, 64, [0, 0, 0]);
        let mut det = mapped(5.0, 5.0, 50.0, 50.0, None);
        det.keypoints = vec![DestPoint { x: 30.0, y: 30.0 }];
        r.render(&source, &[det], false, &mut surface).unwrap();
        let f = surface.frame();
        assert_eq!(f.pixel(30, 30), &KEYPOINT_BLUE);
        assert_eq!(f.pixel(33, 30), &KEYPOINT_BLUE);
        assert_eq!(f.pixel(36, 30), &[0, 0, 0]);
    }

    #[test]
    fn test_blur_only_inside_box_when_enabled() {
        let mut r = RasterOverlayRenderer::new(
            OverlayStyle {
                blur_sigma: 2.0,
                ..OverlayStyle::default()
            },
            Box::new(CpuRegionBlurrer::new(2.0)),
        );
        let source = striped(80, 80);
        let det = [mapped(20.0, 20.0, 40.0, 40.0, None)];

        let mut plain = Surface::new(80, 80, false);
        r.render(&source, &det, false, &mut plain).unwrap();
        assert_eq!(plain.frame().pixel(40, 40), &[0, 0, 0]);

        let mut blurred = Surface::new(80, 80, false);
        r.render(&source, &det, true, &mut blurred).unwrap();
        let mid = blurred.frame().pixel(40, 40)[0];
        assert!((100..=155).contains(&mid), "expected mid-grey, got {mid}");
        assert_eq!(blurred.frame().pixel(5, 5), plain.frame().pixel(5, 5));
        assert_eq!(blurred.frame().pixel(6, 5), &[0, 0, 0]);
    }

    #[test]
    fn test_label_drawn_above_box() {
        let mut r = RasterOverlayRenderer::default();
        let mut surface = Surface::new(100, 100, false);
        let source = solid(100, 100, [0, 0, 0]);
        r.render(&source, &[mapped(20.0, 50.0, 40.0, 30.0, Some("87%"))], false, &mut surface)
            .unwrap();
        let f = surface.frame();
        let lit_rows: Vec<u32> = (0..100)
            .filter(|&y| (20..54).any(|x| f.pixel(x, y) == EMERALD))
            .collect();
        // Label occupies rows 26..40; the box stroke starts near row 48.
        assert!(lit_rows.iter().any(|&y| (26..40).contains(&y)));
        assert!(!lit_rows.iter().any(|&y| (40..47).contains(&y)));
    }

    #[test]
    fn test_label_anchors_to_screen_left_when_mirrored() {
        let mut r = RasterOverlayRenderer::default();
        let mut surface = Surface::new(100, 100, true);
        let source = solid(100, 100, [0, 0, 0]);
        r.render(&source, &[mapped(20.0, 50.0, 40.0, 30.0, Some("87%"))], false, &mut surface)
            .unwrap();
        let f = surface.frame();
        let label_cols: Vec<u32> = (0..100)
            .filter(|&x| (26..40).any(|y| f.pixel(x, y) == EMERALD))
            .collect();
        // Buffer-space span is [60 - 34, 60).
        assert!(label_cols.iter().all(|&x| (26..60).contains(&x)));
    }

    #[test]
    fn test_rejects_non_rgb_source() {
        let mut r = RasterOverlayRenderer::default();
        let mut surface = Surface::new(4, 4, false);
        let source = Frame::new(vec![0; 4 * 4 * 4], 4, 4, 4, 0.0);
        assert!(r.render(&source, &[], false, &mut surface).is_err());
    }

    #[test]
    fn test_rounded_rect_distance_signs() {
        assert!(rounded_rect_distance(0.0, 0.0, 10.0, 5.0, 2.0) < 0.0);
        assert_relative_eq!(rounded_rect_distance(10.0, 0.0, 10.0, 5.0, 2.0), 0.0);
        assert!(rounded_rect_distance(20.0, 0.0, 10.0, 5.0, 2.0) > 0.0);
    }
}
