/// Paint parameters for the detection overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub box_color: [u8; 3],
    pub box_stroke_width: f64,
    pub box_corner_radius: f64,
    pub keypoint_color: [u8; 3],
    pub keypoint_radius: i32,
    pub label_color: [u8; 3],
    /// Gap between the label baseline and the box top edge.
    pub label_offset: i32,
    /// Each font cell becomes a `glyph_scale x glyph_scale` block.
    pub glyph_scale: i32,
    pub blur_sigma: f64,
}

/// Emerald, `#34d399`.
pub const EMERALD: [u8; 3] = [0x34, 0xd3, 0x99];
/// Blue, `#60a5fa`.
pub const KEYPOINT_BLUE: [u8; 3] = [0x60, 0xa5, 0xfa];

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: EMERALD,
            box_stroke_width: 3.0,
            box_corner_radius: 8.0,
            keypoint_color: KEYPOINT_BLUE,
            keypoint_radius: 4,
            label_color: EMERALD,
            label_offset: 10,
            glyph_scale: 2,
            blur_sigma: 15.0,
        }
    }
}
