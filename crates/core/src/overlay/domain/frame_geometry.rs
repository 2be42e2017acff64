/// Source-to-destination scale for one loop iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameGeometry {
    pub source_width: f64,
    pub source_height: f64,
    pub dest_width: f64,
    pub dest_height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl FrameGeometry {
    /// Returns `None` for a zero-sized source, which has no defined scale.
    pub fn new(source: (u32, u32), dest: (u32, u32)) -> Option<Self> {
        let (sw, sh) = source;
        let (dw, dh) = dest;
        if sw == 0 || sh == 0 {
            return None;
        }
        Some(Self {
            source_width: sw as f64,
            source_height: sh as f64,
            dest_width: dw as f64,
            dest_height: dh as f64,
            scale_x: dw as f64 / sw as f64,
            scale_y: dh as f64 / sh as f64,
        })
    }
}
