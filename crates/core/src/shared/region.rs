/// An integer pixel rectangle on a destination surface.
///
/// Built from floating-point mapped boxes by covering every pixel the box
/// touches, so a clip never loses a partially covered edge column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest integer rectangle covering the float box `(x, y, w, h)`.
    pub fn covering(x: f64, y: f64, w: f64, h: f64) -> Self {
        let x1 = x.floor() as i32;
        let y1 = y.floor() as i32;
        let x2 = (x + w).ceil() as i32;
        let y2 = (y + h).ceil() as i32;
        Self::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Intersection with the `width x height` frame, or `None` when the
    /// region lies entirely outside it.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        let clamped = Region::new(x1, y1, x2 - x1, y2 - y1);
        (!clamped.is_empty()).then_some(clamped)
    }

    /// Grows the region by `margin` pixels on every side.
    pub fn expanded(&self, margin: i32) -> Region {
        Region::new(
            self.x - margin,
            self.y - margin,
            self.width + 2 * margin,
            self.height + 2 * margin,
        )
    }
}
