use crate::shared::frame::Frame;

/// The destination surface the overlay is painted on.
///
/// Pixels are stored in source orientation. `mirrored` is a display
/// attribute: the user sees the buffer flipped horizontally, and
/// [`Surface::displayed`] yields exactly that view.
pub struct Surface {
    frame: Frame,
    mirrored: bool,
}

impl Surface {
    pub fn new(width: u32, height: u32, mirrored: bool) -> Self {
        Self {
            frame: Frame::black(width, height),
            mirrored,
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    /// Reallocates the backing buffer when the size changed. Returns whether
    /// it did; the new buffer is black until the next repaint.
    pub fn resize_if_needed(&mut self, width: u32, height: u32) -> bool {
        if self.frame.width() == width && self.frame.height() == height {
            return false;
        }
        log::debug!(
            "Surface resized {}x{} -> {width}x{height}",
            self.frame.width(),
            self.frame.height()
        );
        self.frame = Frame::black(width, height);
        true
    }

    /// What the user sees: the buffer, flipped when mirrored.
    pub fn displayed(&self) -> Frame {
        if self.mirrored {
            flip_horizontal(&self.frame)
        } else {
            self.frame.clone()
        }
    }
}

/// Surface size for a reported display size. A zero dimension means the
/// display has not been laid out yet, so the source size is used.
pub fn effective_display_size(display: (u32, u32), source: (u32, u32)) -> (u32, u32) {
    if display.0 == 0 || display.1 == 0 {
        source
    } else {
        display
    }
}

pub fn flip_horizontal(frame: &Frame) -> Frame {
    let w = frame.width() as usize;
    let c = frame.channels() as usize;
    let row_len = w * c;
    let mut out = Vec::with_capacity(frame.data().len());
    for row in frame.data().chunks_exact(row_len) {
        for px in row.chunks_exact(c).rev() {
            out.extend_from_slice(px);
        }
    }
    Frame::new(
        out,
        frame.width(),
        frame.height(),
        frame.channels(),
        frame.timestamp_ms(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_resize_if_needed_only_on_change() {
        let mut s = Surface::new(4, 3, false);
        assert!(!s.resize_if_needed(4, 3));
        assert!(s.resize_if_needed(8, 6));
        assert_eq!((s.width(), s.height()), (8, 6));
        assert_eq!(s.frame().data().len(), 8 * 6 * 3);
    }

    #[rstest]
    #[case((0, 0), (1280, 720), (1280, 720))]
    #[case((640, 0), (1280, 720), (1280, 720))]
    #[case((640, 360), (1280, 720), (640, 360))]
    fn test_effective_display_size(
        #[case] display: (u32, u32),
        #[case] source: (u32, u32),
        #[case] expected: (u32, u32),
    ) {
        assert_eq!(effective_display_size(display, source), expected);
    }

    #[test]
    fn test_flip_horizontal_reverses_pixels_per_row() {
        let data = vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
        let f = Frame::new(data, 2, 2, 3, 7.0);
        let flipped = flip_horizontal(&f);
        assert_eq!(flipped.data(), &[2, 2, 2, 1, 1, 1, 4, 4, 4, 3, 3, 3]);
        assert_eq!(flipped.timestamp_ms(), 7.0);
    }

    #[test]
    fn test_displayed_respects_mirroring() {
        let mut s = Surface::new(2, 1, true);
        s.frame_mut().data_mut()[..3].copy_from_slice(&[9, 9, 9]);
        assert_eq!(s.displayed().pixel(1, 0), &[9, 9, 9]);
        s.set_mirrored(false);
        assert_eq!(s.displayed().pixel(0, 0), &[9, 9, 9]);
    }
}
