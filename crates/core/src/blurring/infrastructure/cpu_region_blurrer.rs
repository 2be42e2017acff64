use std::cell::RefCell;

use crate::blurring::domain::frame_blurrer::FrameBlurrer;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::gaussian::GaussianKernel;

/// Overlay blur radius in pixels, matching a `blur(15px)` canvas filter.
pub const DEFAULT_BLUR_SIGMA: f64 = 15.0;

/// CPU Gaussian blur restricted to a clip rectangle.
pub struct CpuRegionBlurrer {
    kernel: GaussianKernel,
    roi_buf: RefCell<Vec<u8>>,
    blur_temp: RefCell<Vec<f32>>,
}

impl CpuRegionBlurrer {
    pub fn new(sigma: f64) -> Self {
        Self {
            kernel: GaussianKernel::for_sigma(sigma),
            roi_buf: RefCell::new(Vec::new()),
            blur_temp: RefCell::new(Vec::new()),
        }
    }
}

impl Default for CpuRegionBlurrer {
    fn default() -> Self {
        Self::new(DEFAULT_BLUR_SIGMA)
    }
}

impl FrameBlurrer for CpuRegionBlurrer {
    fn blur_into(
        &self,
        source: &Frame,
        target: &mut Frame,
        clip: &Region,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if source.width() != target.width()
            || source.height() != target.height()
            || source.channels() != target.channels()
        {
            return Err(format!(
                "blur source {}x{} does not match target {}x{}",
                source.width(),
                source.height(),
                target.width(),
                target.height()
            )
            .into());
        }
        let (fw, fh) = (source.width(), source.height());
        let Some(clip) = clip.clamped(fw, fh) else {
            return Ok(());
        };
        let Some(sample) = clip.expanded(self.kernel.half_width() as i32).clamped(fw, fh) else {
            return Ok(());
        };

        let channels = source.channels() as usize;
        let frame_w = fw as usize;
        let (sx, sy, sw, sh) = (
            sample.x as usize,
            sample.y as usize,
            sample.width as usize,
            sample.height as usize,
        );

        let mut roi = self.roi_buf.borrow_mut();
        roi.resize(sw * sh * channels, 0);
        let src = source.data();
        for row in 0..sh {
            let from = ((sy + row) * frame_w + sx) * channels;
            roi[row * sw * channels..(row + 1) * sw * channels]
                .copy_from_slice(&src[from..from + sw * channels]);
        }

        let mut temp = self.blur_temp.borrow_mut();
        self.kernel.blur(&mut roi, sw, sh, channels, &mut temp);

        // Only the clip portion of the blurred sample lands in the target.
        let dst = target.data_mut();
        let off_x = clip.x as usize - sx;
        let off_y = clip.y as usize - sy;
        let cw = clip.width as usize;
        for row in 0..clip.height as usize {
            let from = ((off_y + row) * sw + off_x) * channels;
            let to = ((clip.y as usize + row) * frame_w + clip.x as usize) * channels;
            dst[to..to + cw * channels].copy_from_slice(&roi[from..from + cw * channels]);
        }

        Ok(())
    }
}
