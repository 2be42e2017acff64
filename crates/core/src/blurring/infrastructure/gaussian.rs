/// Separable Gaussian kernel with a precomputed reduced-resolution variant.
///
/// Large kernels run on a downscaled copy of the ROI (area-average down,
/// bilinear up), which is indistinguishable at face-blur strengths and
/// keeps per-frame cost flat as the radius grows.
pub struct GaussianKernel {
    taps: Vec<f32>,
    small_taps: Vec<f32>,
    scale: usize,
}

impl GaussianKernel {
    /// Kernel for a CSS-style `blur(<sigma>px)` filter.
    pub fn for_sigma(sigma: f64) -> Self {
        Self::with_size(kernel_size_for_sigma(sigma))
    }

    pub fn with_size(kernel_size: usize) -> Self {
        let kernel_size = kernel_size.max(1) | 1;
        let scale = (kernel_size / 30).max(1);
        let small_size = (kernel_size / scale) | 1;
        Self {
            taps: kernel_1d(kernel_size),
            small_taps: kernel_1d(small_size),
            scale,
        }
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Pixels sampled on each side of the centre tap.
    pub fn half_width(&self) -> usize {
        self.taps.len() / 2
    }

    /// Blur a tightly packed `w x h` buffer in place.
    pub fn blur(&self, data: &mut [u8], w: usize, h: usize, channels: usize, temp: &mut Vec<f32>) {
        if self.scale <= 1 || w < self.scale * 2 || h < self.scale * 2 {
            blur_with_taps(data, w, h, channels, &self.taps, temp);
            return;
        }
        let (mut small, sw, sh) = downscale(data, w, h, channels, self.scale);
        blur_with_taps(&mut small, sw, sh, channels, &self.small_taps, temp);
        let restored = upscale(&small, sw, sh, channels, w, h);
        data[..w * h * channels].copy_from_slice(&restored);
    }
}

/// Odd kernel size spanning ±3σ.
pub fn kernel_size_for_sigma(sigma: f64) -> usize {
    if sigma <= 0.0 {
        return 1;
    }
    ((sigma * 6.0).round() as usize) | 1
}

/// Normalized 1D Gaussian with sigma `kernel_size / 6`.
fn kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let weights: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&v| (v / sum) as f32).collect()
}

/// Horizontal then vertical pass with edge replication.
fn blur_with_taps(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    taps: &[f32],
    temp: &mut Vec<f32>,
) {
    if taps.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = (taps.len() / 2) as isize;
    temp.resize(width * height * channels, 0.0);

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in taps.iter().enumerate() {
                    let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                    sum += data[(y * width + sx) * channels + c] as f32 * w;
                }
                temp[(y * width + x) * channels + c] = sum;
            }
        }
    }

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in taps.iter().enumerate() {
                    let sy =
                        (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                    sum += temp[(sy * width + x) * channels + c] * w;
                }
                data[(y * width + x) * channels + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Area-average downscale by an integer factor.
fn downscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    scale: usize,
) -> (Vec<u8>, usize, usize) {
    let new_w = width / scale;
    let new_h = height / scale;
    let mut out = vec![0u8; new_w * new_h * channels];

    for y in 0..new_h {
        for x in 0..new_w {
            for c in 0..channels {
                let mut sum = 0u32;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let idx = ((y * scale + dy) * width + x * scale + dx) * channels + c;
                        sum += data[idx] as u32;
                    }
                }
                out[(y * new_w + x) * channels + c] = (sum / (scale * scale) as u32) as u8;
            }
        }
    }

    (out, new_w, new_h)
}

/// Bilinear upscale to `target_w x target_h`.
fn upscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    target_w: usize,
    target_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; target_w * target_h * channels];
    let sx_ratio = (width as f32 - 1.0) / (target_w as f32 - 1.0).max(1.0);
    let sy_ratio = (height as f32 - 1.0) / (target_h as f32 - 1.0).max(1.0);

    for y in 0..target_h {
        let src_y = y as f32 * sy_ratio;
        let y0 = (src_y.floor() as usize).min(height - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fy = src_y - y0 as f32;
        for x in 0..target_w {
            let src_x = x as f32 * sx_ratio;
            let x0 = (src_x.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let fx = src_x - x0 as f32;

            for c in 0..channels {
                let at = |yy: usize, xx: usize| data[(yy * width + xx) * channels + c] as f32;
                let top = at(y0, x0) * (1.0 - fx) + at(y0, x1) * fx;
                let bottom = at(y1, x0) * (1.0 - fx) + at(y1, x1) * fx;
                let val = top * (1.0 - fy) + bottom * fy;
                out[(y * target_w + x) * channels + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}
