use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Normalized 1D Gaussian weights, applied along rows and then columns.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    weights: Vec<f32>,
    sigma: f64,
}

impl GaussianKernel {
    /// Even sizes are bumped to the next odd size. A `sigma` of zero or less
    /// is derived from the size the way OpenCV does it.
    pub fn new(size: usize, sigma: f64) -> Self {
        let size = size.max(1) | 1;
        let sigma = if sigma > 0.0 { sigma } else { sigma_for_size(size) };
        let half = (size / 2) as f64;

        let raw: Vec<f64> = (0..size)
            .map(|i| {
                let d = i as f64 - half;
                (-d * d / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let total: f64 = raw.iter().sum();

        Self {
            weights: raw.iter().map(|w| (w / total) as f32).collect(),
            sigma,
        }
    }

    pub fn size(&self) -> usize {
        self.weights.len()
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    fn radius(&self) -> usize {
        self.weights.len() / 2
    }
}

fn sigma_for_size(size: usize) -> f64 {
    0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Mirror `pos` into `0..len` without repeating the edge pixel
/// (`gfedcb|abcdefgh|gfedcba`). Large overshoots fold repeatedly.
fn reflect_101(mut pos: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    while pos < 0 || pos >= len {
        pos = if pos < 0 { -pos } else { 2 * len - pos - 2 };
    }
    pos as usize
}

/// Source offset for every tap position `-radius..len + radius`.
fn tap_table(len: usize, radius: usize) -> Vec<usize> {
    let r = radius as isize;
    (-r..len as isize + r).map(|p| reflect_101(p, len)).collect()
}

/// Buffers reused across regions so blurring many boxes allocates once.
#[derive(Debug, Default)]
pub struct BlurScratch {
    horizontal: Vec<f32>,
    col_taps: Vec<usize>,
    row_taps: Vec<usize>,
}

/// Blur the part of `frame` covered by `region`, in place.
///
/// The region is clipped to the frame first. Only pixels inside it are read,
/// so the blurred area never picks up color from outside the box. Returns
/// false when nothing of the region lies in the frame.
pub fn blur_region(
    frame: &mut Frame,
    region: &BoundingBox,
    kernel: &GaussianKernel,
    scratch: &mut BlurScratch,
) -> bool {
    let Some(clipped) = region.clamp_to(frame.width(), frame.height()) else {
        return false;
    };
    if kernel.size() == 1 {
        return true;
    }

    let stride = frame.width() as usize;
    let channels = frame.channels() as usize;
    let (x0, y0) = (clipped.x1() as usize, clipped.y1() as usize);
    let (w, h) = (clipped.width() as usize, clipped.height() as usize);
    let weights = kernel.weights();

    scratch.col_taps = tap_table(w, kernel.radius());
    scratch.row_taps = tap_table(h, kernel.radius());
    scratch.horizontal.clear();
    scratch.horizontal.resize(w * h * channels, 0.0);

    let data = frame.data_mut();

    for row in 0..h {
        let src = &data[((y0 + row) * stride + x0) * channels..][..w * channels];
        let dst = &mut scratch.horizontal[row * w * channels..][..w * channels];
        for x in 0..w {
            let taps = &scratch.col_taps[x..x + weights.len()];
            for c in 0..channels {
                dst[x * channels + c] = taps
                    .iter()
                    .zip(weights)
                    .map(|(&sx, &wt)| src[sx * channels + c] as f32 * wt)
                    .sum();
            }
        }
    }

    for row in 0..h {
        let taps = &scratch.row_taps[row..row + weights.len()];
        let dst = &mut data[((y0 + row) * stride + x0) * channels..][..w * channels];
        for (i, out) in dst.iter_mut().enumerate() {
            let v: f32 = taps
                .iter()
                .zip(weights)
                .map(|(&sy, &wt)| scratch.horizontal[sy * w * channels + i] * wt)
                .sum();
            *out = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    true
}
