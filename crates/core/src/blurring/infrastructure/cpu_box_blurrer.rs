use std::cell::RefCell;

use crate::blurring::domain::frame_blurrer::FrameBlurrer;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::gaussian::{self, BlurScratch, GaussianKernel};

/// CPU blurrer that applies a separable Gaussian blur to the rectangle of
/// each box, clipped to the frame.
///
/// Each box is blurred independently, so overlapping boxes are blurred twice
/// where they meet.
pub struct CpuBoxBlurrer {
    kernel: GaussianKernel,
    scratch: RefCell<BlurScratch>,
}

impl CpuBoxBlurrer {
    /// Even kernel sizes are bumped to the next odd size. A non-positive
    /// `sigma` is derived from the kernel size.
    pub fn new(kernel_size: usize, sigma: f64) -> Self {
        Self {
            kernel: GaussianKernel::new(kernel_size, sigma),
            scratch: RefCell::new(BlurScratch::default()),
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel.size()
    }

    pub fn sigma(&self) -> f64 {
        self.kernel.sigma()
    }
}

impl FrameBlurrer for CpuBoxBlurrer {
    fn blur(
        &self,
        frame: &mut Frame,
        boxes: &[BoundingBox],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut scratch = self.scratch.borrow_mut();
        for bbox in boxes {
            if !gaussian::blur_region(frame, bbox, &self.kernel, &mut scratch) {
                log::trace!("Box {bbox:?} lies outside frame {}", frame.index());
            }
        }
        Ok(())
    }
}
