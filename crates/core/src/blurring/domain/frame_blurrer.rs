use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Domain interface for applying blur to boxes within a frame.
///
/// Implementations modify the frame in-place (`&mut Frame`) to avoid allocation.
/// Boxes may extend past the frame; only the part inside is blurred.
pub trait FrameBlurrer: Send {
    fn blur(&self, frame: &mut Frame, boxes: &[BoundingBox])
        -> Result<(), Box<dyn std::error::Error>>;
}
