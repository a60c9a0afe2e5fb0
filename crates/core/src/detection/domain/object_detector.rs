use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionClass {
    Face,
    Document,
}

/// One box as reported by a detector, in the coordinates of the frame it
/// was given. Confidence is already at or above the detector's threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class: DetectionClass,
}

impl RawDetection {
    /// True when every coordinate and the confidence are finite numbers.
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2, self.confidence]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Domain interface for an opaque object detector.
///
/// Implementations may hold inference sessions that need exclusive access,
/// hence `&mut self`.
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>>;

    /// Name used in log messages.
    fn name(&self) -> &str;
}
