use crate::shared::error::FrameError;
use crate::shared::frame::Frame;

/// Converts between encoded image bytes and decoded RGB frames.
pub trait FrameCodec: Send {
    /// Decode `bytes` into an RGB frame carrying `index`.
    fn decode(&self, bytes: &[u8], index: usize) -> Result<Frame, FrameError>;

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, FrameError>;
}
