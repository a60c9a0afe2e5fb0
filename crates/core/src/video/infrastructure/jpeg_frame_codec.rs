use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::shared::error::FrameError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_codec::FrameCodec;

pub const DEFAULT_JPEG_QUALITY: u8 = 60;

/// Decodes any format the `image` crate understands and encodes JPEG.
pub struct JpegFrameCodec {
    quality: u8,
}

impl JpegFrameCodec {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameCodec for JpegFrameCodec {
    fn decode(&self, bytes: &[u8], index: usize) -> Result<Frame, FrameError> {
        let image = image::load_from_memory(bytes).map_err(FrameError::DecodeFailure)?;
        Ok(Frame::from_rgb_image(image.to_rgb8(), index))
    }

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, FrameError> {
        let color = match frame.channels() {
            1 => ExtendedColorType::L8,
            _ => ExtendedColorType::Rgb8,
        };
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(frame.data(), frame.width(), frame.height(), color)
            .map_err(FrameError::EncodeFailure)?;
        Ok(out)
    }
}
