use thiserror::Error;

/// Per-frame failure. None of these is fatal to the process, and a frame
/// that fails never yields an annotated image.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Input bytes are not a decodable image. Tracker state is untouched.
    #[error("failed to decode frame: {0}")]
    DecodeFailure(#[source] image::ImageError),
    #[error("failed to render frame: {0}")]
    RenderFailure(String),
    #[error("failed to encode frame: {0}")]
    EncodeFailure(#[source] image::ImageError),
}

impl FrameError {
    /// Short machine-readable tag for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::DecodeFailure(_) => "decode_failure",
            FrameError::RenderFailure(_) => "render_failure",
            FrameError::EncodeFailure(_) => "encode_failure",
        }
    }
}
