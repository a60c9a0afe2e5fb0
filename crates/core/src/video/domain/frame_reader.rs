/// One still image of a stream, not yet decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Position in the stream, starting at 0.
    pub index: usize,
    /// Display name, used for reports and output file names.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Reads the frames of a stream in order.
///
/// Implementations handle I/O details while the pipeline works with the
/// abstract `EncodedFrame`.
pub trait FrameReader: Send {
    /// Number of frames the reader will yield.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over frames in stream order. A frame that cannot
    /// be read yields an error without ending the stream.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<EncodedFrame, Box<dyn std::error::Error>>> + '_>;
}
