use std::path::Path;

/// Writes one encoded output frame to an image file.
pub trait ImageWriter: Send {
    fn write(&self, path: &Path, encoded: &[u8]) -> Result<(), Box<dyn std::error::Error>>;
}
