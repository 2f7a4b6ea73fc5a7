use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes a still image or an extracted video frame into an RGB [`Frame`].
pub trait ImageReader: Send + Sync {
    /// Read the image at `path`, tagging the frame with `index`.
    fn read(&self, path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>>;
}
