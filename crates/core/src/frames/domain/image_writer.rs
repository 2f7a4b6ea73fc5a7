use std::path::Path;

use crate::shared::frame::Frame;

/// Encodes a frame to an image file.
pub trait ImageWriter: Send + Sync {
    /// Write `frame` to `path`, replacing any existing file. The format
    /// follows the path's extension.
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}
