use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// Replaces the identity of one target face with the source identity.
pub trait FaceSwapper: Send + Sync {
    /// Swap `target` in `frame` to look like `source`.
    ///
    /// With `paste_back` the result is the whole frame with the swapped face
    /// blended in; otherwise it is the aligned swapped crop alone. `frame` is
    /// never modified.
    fn swap(
        &self,
        frame: &Frame,
        target: &Face,
        source: &Face,
        paste_back: bool,
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}
