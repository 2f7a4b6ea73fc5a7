use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Returns boxes, scores and landmarks; embeddings are left empty.
/// Shared between worker threads, hence `&self`.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>>;
}
