use crate::shared::face::FaceLandmarks;
use crate::shared::frame::Frame;

/// Computes an L2-normalised identity embedding for the face at `landmarks`.
pub trait FaceEmbedder: Send + Sync {
    fn embed(
        &self,
        frame: &Frame,
        landmarks: &FaceLandmarks,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
