use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// Finds faces in a decoded frame.
///
/// `many_faces` returns every face; `one_face` picks a single representative
/// face, the left-most one, so that repeated calls on similar frames select
/// the same person.
pub trait FaceAnalyser: Send + Sync {
    fn many_faces(&self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>>;

    fn one_face(&self, frame: &Frame) -> Result<Option<Face>, Box<dyn std::error::Error>> {
        Ok(leftmost(self.many_faces(frame)?))
    }
}

/// The face whose box starts furthest left, if any.
pub fn leftmost(faces: Vec<Face>) -> Option<Face> {
    faces.into_iter().min_by(|a, b| {
        a.bbox
            .x1
            .partial_cmp(&b.bbox.x1)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}
