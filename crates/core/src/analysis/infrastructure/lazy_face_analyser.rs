use crate::analysis::domain::face_analyser::FaceAnalyser;
use crate::shared::face::Face;
use crate::shared::frame::Frame;
use crate::shared::lazy_model::{LazyModel, ModelLoader};

/// Decorator that defers loading the analyser models until the first frame.
///
/// One instance is shared by all workers; the underlying models are built at
/// most once.
pub struct LazyFaceAnalyser {
    model: LazyModel<dyn FaceAnalyser>,
    loader: ModelLoader<dyn FaceAnalyser>,
}

impl LazyFaceAnalyser {
    pub fn new(loader: ModelLoader<dyn FaceAnalyser>) -> Self {
        Self {
            model: LazyModel::new(),
            loader,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    fn analyser(&self) -> Result<std::sync::Arc<dyn FaceAnalyser>, Box<dyn std::error::Error>> {
        self.model.get_or_try_init(|| (self.loader)())
    }
}

impl FaceAnalyser for LazyFaceAnalyser {
    fn many_faces(&self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
        self.analyser()?.many_faces(frame)
    }

    fn one_face(&self, frame: &Frame) -> Result<Option<Face>, Box<dyn std::error::Error>> {
        self.analyser()?.one_face(frame)
    }
}
