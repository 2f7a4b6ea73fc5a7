use std::sync::Arc;

use crate::shared::face::Face;
use crate::shared::frame::Frame;
use crate::shared::lazy_model::{LazyModel, ModelLoader};
use crate::swapping::domain::face_swapper::FaceSwapper;

/// Process-wide swap model handle.
///
/// The model is loaded under a lock on the first swap and every worker that
/// shares this instance reuses the same session afterwards.
pub struct LazyFaceSwapper {
    model: LazyModel<dyn FaceSwapper>,
    loader: ModelLoader<dyn FaceSwapper>,
}

impl LazyFaceSwapper {
    pub fn new(loader: ModelLoader<dyn FaceSwapper>) -> Self {
        Self {
            model: LazyModel::new(),
            loader,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    fn load(&self) -> Result<Arc<dyn FaceSwapper>, Box<dyn std::error::Error>> {
        self.model.get_or_try_init(|| (self.loader)())
    }
}

impl FaceSwapper for LazyFaceSwapper {
    fn swap(
        &self,
        frame: &Frame,
        target: &Face,
        source: &Face,
        paste_back: bool,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        self.load()?.swap(frame, target, source, paste_back)
    }
}
