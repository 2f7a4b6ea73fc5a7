use std::sync::Arc;

use crate::analysis::domain::face_analyser::FaceAnalyser;
use crate::analysis::infrastructure::lazy_face_analyser::LazyFaceAnalyser;
use crate::analysis::infrastructure::onnx_face_analyser::OnnxFaceAnalyser;
use crate::analysis::infrastructure::onnx_yolo_detector::DEFAULT_CONFIDENCE;
use crate::pipeline::frame_executor::FrameExecutor;
use crate::pipeline::infrastructure::sequential_frame_executor::SequentialFrameExecutor;
use crate::pipeline::infrastructure::threaded_frame_executor::ThreadedFrameExecutor;
use crate::shared::execution_provider::{preferred_execution_providers, ExecutionProvider};
use crate::shared::model_resolver::ModelPaths;
use crate::swapping::domain::face_swapper::FaceSwapper;
use crate::swapping::infrastructure::inswapper_face_swapper::InswapperFaceSwapper;
use crate::swapping::infrastructure::lazy_face_swapper::LazyFaceSwapper;

/// Run-wide options for a swap.
#[derive(Clone, Debug, PartialEq)]
pub struct SwapSettings {
    /// Swap every detected face instead of only the left-most one.
    pub many_faces: bool,
    /// ONNX Runtime backends in priority order.
    pub execution_providers: Vec<ExecutionProvider>,
    /// Worker threads for frame sequences.
    pub execution_threads: usize,
    /// Minimum detector score for a face to count.
    pub confidence: f64,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            many_faces: false,
            execution_providers: preferred_execution_providers(),
            execution_threads: default_execution_threads(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl SwapSettings {
    /// Sequential for a single thread, threaded otherwise.
    pub fn frame_executor(&self) -> Box<dyn FrameExecutor> {
        if self.execution_threads <= 1 {
            Box::new(SequentialFrameExecutor::new())
        } else {
            Box::new(ThreadedFrameExecutor::new(self.execution_threads))
        }
    }

    /// Face analyser whose models load on first use.
    pub fn lazy_analyser(&self, models: &ModelPaths) -> Arc<LazyFaceAnalyser> {
        let detector = models.detector.clone();
        let embedding = models.embedding.clone();
        let providers = self.execution_providers.clone();
        let confidence = self.confidence;
        Arc::new(LazyFaceAnalyser::new(Box::new(
            move || -> Result<Arc<dyn FaceAnalyser>, Box<dyn std::error::Error>> {
                Ok(Arc::new(OnnxFaceAnalyser::new(
                    &detector, &embedding, &providers, confidence,
                )?))
            },
        )))
    }

    /// Face swapper whose model loads on the first swap.
    pub fn lazy_swapper(&self, models: &ModelPaths) -> Arc<LazyFaceSwapper> {
        let swapper = models.swapper.clone();
        let providers = self.execution_providers.clone();
        Arc::new(LazyFaceSwapper::new(Box::new(
            move || -> Result<Arc<dyn FaceSwapper>, Box<dyn std::error::Error>> {
                Ok(Arc::new(InswapperFaceSwapper::new(&swapper, &providers)?))
            },
        )))
    }
}

pub fn default_execution_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
