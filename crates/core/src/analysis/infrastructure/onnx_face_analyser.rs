use std::path::Path;

use crate::analysis::domain::face_analyser::FaceAnalyser;
use crate::analysis::domain::face_detector::FaceDetector;
use crate::analysis::domain::face_embedder::FaceEmbedder;
use crate::analysis::infrastructure::arcface_embedder::ArcFaceEmbedder;
use crate::analysis::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crate::shared::execution_provider::ExecutionProvider;
use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// Face analyser that detects faces and attaches an identity embedding to each.
pub struct OnnxFaceAnalyser {
    detector: Box<dyn FaceDetector>,
    embedder: Box<dyn FaceEmbedder>,
}

impl OnnxFaceAnalyser {
    /// Load the YOLO detector and ArcFace embedder.
    pub fn new(
        detector_path: &Path,
        embedding_path: &Path,
        providers: &[ExecutionProvider],
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        log::info!("Loading face analyser");
        Ok(Self::from_parts(
            Box::new(OnnxYoloDetector::new(detector_path, providers, confidence)?),
            Box::new(ArcFaceEmbedder::new(embedding_path, providers)?),
        ))
    }

    pub fn from_parts(detector: Box<dyn FaceDetector>, embedder: Box<dyn FaceEmbedder>) -> Self {
        Self { detector, embedder }
    }
}

impl FaceAnalyser for OnnxFaceAnalyser {
    fn many_faces(&self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
        let faces = self.detector.detect(frame)?;
        log::debug!("Frame {}: {} face(s) detected", frame.index(), faces.len());
        faces
            .into_iter()
            .map(|face| {
                let embedding = self.embedder.embed(frame, &face.landmarks)?;
                Ok(face.with_embedding(embedding))
            })
            .collect()
    }
}
