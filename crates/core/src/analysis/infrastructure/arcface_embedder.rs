//! ArcFace identity embedder using ONNX Runtime.
//!
//! Aligns the face onto the 112×112 ArcFace template, normalises to
//! `[-1, 1]` and returns the L2-normalised embedding the swap model consumes
//! as the source identity.
use std::path::Path;
use std::sync::Mutex;

use crate::analysis::domain::face_embedder::FaceEmbedder;
use crate::shared::error::SwapError;
use crate::shared::execution_provider::{create_session, ExecutionProvider};
use crate::shared::face::{l2_normalize, FaceLandmarks};
use crate::shared::face_alignment::norm_crop;
use crate::shared::frame::Frame;

const INPUT_SIZE: u32 = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct ArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
}

impl ArcFaceEmbedder {
    pub fn new(
        model_path: &Path,
        providers: &[ExecutionProvider],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: Mutex::new(create_session(model_path, providers)?),
        })
    }
}

impl FaceEmbedder for ArcFaceEmbedder {
    fn embed(
        &self,
        frame: &Frame,
        landmarks: &FaceLandmarks,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let (aligned, _) =
            norm_crop(frame, landmarks, INPUT_SIZE).ok_or(SwapError::DegenerateLandmarks)?;
        let tensor = preprocess(&aligned);
        let input_value = ort::value::Tensor::from_array(tensor)?;

        let mut embedding = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            let outputs = session.run(ort::inputs![input_value])?;
            let embedding_array = outputs[0].try_extract_array::<f32>()?;
            embedding_array.iter().copied().collect::<Vec<f32>>()
        };

        if embedding.is_empty() {
            return Err(SwapError::ModelOutput("empty embedding".into()).into());
        }
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Aligned RGB crop → normalised NCHW tensor.
fn preprocess(aligned: &Frame) -> ndarray::Array4<f32> {
    let size = INPUT_SIZE as usize;
    let src = aligned.as_ndarray();
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[y, x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}
