//! `inswapper_128` face swapper using ONNX Runtime.
//!
//! The model takes the target face aligned to a 128×128 crop and a source
//! latent (the source identity embedding projected through the model's
//! `emap` matrix), and returns the swapped crop.
use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array2, Array4, ArrayViewD};

use crate::shared::error::SwapError;
use crate::shared::execution_provider::{create_session, ExecutionProvider};
use crate::shared::face::{l2_normalize, Face};
use crate::shared::face_alignment::norm_crop;
use crate::shared::frame::Frame;
use crate::swapping::domain::face_swapper::FaceSwapper;
use crate::swapping::domain::paste_back::paste_back;
use crate::swapping::infrastructure::onnx_initializer::read_last_initializer;

/// Fallback crop size when the model input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 128;

pub struct InswapperFaceSwapper {
    session: Mutex<ort::session::Session>,
    emap: Array2<f32>,
    input_size: u32,
}

impl InswapperFaceSwapper {
    pub fn new(
        model_path: &Path,
        providers: &[ExecutionProvider],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        log::info!("Loading face swapper from {}", model_path.display());
        let session = create_session(model_path, providers)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() == 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let init = read_last_initializer(model_path)?;
        let emap = match init.dims.as_slice() {
            &[rows, cols] => Array2::from_shape_vec((rows, cols), init.values)?,
            dims => {
                return Err(SwapError::ModelOutput(format!(
                    "emap initializer '{}' must be 2-D, got {dims:?}",
                    init.name
                ))
                .into())
            }
        };
        log::debug!(
            "Face swapper input size {input_size}, emap {:?}",
            emap.shape()
        );

        Ok(Self {
            session: Mutex::new(session),
            emap,
            input_size,
        })
    }
}

impl FaceSwapper for InswapperFaceSwapper {
    fn swap(
        &self,
        frame: &Frame,
        target: &Face,
        source: &Face,
        paste: bool,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let embedding = source
            .embedding
            .as_deref()
            .ok_or(SwapError::MissingEmbedding)?;
        let latent = source_latent(embedding, &self.emap)?;

        let (aligned, transform) = norm_crop(frame, &target.landmarks, self.input_size)
            .ok_or(SwapError::DegenerateLandmarks)?;
        let target_value = ort::value::Tensor::from_array(preprocess(&aligned))?;
        let latent_value = ort::value::Tensor::from_array(latent)?;

        let fake = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            let outputs = session.run(ort::inputs![target_value, latent_value])?;
            let output = outputs[0].try_extract_array::<f32>()?;
            postprocess(output, frame.index())?
        };

        if !paste {
            return Ok(fake);
        }
        Ok(paste_back(frame, &fake, &transform).ok_or(SwapError::DegenerateLandmarks)?)
    }
}

/// Project the source identity through `emap` and renormalise: `(e · emap) / |e · emap|`.
fn source_latent(embedding: &[f32], emap: &Array2<f32>) -> Result<Array2<f32>, SwapError> {
    if embedding.len() != emap.nrows() {
        return Err(SwapError::ModelOutput(format!(
            "embedding has {} values, emap expects {}",
            embedding.len(),
            emap.nrows()
        )));
    }
    let row = ndarray::ArrayView1::from(embedding);
    let mut latent = row.dot(emap).to_vec();
    l2_normalize(&mut latent);
    let len = latent.len();
    Array2::from_shape_vec((1, len), latent).map_err(|e| SwapError::ModelOutput(e.to_string()))
}

/// Aligned RGB crop → `[1, 3, H, W]` tensor scaled to `[0, 1]`.
fn preprocess(aligned: &Frame) -> Array4<f32> {
    let h = aligned.height() as usize;
    let w = aligned.width() as usize;
    let src = aligned.as_ndarray();
    let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[y, x, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// `[1, 3, H, W]` output in `[0, 1]` → RGB frame.
fn postprocess(output: ArrayViewD<'_, f32>, index: usize) -> Result<Frame, SwapError> {
    let shape = output.shape();
    if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
        return Err(SwapError::ModelOutput(format!(
            "expected swap output [1, 3, H, W], got {shape:?}"
        )));
    }
    let (h, w) = (shape[2], shape[3]);
    let mut data = vec![0u8; h * w * 3];
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                data[(y * w + x) * 3 + c] = (output[[0, c, y, x]] * 255.0).clamp(0.0, 255.0) as u8;
            }
        }
    }
    Ok(Frame::new(data, w as u32, h as u32, 3, index))
}
