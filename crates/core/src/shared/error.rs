use std::path::PathBuf;

use thiserror::Error;

/// Failures of the swap pipeline itself, as opposed to I/O or model runtime errors.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("source must be an image file, got {0}")]
    InvalidSource(PathBuf),
    #[error("no face detected in source image {0}")]
    NoSourceFace(PathBuf),
    #[error("source face has no identity embedding")]
    MissingEmbedding,
    #[error("face landmarks are degenerate, cannot align")]
    DegenerateLandmarks,
    #[error("unexpected model output: {0}")]
    ModelOutput(String),
}
