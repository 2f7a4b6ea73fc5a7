use std::path::Path;

use crate::analysis::domain::face_analyser::FaceAnalyser;
use crate::frames::domain::image_reader::ImageReader;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::error::SwapError;
use crate::shared::face::Face;

/// Whether `path` has one of the supported image extensions (case-insensitive).
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Read the source image and extract the identity to swap in.
///
/// Fails with [`SwapError::InvalidSource`] for non-image paths and
/// [`SwapError::NoSourceFace`] when no face is found.
pub fn extract_source_face(
    reader: &dyn ImageReader,
    analyser: &dyn FaceAnalyser,
    source_path: &Path,
) -> Result<Face, Box<dyn std::error::Error>> {
    if !is_image_path(source_path) {
        return Err(SwapError::InvalidSource(source_path.to_path_buf()).into());
    }
    let frame = reader.read(source_path, 0)?;
    let face = analyser
        .one_face(&frame)?
        .ok_or_else(|| SwapError::NoSourceFace(source_path.to_path_buf()))?;
    if face.embedding.is_none() {
        return Err(SwapError::MissingEmbedding.into());
    }
    log::info!(
        "Source face found in {} (score {:.2})",
        source_path.display(),
        face.score
    );
    Ok(face)
}
