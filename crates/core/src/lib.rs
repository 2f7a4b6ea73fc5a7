//! Face swapping for still images and extracted video frames.
//!
//! The crate is split into bounded contexts. `analysis` finds faces and their
//! identity embeddings, `swapping` runs the swap model and blends its output
//! back into the frame, `frames` reads and writes image files, and `pipeline`
//! wires them into the image and frame-sequence use cases. `shared` holds the
//! value types and model plumbing used by all of them.

pub mod analysis;
pub mod frames;
pub mod pipeline;
pub mod shared;
pub mod swapping;
