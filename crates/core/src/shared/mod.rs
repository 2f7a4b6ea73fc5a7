pub mod constants;
pub mod error;
pub mod execution_provider;
pub mod face;
pub mod face_alignment;
pub mod frame;
pub mod lazy_model;
pub mod model_resolver;
