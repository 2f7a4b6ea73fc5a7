pub mod inswapper_face_swapper;
pub mod lazy_face_swapper;
pub mod onnx_initializer;
