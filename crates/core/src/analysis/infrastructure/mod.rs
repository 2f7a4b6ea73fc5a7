pub mod arcface_embedder;
pub mod lazy_face_analyser;
pub mod onnx_face_analyser;
pub mod onnx_yolo_detector;
