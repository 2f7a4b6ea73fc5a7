pub const SWAPPER_MODEL_NAME: &str = "inswapper_128.onnx";
pub const SWAPPER_MODEL_URL: &str =
    "https://huggingface.co/deepinsight/inswapper/resolve/main/inswapper_128.onnx";

pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Cache directory name under the platform cache/data dir.
pub const APP_DIR_NAME: &str = "FaceSwap";
