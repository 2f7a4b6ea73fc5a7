/// YOLO-pose face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, confidence filtering, NMS and
/// decoding of the five facial keypoints the swap alignment needs.
use std::path::Path;
use std::sync::Mutex;

use crate::analysis::domain::face_detector::FaceDetector;
use crate::shared::execution_provider::{create_session, ExecutionProvider};
use crate::shared::face::{BoundingBox, Face, FaceLandmarks};
use crate::shared::frame::Frame;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of keypoint values per detection (5 landmarks × x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: Mutex<ort::session::Session>,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO-pose ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(
        model_path: &Path,
        providers: &[ExecutionProvider],
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = create_session(model_path, providers)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);
        log::debug!("Face detector input size: {input_size}");

        Ok(Self {
            session: Mutex::new(session),
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let (shape, data) = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            let outputs = session.run(ort::inputs![input_value])?;
            if outputs.len() == 0 {
                return Err("YOLO model produced no outputs".into());
            }
            let tensor = outputs[0].try_extract_array::<f32>()?;
            let shape = tensor.shape().to_vec();
            let data: Vec<f32> = tensor.iter().copied().collect();
            (shape, data)
        };

        let raw = parse_detections(&shape, &data, self.confidence, scale, pad_x, pad_y)?;
        let kept = nms(raw, NMS_IOU_THRESH);
        Ok(kept.into_iter().map(|d| to_face(d, frame)).collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`. An empty frame gives
/// an all-padding tensor.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    // Padding is 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    if src_w == 0 || src_h == 0 {
        return (tensor, 1.0, 0, 0);
    }

    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let src = frame.as_ndarray();

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    bbox: BoundingBox,
    confidence: f64,
    keypoints: [(f64, f64); 5],
}

/// Decode `[1, features, detections]` or `[1, detections, features]` output.
///
/// Row layout: `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]` in letterbox
/// pixels. Rows without keypoints cannot be aligned and are dropped.
fn parse_detections(
    shape: &[usize],
    data: &[f32],
    confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output has {} values, expected {}",
            data.len(),
            num_dets * num_feats
        )
        .into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };
    let unletterbox_x = |x: f64| (x - pad_x as f64) / scale;
    let unletterbox_y = |y: f64| (y - pad_y as f64) / scale;

    let mut dets = Vec::new();
    if num_feats < 5 + NUM_KEYPOINT_VALUES {
        log::warn!("Face detector output has no keypoints ({num_feats} features per row)");
        return Ok(dets);
    }

    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));

        let mut keypoints = [(0.0f64, 0.0f64); 5];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            *kp = (
                unletterbox_x(value(i, 5 + k * 3)),
                unletterbox_y(value(i, 5 + k * 3 + 1)),
            );
        }

        dets.push(RawDetection {
            bbox: BoundingBox::new(
                unletterbox_x(cx - w / 2.0),
                unletterbox_y(cy - h / 2.0),
                unletterbox_x(cx + w / 2.0),
                unletterbox_y(cy + h / 2.0),
            ),
            confidence: conf,
            keypoints,
        });
    }
    Ok(dets)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(mut dets: Vec<RawDetection>, iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets {
        if keep.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_thresh) {
            keep.push(det);
        }
    }
    keep
}

fn to_face(det: RawDetection, frame: &Frame) -> Face {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let bbox = BoundingBox::new(
        det.bbox.x1.clamp(0.0, fw),
        det.bbox.y1.clamp(0.0, fh),
        det.bbox.x2.clamp(0.0, fw),
        det.bbox.y2.clamp(0.0, fh),
    );
    // Landmarks stay unclamped: alignment extrapolates off-frame points fine.
    Face::new(bbox, det.confidence, FaceLandmarks::new(det.keypoints))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
