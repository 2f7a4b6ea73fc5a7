//! Similarity alignment of faces onto the ArcFace 5-point template.
//!
//! Both the identity embedder (112 px) and the swap model (128 px) expect a
//! face crop whose landmarks sit on the same canonical template, so crops are
//! produced by estimating a similarity transform from detected landmarks to
//! the template and warping the frame through it.

use crate::shared::face::FaceLandmarks;
use crate::shared::frame::Frame;

/// ArcFace landmark template for a 112×112 crop.
const ARCFACE_TEMPLATE: [(f64, f64); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// 2D similarity transform (uniform scale, rotation, translation):
///
/// ```text
/// x' = a·x − b·y + tx
/// y' = b·x + a·y + ty
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityTransform {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
}

impl SimilarityTransform {
    pub const IDENTITY: SimilarityTransform = SimilarityTransform {
        a: 1.0,
        b: 0.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Least-squares similarity mapping `src` points onto `dst` points.
    ///
    /// Returns `None` when the source points are degenerate (all coincident).
    pub fn estimate(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Self> {
        let n = src.len().min(dst.len());
        if n == 0 {
            return None;
        }
        let mean = |pts: &[(f64, f64)]| {
            let (sx, sy) = pts[..n]
                .iter()
                .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
            (sx / n as f64, sy / n as f64)
        };
        let (msx, msy) = mean(src);
        let (mdx, mdy) = mean(dst);

        let mut norm = 0.0;
        let mut dot = 0.0;
        let mut cross = 0.0;
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()).take(n) {
            let (px, py) = (sx - msx, sy - msy);
            let (qx, qy) = (dx - mdx, dy - mdy);
            norm += px * px + py * py;
            dot += px * qx + py * qy;
            cross += px * qy - py * qx;
        }
        if norm <= f64::EPSILON {
            return None;
        }

        let a = dot / norm;
        let b = cross / norm;
        Some(Self {
            a,
            b,
            tx: mdx - (a * msx - b * msy),
            ty: mdy - (b * msx + a * msy),
        })
    }

    pub fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.a + self.b * self.b;
        if det <= f64::EPSILON {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

/// ArcFace template scaled for a square crop of `image_size` pixels.
///
/// Sizes divisible by 112 scale the template directly; sizes divisible by 128
/// scale by `size / 128` and shift right by `8 · ratio`.
pub fn arcface_template(image_size: u32) -> [(f64, f64); 5] {
    let (ratio, diff_x) = if image_size % 112 == 0 {
        (image_size as f64 / 112.0, 0.0)
    } else {
        let ratio = image_size as f64 / 128.0;
        (ratio, 8.0 * ratio)
    };
    ARCFACE_TEMPLATE.map(|(x, y)| (x * ratio + diff_x, y * ratio))
}

/// Transform taking frame coordinates to crop coordinates for `landmarks`.
pub fn estimate_norm(landmarks: &FaceLandmarks, image_size: u32) -> Option<SimilarityTransform> {
    SimilarityTransform::estimate(landmarks.points(), &arcface_template(image_size))
}

/// Crop an aligned `image_size`² face and return it with the frame→crop transform.
pub fn norm_crop(
    frame: &Frame,
    landmarks: &FaceLandmarks,
    image_size: u32,
) -> Option<(Frame, SimilarityTransform)> {
    let transform = estimate_norm(landmarks, image_size)?;
    let crop = warp_affine(frame, &transform, image_size, image_size)?;
    Some((crop, transform))
}

/// Warp `src` through `transform` (source → destination) into a new
/// `out_w × out_h` RGB frame. Pixels sampled outside the source are black.
pub fn warp_affine(
    src: &Frame,
    transform: &SimilarityTransform,
    out_w: u32,
    out_h: u32,
) -> Option<Frame> {
    let inverse = transform.inverse()?;
    let mut out = Frame::blank(out_w, out_h, src.index());
    let ow = out_w as usize;
    let data = out.data_mut();
    for y in 0..out_h as usize {
        for x in 0..ow {
            let (sx, sy) = inverse.apply((x as f64, y as f64));
            let px = sample_bilinear(src, sx, sy);
            let offset = (y * ow + x) * 3;
            for c in 0..3 {
                data[offset + c] = px[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Some(out)
}

/// Bilinear RGB sample at sub-pixel `(x, y)`; out-of-bounds taps read as 0.
pub fn sample_bilinear(frame: &Frame, x: f64, y: f64) -> [f32; 3] {
    let w = frame.width() as i64;
    let h = frame.height() as i64;
    let ch = frame.channels() as usize;
    let data = frame.data();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return [0.0; 3];
    }
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let tap = |tx: i64, ty: i64, c: usize| -> f32 {
        if tx < 0 || ty < 0 || tx >= w || ty >= h {
            0.0
        } else {
            data[(ty as usize * w as usize + tx as usize) * ch + c] as f32
        }
    };

    let mut out = [0.0f32; 3];
    for (c, v) in out.iter_mut().enumerate() {
        let top = tap(x0, y0, c) * (1.0 - fx) + tap(x0 + 1, y0, c) * fx;
        let bottom = tap(x0, y0 + 1, c) * (1.0 - fx) + tap(x0 + 1, y0 + 1, c) * fx;
        *v = top * (1.0 - fy) + bottom * fy;
    }
    out
}
