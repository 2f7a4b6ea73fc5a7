//! Blend a swapped face crop back into the full frame.
//!
//! The crop is warped back through the inverse of its alignment transform
//! together with a white coverage mask. The mask is eroded so the crop's hard
//! border never shows, feathered with a Gaussian, and used as per-pixel alpha
//! between the warped crop and the original frame.
//!
//! All work happens inside the frame rectangle the crop projects onto, grown
//! by the feather radius. Mask values outside that rectangle are zero.

use crate::shared::face_alignment::{sample_bilinear, SimilarityTransform};
use crate::shared::frame::Frame;

/// Warped coverage above this level counts as fully inside the crop.
const WHITE_THRESHOLD: f32 = 20.0;
const MIN_ERODE_SIZE: usize = 10;
const MIN_BLUR_HALF: usize = 5;

/// Axis-aligned pixel rectangle, end-exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Rect {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Rect {
    fn width(&self) -> usize {
        self.x1 - self.x0
    }

    fn height(&self) -> usize {
        self.y1 - self.y0
    }

    fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    fn grow(&self, by: usize, frame_w: usize, frame_h: usize) -> Rect {
        Rect {
            x0: self.x0.saturating_sub(by),
            y0: self.y0.saturating_sub(by),
            x1: (self.x1 + by).min(frame_w),
            y1: (self.y1 + by).min(frame_h),
        }
    }

    fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Paste `face` (an aligned square crop) into `frame`.
///
/// `transform` maps frame coordinates to crop coordinates, as returned by
/// `norm_crop`. Returns `None` when the transform cannot be inverted.
pub fn paste_back(frame: &Frame, face: &Frame, transform: &SimilarityTransform) -> Option<Frame> {
    let inverse = transform.inverse()?;
    let frame_w = frame.width() as usize;
    let frame_h = frame.height() as usize;
    let crop_size = face.width();

    let projected = projected_rect(&inverse, crop_size, frame_w, frame_h);
    if projected.is_empty() {
        return Some(frame.clone());
    }

    let Some(mask_size) = white_extent(transform, crop_size, projected) else {
        return Some(frame.clone());
    };
    let erode_size = (mask_size / 10).max(MIN_ERODE_SIZE);
    let blur_size = 2 * (mask_size / 20).max(MIN_BLUR_HALF) + 1;

    let roi = projected.grow(blur_size / 2 + 1, frame_w, frame_h);
    let (mut mask, fake) = warp_into(transform, face, crop_size, roi);

    erode(&mut mask, roi, erode_size, frame_w, frame_h);
    gaussian_blur(&mut mask, roi, blur_size, frame_w, frame_h);

    let mut out = frame.clone();
    blend(&mut out, &mask, &fake, roi);
    Some(out)
}

/// Frame rectangle covered by the crop, including the bilinear fringe.
fn projected_rect(
    crop_to_frame: &SimilarityTransform,
    crop_size: u32,
    frame_w: usize,
    frame_h: usize,
) -> Rect {
    let s = crop_size as f64;
    let corners = [(-1.0, -1.0), (s, -1.0), (-1.0, s), (s, s)].map(|p| crop_to_frame.apply(p));
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let clamp = |v: f64, hi: usize| v.max(0.0).min(hi as f64) as usize;
    Rect {
        x0: clamp(min_x.floor(), frame_w),
        y0: clamp(min_y.floor(), frame_h),
        x1: clamp(max_x.ceil() + 1.0, frame_w),
        y1: clamp(max_y.ceil() + 1.0, frame_h),
    }
}

/// `sqrt(h · w)` of the bounding box of fully-covered pixels, or `None` if
/// no pixel is fully covered.
fn white_extent(transform: &SimilarityTransform, crop_size: u32, rect: Rect) -> Option<usize> {
    let mut bounds: Option<Rect> = None;
    for y in rect.y0..rect.y1 {
        for x in rect.x0..rect.x1 {
            let (cx, cy) = transform.apply((x as f64, y as f64));
            if coverage(crop_size, cx, cy) > WHITE_THRESHOLD {
                let b = bounds.get_or_insert(Rect { x0: x, y0: y, x1: x, y1: y });
                b.x0 = b.x0.min(x);
                b.x1 = b.x1.max(x);
                b.y0 = b.y0.min(y);
                b.y1 = b.y1.max(y);
            }
        }
    }
    bounds.map(|b| (((b.y1 - b.y0) * (b.x1 - b.x0)) as f64).sqrt() as usize)
}

/// Warp the coverage mask and the face crop into `roi`.
///
/// The mask is thresholded: anything above [`WHITE_THRESHOLD`] becomes 255.
fn warp_into(
    transform: &SimilarityTransform,
    face: &Frame,
    crop_size: u32,
    roi: Rect,
) -> (Vec<f32>, Vec<[f32; 3]>) {
    let len = roi.width() * roi.height();
    let mut mask = Vec::with_capacity(len);
    let mut fake = Vec::with_capacity(len);
    for y in roi.y0..roi.y1 {
        for x in roi.x0..roi.x1 {
            let (cx, cy) = transform.apply((x as f64, y as f64));
            let white = coverage(crop_size, cx, cy);
            mask.push(if white > WHITE_THRESHOLD { 255.0 } else { white });
            fake.push(sample_bilinear(face, cx, cy));
        }
    }
    (mask, fake)
}

/// Bilinear sample of an all-white `size`² image with a black border.
fn coverage(size: u32, x: f64, y: f64) -> f32 {
    let s = size as i64;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;
    let inside = |tx: i64, ty: i64| {
        if tx >= 0 && ty >= 0 && tx < s && ty < s {
            255.0
        } else {
            0.0
        }
    };
    let top = inside(x0, y0) * (1.0 - fx) + inside(x0 + 1, y0) * fx;
    let bottom = inside(x0, y0 + 1) * (1.0 - fx) + inside(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Box erosion with a `size × size` kernel anchored at `size / 2`.
///
/// Taps outside the frame are ignored. Taps inside the frame but outside
/// `roi` read as zero.
fn erode(mask: &mut [f32], roi: Rect, size: usize, frame_w: usize, frame_h: usize) {
    let w = roi.width();
    let h = roi.height();
    let before = (size / 2) as isize;
    let after = size as isize - 1 - before;
    let mut temp = vec![0.0f32; mask.len()];

    for ry in 0..h {
        for rx in 0..w {
            let fx = (roi.x0 + rx) as isize;
            let mut min = f32::INFINITY;
            for tx in (fx - before)..=(fx + after) {
                if tx < 0 || tx >= frame_w as isize {
                    continue;
                }
                let tx = tx as usize;
                let v = if tx >= roi.x0 && tx < roi.x1 {
                    mask[ry * w + (tx - roi.x0)]
                } else {
                    0.0
                };
                min = min.min(v);
            }
            temp[ry * w + rx] = min;
        }
    }

    for ry in 0..h {
        let fy = (roi.y0 + ry) as isize;
        for rx in 0..w {
            let mut min = f32::INFINITY;
            for ty in (fy - before)..=(fy + after) {
                if ty < 0 || ty >= frame_h as isize {
                    continue;
                }
                let ty = ty as usize;
                let v = if ty >= roi.y0 && ty < roi.y1 {
                    temp[(ty - roi.y0) * w + rx]
                } else {
                    0.0
                };
                min = min.min(v);
            }
            mask[ry * w + rx] = min;
        }
    }
}

/// 1D Gaussian kernel of odd `size`, with sigma derived the way OpenCV does
/// when sigma is left at zero.
fn gaussian_kernel_1d(size: usize) -> Vec<f32> {
    debug_assert!(size % 2 == 1);
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as f64;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&v| (v / sum) as f32).collect()
}

/// Reflect an out-of-range coordinate back into `0..len` (gfedcb|abcdefgh|gfedcba).
fn reflect_101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = i;
    while i < 0 || i > last {
        i = if i < 0 { -i } else { 2 * last - i };
    }
    i as usize
}

/// Separable Gaussian blur of the mask over `roi` with frame-edge reflection.
fn gaussian_blur(mask: &mut [f32], roi: Rect, size: usize, frame_w: usize, frame_h: usize) {
    let kernel = gaussian_kernel_1d(size);
    let half = (size / 2) as isize;
    let w = roi.width();
    let h = roi.height();
    let mut temp = vec![0.0f32; mask.len()];

    // Horizontal pass: mask → temp
    for ry in 0..h {
        let fy = roi.y0 + ry;
        for rx in 0..w {
            let fx = (roi.x0 + rx) as isize;
            let mut sum = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let tx = reflect_101(fx + k as isize - half, frame_w);
                if roi.contains(tx, fy) {
                    sum += mask[ry * w + (tx - roi.x0)] * weight;
                }
            }
            temp[ry * w + rx] = sum;
        }
    }

    // Vertical pass: temp → mask
    for ry in 0..h {
        let fy = (roi.y0 + ry) as isize;
        for rx in 0..w {
            let fx = roi.x0 + rx;
            let mut sum = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let ty = reflect_101(fy + k as isize - half, frame_h);
                if roi.contains(fx, ty) {
                    sum += temp[(ty - roi.y0) * w + rx] * weight;
                }
            }
            mask[ry * w + rx] = sum;
        }
    }
}

fn blend(out: &mut Frame, mask: &[f32], fake: &[[f32; 3]], roi: Rect) {
    let frame_w = out.width() as usize;
    let ch = out.channels() as usize;
    let w = roi.width();
    let data = out.data_mut();
    for ry in 0..roi.height() {
        for rx in 0..w {
            let alpha = (mask[ry * w + rx] / 255.0).clamp(0.0, 1.0);
            if alpha <= 0.0 {
                continue;
            }
            let offset = ((roi.y0 + ry) * frame_w + roi.x0 + rx) * ch;
            let px = fake[ry * w + rx];
            for c in 0..3 {
                let original = data[offset + c] as f32;
                let merged = alpha * px[c] + (1.0 - alpha) * original;
                data[offset + c] = merged.clamp(0.0, 255.0) as u8;
            }
        }
    }
}
