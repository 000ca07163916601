//! Paper calibration: grid pitch, scan skew, content bounding box, scale.
//!
//! Everything here is a heuristic over intensity projections. Failure to
//! find a grid or any content is a degraded mode, not an error: the
//! calibration carries `None` fields and a low confidence, and callers
//! fall back to a disclosed default pitch.

pub(crate) mod bbox;
pub(crate) mod deskew;
pub(crate) mod grid;
pub(crate) mod normalize;

pub use bbox::{find_content_bbox, ContentBBox};
pub use deskew::{estimate_skew, rotate_image, DeskewConfig, SkewEstimate};
pub use grid::{detect_grid, GridCalibration, GridDetectConfig};
pub use normalize::{normalize_scale, ScaleNormalization};

use image::GrayImage;

/// Mean absolute horizontal-difference projection, one value per column gap.
///
/// Output length is `w - 1`; empty for degenerate images.
pub(crate) fn abs_diff_projection_x(gray: &GrayImage) -> Vec<f64> {
    let (w, h) = gray.dimensions();
    if w < 2 || h == 0 {
        return Vec::new();
    }
    let mut proj = vec![0.0f64; (w - 1) as usize];
    for y in 0..h {
        for x in 0..w - 1 {
            let a = gray.get_pixel(x, y)[0] as f64;
            let b = gray.get_pixel(x + 1, y)[0] as f64;
            proj[x as usize] += (b - a).abs();
        }
    }
    let inv = 1.0 / h as f64;
    for v in &mut proj {
        *v *= inv;
    }
    proj
}

/// Mean absolute vertical-difference projection, one value per row gap.
pub(crate) fn abs_diff_projection_y(gray: &GrayImage) -> Vec<f64> {
    let (w, h) = gray.dimensions();
    if h < 2 || w == 0 {
        return Vec::new();
    }
    let mut proj = vec![0.0f64; (h - 1) as usize];
    for y in 0..h - 1 {
        let mut acc = 0.0;
        for x in 0..w {
            let a = gray.get_pixel(x, y)[0] as f64;
            let b = gray.get_pixel(x, y + 1)[0] as f64;
            acc += (b - a).abs();
        }
        proj[y as usize] = acc / w as f64;
    }
    proj
}

/// Crop a view of `gray` with a proportional border trimmed on every side.
pub(crate) fn trim_border(gray: &GrayImage, frac: f64) -> GrayImage {
    let (w, h) = gray.dimensions();
    let x0 = (frac * w as f64) as u32;
    let y0 = (frac * h as f64) as u32;
    let x1 = w.saturating_sub(x0);
    let y1 = h.saturating_sub(y0);
    if x1 <= x0 || y1 <= y0 {
        return gray.clone();
    }
    image::imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image()
}
