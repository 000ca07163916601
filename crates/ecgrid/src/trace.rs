//! 2D lead crop to 1D waveform: darkest-pixel centerline and smoothing.
//!
//! The centerline model is intentionally simple: ink is assumed to be the
//! darkest pixel in each column. Blank columns still produce a value (the
//! argmin of a flat column), so a blank crop yields a flat trace rather
//! than an error.

use image::GrayImage;

/// Per-column ink row positions for one lead crop, origin at the top.
pub type Trace = Vec<f64>;

/// Extract the darkest-row centerline within a central vertical band.
///
/// `band` is the fraction of crop height searched around the middle
/// (default 0.8); rows outside it are ignored so printed labels and grid
/// annotations near the edges do not capture the argmin.
pub fn extract_centerline(crop: &GrayImage, band: f64) -> Trace {
    let (w, h) = crop.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let cy0 = (((1.0 - band) * 0.5) * h as f64) as u32;
    let cy1 = h - cy0;
    let mut trace = Vec::with_capacity(w as usize);
    for x in 0..w {
        let mut best_y = cy0;
        let mut best_v = u8::MAX;
        for y in cy0..cy1 {
            let v = crop.get_pixel(x, y)[0];
            if v < best_v {
                best_v = v;
                best_y = y;
            }
        }
        trace.push(best_y as f64);
    }
    trace
}

/// Centered moving average with an odd window, same-length output.
///
/// The window is forced odd and to at least 3; edges average over the
/// actual overlap, so a constant trace stays constant end to end.
pub fn smooth(trace: &[f64], window: usize) -> Trace {
    let win = window.max(3) | 1;
    let half = win / 2;
    let n = trace.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let sum: f64 = trace[lo..hi].iter().sum();
        out.push(sum / (hi - lo) as f64);
    }
    out
}

/// Median of a slice; `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Baseline-centered, sign-inverted view: `-(y - median(y))`.
///
/// Upward QRS deflections (low row indices in image coordinates) become
/// positive amplitudes.
pub fn inverted_baseline(trace: &[f64]) -> Trace {
    let med = median(trace).unwrap_or(0.0);
    trace.iter().map(|y| -(y - med)).collect()
}
