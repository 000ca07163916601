//! Grid-pitch recovery from the printed millimeter grid.
//!
//! The absolute first-difference projection of a gridded page is periodic
//! with the grid pitch. Its normalized autocorrelation therefore peaks at
//! the pitch; the dominant peak in a plausible lag range gives the small
//! (1 mm) square spacing, and the big square is five small squares.

use image::GrayImage;

use super::{abs_diff_projection_x, abs_diff_projection_y, trim_border};

/// Configuration for grid-pitch detection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridDetectConfig {
    /// Minimum candidate pitch (pixels).
    pub min_period_px: usize,
    /// Maximum candidate pitch (pixels).
    pub max_period_px: usize,
    /// Fraction of the image trimmed on each side before projection.
    pub border_trim: f64,
    /// Minimum normalized autocorrelation height for a peak to qualify.
    pub min_peak: f64,
}

impl Default for GridDetectConfig {
    fn default() -> Self {
        Self {
            min_period_px: 4,
            max_period_px: 200,
            border_trim: 0.02,
            min_peak: 0.05,
        }
    }
}

/// Pixel pitch of the paper grid, per axis, with a [0, 1] confidence.
///
/// Axes are independent: a skewed or anisotropically scanned page can
/// resolve one direction and miss the other. Missing fields mean the
/// autocorrelation produced no usable peak for that axis.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GridCalibration {
    /// Small (1 mm) square pitch along x, pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px_small_x: Option<f64>,
    /// Small (1 mm) square pitch along y, pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px_small_y: Option<f64>,
    /// Large (5 mm) square pitch along x, pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px_big_x: Option<f64>,
    /// Large (5 mm) square pitch along y, pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px_big_y: Option<f64>,
    /// Mean normalized autocorrelation peak height over both axes.
    pub confidence: f64,
}

impl GridCalibration {
    /// Horizontal pixels per millimeter, preferring x over y.
    pub fn px_per_mm(&self) -> Option<f64> {
        self.px_small_x.or(self.px_small_y)
    }

    /// Vertical pixels per millimeter, preferring y over x.
    pub fn px_per_mm_vertical(&self) -> Option<f64> {
        self.px_small_y.or(self.px_small_x)
    }

    /// Sampling-rate proxy: pixels per second of recorded signal.
    ///
    /// Returns `None` when no pitch was recovered; the pipeline then
    /// substitutes its configured default pitch.
    pub fn pixels_per_second(&self, paper_speed_mm_per_s: f64) -> Option<f64> {
        self.px_per_mm().map(|p| p * paper_speed_mm_per_s)
    }
}

/// Normalized autocorrelation of `x` for lags `0..=max_lag`.
///
/// The input is standardized (mean removed, unit variance with a small
/// epsilon guard) and the result divided by the zero-lag value.
fn autocorr(x: &[f64], max_lag: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let mean = x.iter().sum::<f64>() / n as f64;
    let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let std = var.sqrt() + 1e-6;
    let z: Vec<f64> = x.iter().map(|v| (v - mean) / std).collect();

    let max_lag = max_lag.min(n.saturating_sub(1));
    let mut ac = Vec::with_capacity(max_lag + 1);
    for lag in 0..=max_lag {
        let mut acc = 0.0;
        for i in 0..n - lag {
            acc += z[i] * z[i + lag];
        }
        ac.push(acc);
    }
    let norm = ac[0] + 1e-6;
    for v in &mut ac {
        *v /= norm;
    }
    ac
}

/// Best autocorrelation peak in `[min_p, max_p]`: `(period, height)`.
///
/// Peaks below `min_peak` do not qualify; a flat (e.g. blank-page)
/// autocorrelation yields `None`.
fn dominant_period(ac: &[f64], min_p: usize, max_p: usize, min_peak: f64) -> Option<(usize, f64)> {
    if ac.len() <= min_p {
        return None;
    }
    let hi = max_p.min(ac.len() - 1);
    let mut best = (min_p, ac[min_p]);
    for p in min_p..=hi {
        if ac[p] > best.1 {
            best = (p, ac[p]);
        }
    }
    (best.1 >= min_peak).then_some(best)
}

/// Estimate the paper grid pitch along both axes.
///
/// Never fails: an image with no detectable grid yields `None` pitches and
/// a confidence near zero.
pub fn detect_grid(gray: &GrayImage, config: &GridDetectConfig) -> GridCalibration {
    let roi = trim_border(gray, config.border_trim);
    let proj_x = abs_diff_projection_x(&roi);
    let proj_y = abs_diff_projection_y(&roi);

    let mut cal = GridCalibration::default();
    let mut conf_x = 0.0;
    let mut conf_y = 0.0;

    if !proj_x.is_empty() {
        let ac = autocorr(&proj_x, config.max_period_px);
        if let Some((p, c)) =
            dominant_period(&ac, config.min_period_px, config.max_period_px, config.min_peak)
        {
            cal.px_small_x = Some(p as f64);
            cal.px_big_x = Some(p as f64 * 5.0);
            conf_x = c;
        }
    }
    if !proj_y.is_empty() {
        let ac = autocorr(&proj_y, config.max_period_px);
        if let Some((p, c)) =
            dominant_period(&ac, config.min_period_px, config.max_period_px, config.min_peak)
        {
            cal.px_small_y = Some(p as f64);
            cal.px_big_y = Some(p as f64 * 5.0);
            conf_y = c;
        }
    }
    cal.confidence = 0.5 * (conf_x + conf_y);
    cal
}
