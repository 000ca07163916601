//! Scan skew estimation by brute-force grid-alignment search.
//!
//! A gridded page rotated into alignment concentrates gradient energy in
//! a few projection bins, so the variance of the row/column gradient
//! projections is a cheap alignment score. The search is a deterministic
//! sweep over a fixed angular range; each candidate is independent.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use super::{abs_diff_projection_x, abs_diff_projection_y};

/// Configuration for skew search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeskewConfig {
    /// Half-width of the angular search range (degrees).
    pub max_angle_deg: f64,
    /// Search step (degrees).
    pub step_deg: f64,
}

impl Default for DeskewConfig {
    fn default() -> Self {
        Self {
            max_angle_deg: 6.0,
            step_deg: 0.5,
        }
    }
}

/// Result of the skew search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SkewEstimate {
    /// Best angle found (degrees); 0.0 when no candidate beat the input.
    pub angle_deg: f64,
    /// Alignment score at the best angle.
    pub score: f64,
    /// Alignment score of the unrotated image.
    pub score_unrotated: f64,
}

/// Variance of a slice.
fn variance(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / x.len() as f64
}

/// Grid-alignment score: variance of both gradient projections.
fn alignment_score(gray: &GrayImage) -> f64 {
    let sx = abs_diff_projection_x(gray);
    let sy = abs_diff_projection_y(gray);
    variance(&sx) + variance(&sy)
}

/// Rotate the page about its center, bilinear, white background fill.
pub fn rotate_image(gray: &GrayImage, angle_deg: f64) -> GrayImage {
    rotate_about_center(
        gray,
        (angle_deg.to_radians()) as f32,
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

/// Relative margin a candidate must beat the unrotated score by.
/// Resampling noise can nudge a candidate a hair above a blank or
/// already-aligned baseline; genuine corrections score far higher.
const MIN_SCORE_GAIN: f64 = 0.05;

/// Brute-force skew estimate over `[-max_angle, +max_angle]`.
///
/// Returns 0.0 degrees unless some rotated candidate beats the
/// unrotated baseline by a real margin.
pub fn estimate_skew(gray: &GrayImage, config: &DeskewConfig) -> SkewEstimate {
    let score0 = alignment_score(gray);
    let accept = score0.max(1.0) * (1.0 + MIN_SCORE_GAIN);
    let mut best_angle = 0.0f64;
    let mut best_score = score0;

    let steps = (2.0 * config.max_angle_deg / config.step_deg).round() as i64 + 1;
    for k in 0..steps {
        let angle = -config.max_angle_deg + k as f64 * config.step_deg;
        if angle.abs() < 1e-6 {
            continue;
        }
        let rotated = rotate_image(gray, angle);
        let score = alignment_score(&rotated);
        if score > accept && score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }

    SkewEstimate {
        angle_deg: best_angle,
        score: best_score,
        score_unrotated: score0,
    }
}
