//! Optional scale normalization to a target pixel pitch.

use image::imageops::FilterType;
use image::GrayImage;

use super::grid::{detect_grid, GridDetectConfig};

/// Outcome of [`normalize_scale`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScaleNormalization {
    /// Scale factor actually applied (clamped to [0.5, 2.0]).
    pub scale: f64,
    /// Estimated input pitch (px/mm), when a grid was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px_per_mm: Option<f64>,
}

/// Resize the page so the small grid square approaches `target_px_per_mm`.
///
/// The scale is clamped to [0.5, 2.0] to avoid excessive resampling. When
/// no grid pitch can be recovered the image is returned unchanged with a
/// unit scale.
pub fn normalize_scale(
    gray: &GrayImage,
    target_px_per_mm: f64,
    grid_cfg: &GridDetectConfig,
) -> (GrayImage, ScaleNormalization) {
    let cal = detect_grid(gray, grid_cfg);
    let Some(pxmm) = cal.px_per_mm() else {
        return (
            gray.clone(),
            ScaleNormalization {
                scale: 1.0,
                px_per_mm: None,
            },
        );
    };

    let scale = (target_px_per_mm / pxmm).clamp(0.5, 2.0);
    let (w0, h0) = gray.dimensions();
    let w1 = ((w0 as f64 * scale) as u32).max(1);
    let h1 = ((h0 as f64 * scale) as u32).max(1);
    let resized = image::imageops::resize(gray, w1, h1, FilterType::Lanczos3);
    (
        resized,
        ScaleNormalization {
            scale,
            px_per_mm: Some(pxmm),
        },
    )
}
