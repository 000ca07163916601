//! Analysis configuration.
//!
//! Everything tunable lives here so a whole run can be described by one
//! JSON document. All fields carry serde defaults; a partial file only
//! overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::beats::BeatDetector;
use crate::calib::{DeskewConfig, GridDetectConfig};
use crate::criteria::Sex;
use crate::intervals::IntervalConfig;
use crate::layout::PaperLayout;
use crate::lead::{Lead, DEFAULT_ANCHOR_FALLBACK, FRONTAL_LEADS};
use crate::robust::RobustMetric;

/// Full configuration for [`crate::Analyzer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    /// Paper layout to segment with.
    pub layout: PaperLayout,
    /// Lead used for beat detection and interval refinement.
    pub anchor_lead: Lead,
    /// Tried in order when the anchor lead is absent from the layout.
    pub anchor_fallback: Vec<Lead>,
    /// Paper speed in mm/s; 25 on standard strips.
    pub paper_speed_mm_per_s: f64,
    /// Grid pitch assumed when no grid is detected.
    pub default_px_per_mm: f64,
    /// Pitch the page is rescaled to when normalization is on.
    pub target_px_per_mm: f64,
    /// Proportional inset applied inside every lead cell.
    pub margin: f64,
    /// Pixel values at or above this count as paper background.
    pub background_threshold: u8,
    pub deskew: bool,
    pub normalize: bool,
    pub detector: BeatDetector,
    /// Leads contributing to the frontal-axis resultant.
    pub axis_leads: Vec<Lead>,
    pub sex: Sex,
    pub grid: GridDetectConfig,
    pub deskew_cfg: DeskewConfig,
    pub intervals_cfg: IntervalConfig,
    /// MAD z-score for robust interval aggregation.
    pub robust_z: f64,
    pub robust_metric: RobustMetric,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            layout: PaperLayout::ThreeByFour,
            anchor_lead: Lead::II,
            anchor_fallback: DEFAULT_ANCHOR_FALLBACK.to_vec(),
            paper_speed_mm_per_s: 25.0,
            default_px_per_mm: 10.0,
            target_px_per_mm: 10.0,
            margin: 0.02,
            background_threshold: 250,
            deskew: false,
            normalize: false,
            detector: BeatDetector::default(),
            axis_leads: FRONTAL_LEADS.to_vec(),
            sex: Sex::default(),
            grid: GridDetectConfig::default(),
            deskew_cfg: DeskewConfig::default(),
            intervals_cfg: IntervalConfig::default(),
            robust_z: 2.7,
            robust_metric: RobustMetric::default(),
        }
    }
}

impl AnalyzeConfig {
    /// Load from a JSON file; missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_standard_paper() {
        let cfg = AnalyzeConfig::default();
        assert_eq!(cfg.layout, PaperLayout::ThreeByFour);
        assert_eq!(cfg.anchor_lead, Lead::II);
        assert_eq!(cfg.paper_speed_mm_per_s, 25.0);
        assert_eq!(cfg.axis_leads.len(), 6);
        assert_eq!(cfg.anchor_fallback[0], Lead::II);
        assert_eq!(cfg.background_threshold, 250);
    }

    #[test]
    fn partial_json_only_overrides_named_fields() {
        let cfg: AnalyzeConfig =
            serde_json::from_str(r#"{"layout": "6x2", "anchor_lead": "V2", "robust_z": 3.0}"#)
                .unwrap();
        assert_eq!(cfg.layout, PaperLayout::SixByTwo);
        assert_eq!(cfg.anchor_lead, Lead::V2);
        assert_eq!(cfg.robust_z, 3.0);
        // untouched defaults
        assert_eq!(cfg.paper_speed_mm_per_s, 25.0);
        assert_eq!(cfg.margin, 0.02);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = AnalyzeConfig::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let back: AnalyzeConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.layout, cfg.layout);
        assert_eq!(back.anchor_fallback, cfg.anchor_fallback);
        assert_eq!(back.target_px_per_mm, cfg.target_px_per_mm);
    }

    #[test]
    fn unknown_layout_is_rejected() {
        let err = serde_json::from_str::<AnalyzeConfig>(r#"{"layout": "4x3"}"#);
        assert!(err.is_err());
    }
}
