//! End-to-end page analysis.
//!
//! [`Analyzer`] wraps an [`AnalyzeConfig`] and runs the full chain on a
//! grayscale page: optional deskew and scale normalization, grid
//! calibration, content cropping, lead segmentation, anchor-lead beat
//! detection, interval refinement with robust aggregation, then the
//! axis, block, and hypertrophy estimators. Degraded inputs produce a
//! result with fallback flags; only caller mistakes return errors.

use std::collections::BTreeMap;

use image::imageops;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::axis::{frontal_axis, net_qrs_amplitude, AxisEstimate, LeadAmplitude};
use crate::beats::{heart_rate, HeartRate};
use crate::calib::{
    detect_grid, estimate_skew, find_content_bbox, normalize_scale, rotate_image, ContentBBox,
    GridCalibration, ScaleNormalization, SkewEstimate,
};
use crate::config::AnalyzeConfig;
use crate::criteria::{
    assess_hypertrophy, detect_blocks, lead_morphology, rs_amplitudes_mm, BlockAssessment,
    HypertrophyAssessment, HypertrophyMeasures, Sex,
};
use crate::error::AnalyzeError;
use crate::intervals::{measure_intervals, IntervalReport};
use crate::layout::{segment_layout, LeadRegion};
use crate::lead::Lead;
use crate::robust::{robust_intervals, RobustIntervals};
use crate::trace::{extract_centerline, inverted_baseline, smooth, Trace};

/// Fraction of a lead crop's height searched for the trace.
const CENTERLINE_BAND: f64 = 0.8;
/// Smoothing window applied to every extracted centerline.
const TRACE_SMOOTH_WINDOW: usize = 11;

/// Measurements derived from the anchor lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadAnalysis {
    pub lead: Lead,
    pub trace_len: usize,
    /// R-peak sample indices, strictly increasing.
    pub beats: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<HeartRate>,
    pub intervals: IntervalReport,
    pub robust: RobustIntervals,
}

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Dimensions of the page actually analyzed (after deskew/normalize).
    pub width: u32,
    pub height: u32,
    pub calibration: GridCalibration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew: Option<SkewEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<ScaleNormalization>,
    pub bbox: ContentBBox,
    pub regions: Vec<LeadRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<LeadAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<AxisEstimate>,
    pub blocks: BlockAssessment,
    pub hypertrophy: HypertrophyAssessment,
    /// Sampling-rate proxy used for every temporal measurement.
    pub px_per_second: f64,
    /// Fallbacks taken on this run, e.g. `"grid_fallback"`, `"no_beats"`.
    pub degraded: Vec<String>,
}

impl AnalysisResult {
    /// Result shell for a page nothing could be measured on.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calibration: GridCalibration::default(),
            skew: None,
            normalization: None,
            bbox: ContentBBox::full(width, height),
            regions: Vec::new(),
            anchor: None,
            axis: None,
            blocks: detect_blocks(&BTreeMap::new(), None),
            hypertrophy: assess_hypertrophy(&HypertrophyMeasures::default(), None, Sex::default()),
            px_per_second: 0.0,
            degraded: Vec::new(),
        }
    }
}

/// Extract and condition the centerline of one lead region.
fn region_trace(gray: &GrayImage, region: &LeadRegion) -> Trace {
    let b = &region.bbox;
    if b.width() == 0 || b.height() == 0 || b.x0 >= gray.width() || b.y0 >= gray.height() {
        return Vec::new();
    }
    let w = b.width().min(gray.width() - b.x0);
    let h = b.height().min(gray.height() - b.y0);
    let crop = imageops::crop_imm(gray, b.x0, b.y0, w, h).to_image();
    smooth(&extract_centerline(&crop, CENTERLINE_BAND), TRACE_SMOOTH_WINDOW)
}

/// Primary analysis interface.
///
/// Create once, analyze many pages.
pub struct Analyzer {
    config: AnalyzeConfig,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Analyzer with default standard-paper configuration.
    pub fn new() -> Self {
        Self {
            config: AnalyzeConfig::default(),
        }
    }

    /// Create with full config control.
    pub fn with_config(config: AnalyzeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzeConfig {
        &self.config
    }

    /// Mutable access for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut AnalyzeConfig {
        &mut self.config
    }

    /// Run the full measurement chain on a grayscale page.
    pub fn analyze(&self, image: &GrayImage) -> Result<AnalysisResult, AnalyzeError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AnalyzeError::EmptyImage);
        }
        let cfg = &self.config;
        let mut degraded = Vec::new();
        let mut gray = image.clone();

        let skew = if cfg.deskew {
            let est = estimate_skew(&gray, &cfg.deskew_cfg);
            if est.angle_deg != 0.0 {
                tracing::info!(angle_deg = est.angle_deg, "deskewing page");
                gray = rotate_image(&gray, est.angle_deg);
            }
            Some(est)
        } else {
            None
        };

        let normalization = if cfg.normalize {
            let (resized, info) = normalize_scale(&gray, cfg.target_px_per_mm, &cfg.grid);
            if info.scale != 1.0 {
                tracing::info!(scale = info.scale, "normalized page scale");
            }
            gray = resized;
            Some(info)
        } else {
            None
        };

        let calibration = detect_grid(&gray, &cfg.grid);
        let px_per_mm = match calibration.px_per_mm() {
            Some(p) => p,
            None => {
                tracing::warn!(
                    default_px_per_mm = cfg.default_px_per_mm,
                    "no grid pitch recovered; using configured default"
                );
                degraded.push("grid_fallback".to_string());
                cfg.default_px_per_mm
            }
        };
        let px_per_mm_v = calibration
            .px_per_mm_vertical()
            .unwrap_or(cfg.default_px_per_mm);
        let px_per_second = px_per_mm * cfg.paper_speed_mm_per_s;

        let bbox = find_content_bbox(&gray, cfg.background_threshold);
        let regions = segment_layout(&bbox, cfg.layout, cfg.margin);
        tracing::info!(
            layout = %cfg.layout,
            regions = regions.len(),
            px_per_second,
            "page segmented"
        );

        let find = |lead: Lead| regions.iter().find(|r| r.lead == lead);

        let mut anchor_region = find(cfg.anchor_lead);
        let mut fallbacks_tried = Vec::new();
        if anchor_region.is_none() {
            for &cand in &cfg.anchor_fallback {
                fallbacks_tried.push(cand);
                if let Some(region) = find(cand) {
                    tracing::warn!(requested = %cfg.anchor_lead, using = %cand, "anchor lead absent; fell back");
                    anchor_region = Some(region);
                    break;
                }
            }
        }
        let Some(anchor_region) = anchor_region else {
            return Err(AnalyzeError::AnchorLeadMissing {
                requested: cfg.anchor_lead,
                fallbacks_tried,
            });
        };
        let anchor_lead = anchor_region.lead;

        let anchor_trace = region_trace(&gray, anchor_region);
        let beats = cfg.detector.detect(&anchor_trace, px_per_second);
        if beats.is_empty() {
            tracing::warn!(anchor = %anchor_lead, "no beats detected on anchor lead");
            degraded.push("no_beats".to_string());
        } else {
            tracing::info!(anchor = %anchor_lead, beats = beats.len(), "beats detected");
        }
        let hr = heart_rate(&beats, px_per_second);
        let intervals = measure_intervals(&anchor_trace, &beats, px_per_second, &cfg.intervals_cfg);
        let robust = robust_intervals(&intervals, cfg.robust_metric, cfg.robust_z);
        let qrs_ms = robust.median_robust.qrs_ms.or(intervals.median.qrs_ms);

        // Frontal axis over the configured leads.
        let amplitudes: Vec<LeadAmplitude> = cfg
            .axis_leads
            .iter()
            .filter_map(|&lead| {
                let region = find(lead)?;
                let corrected = inverted_baseline(&region_trace(&gray, region));
                Some(LeadAmplitude {
                    lead,
                    amplitude: net_qrs_amplitude(&corrected, &beats, px_per_second),
                })
            })
            .collect();
        let axis = frontal_axis(&amplitudes);

        // V1/V2 and I/V6 morphology for block scoring.
        let mut features = BTreeMap::new();
        for lead in [Lead::V1, Lead::V2, Lead::I, Lead::V6] {
            if let Some(region) = find(lead) {
                let corrected = inverted_baseline(&region_trace(&gray, region));
                features.insert(
                    lead,
                    lead_morphology(&corrected, &beats, px_per_second, px_per_mm_v),
                );
            }
        }
        let blocks = detect_blocks(&features, qrs_ms);

        let rs = |lead: Lead| -> (f64, f64) {
            find(lead)
                .map(|region| {
                    let corrected = inverted_baseline(&region_trace(&gray, region));
                    rs_amplitudes_mm(&corrected, &beats, px_per_second, px_per_mm_v)
                })
                .unwrap_or((0.0, 0.0))
        };
        let measures = HypertrophyMeasures {
            r_avl_mm: rs(Lead::AVL).0,
            s_v3_mm: rs(Lead::V3).1,
            s_v1_mm: rs(Lead::V1).1,
            r_v5_mm: rs(Lead::V5).0,
            r_v6_mm: rs(Lead::V6).0,
        };
        let hypertrophy = assess_hypertrophy(&measures, qrs_ms, cfg.sex);

        Ok(AnalysisResult {
            width: gray.width(),
            height: gray.height(),
            calibration,
            skew,
            normalization,
            bbox,
            regions,
            anchor: Some(LeadAnalysis {
                lead: anchor_lead,
                trace_len: anchor_trace.len(),
                beats,
                heart_rate: hr,
                intervals,
                robust,
            }),
            axis,
            blocks,
            hypertrophy,
            px_per_second,
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::BlockLabel;
    use crate::layout::PaperLayout;
    use crate::test_utils::{draw_grid_image, draw_trace_into, synth_ecg_trace};

    #[test]
    fn empty_image_is_an_error() {
        let analyzer = Analyzer::new();
        let img = GrayImage::new(0, 0);
        assert!(matches!(
            analyzer.analyze(&img),
            Err(AnalyzeError::EmptyImage)
        ));
    }

    #[test]
    fn empty_result_shell_is_consistent() {
        let r = AnalysisResult::empty(640, 480);
        assert_eq!((r.width, r.height), (640, 480));
        assert!(r.anchor.is_none());
        assert!(r.axis.is_none());
        assert_eq!(r.blocks.label, BlockLabel::NoneEvident);
        assert!(!r.hypertrophy.lvh_sokolow);
        assert_eq!(r.bbox.width(), 640);
    }

    #[test]
    fn blank_page_degrades_instead_of_failing() {
        let analyzer = Analyzer::new();
        let img = GrayImage::from_pixel(400, 300, image::Luma([255]));
        let result = analyzer.analyze(&img).unwrap();
        assert!(result.degraded.iter().any(|d| d == "grid_fallback"));
        assert!(result.degraded.iter().any(|d| d == "no_beats"));
        // default pitch 10 px/mm at 25 mm/s
        assert!((result.px_per_second - 250.0).abs() < 1e-9);
        let anchor = result.anchor.expect("anchor analysis");
        assert_eq!(anchor.lead, Lead::II);
        assert!(anchor.beats.is_empty());
        assert!(result.axis.is_none());
    }

    #[test]
    fn missing_anchor_falls_back_in_order() {
        let mut cfg = AnalyzeConfig::default();
        cfg.layout = PaperLayout::ThreeByFour;
        cfg.anchor_lead = Lead::IIRhythm; // absent from plain 3x4
        let analyzer = Analyzer::with_config(cfg);
        let img = GrayImage::from_pixel(400, 300, image::Luma([255]));
        let result = analyzer.analyze(&img).unwrap();
        assert_eq!(result.anchor.unwrap().lead, Lead::II);
    }

    #[test]
    fn missing_anchor_without_fallbacks_errors() {
        let mut cfg = AnalyzeConfig::default();
        cfg.anchor_lead = Lead::IIRhythm;
        cfg.anchor_fallback = Vec::new();
        let analyzer = Analyzer::with_config(cfg);
        let img = GrayImage::from_pixel(400, 300, image::Luma([255]));
        match analyzer.analyze(&img) {
            Err(AnalyzeError::AnchorLeadMissing {
                requested,
                fallbacks_tried,
            }) => {
                assert_eq!(requested, Lead::IIRhythm);
                assert!(fallbacks_tried.is_empty());
            }
            other => panic!("expected AnchorLeadMissing, got {other:?}"),
        }
    }

    /// Full chain on a rendered page: 20 px/mm grid (500 px/s at 25 mm/s)
    /// with a synthetic 75 bpm rhythm strip carrying PR 160, QRS 90,
    /// QT 380 ms.
    #[test]
    fn synthetic_page_recovers_clinical_intervals() {
        let (w, h) = (4000u32, 1000u32);
        let mut img = draw_grid_image(w, h, 20, 200, 255);

        let mut cfg = AnalyzeConfig::default();
        cfg.layout = PaperLayout::ThreeByFourRhythm;
        cfg.anchor_lead = Lead::IIRhythm;
        let analyzer = Analyzer::with_config(cfg);

        // Place the trace exactly where segmentation will look for it.
        let bbox = find_content_bbox(&img, 250);
        let regions = segment_layout(&bbox, PaperLayout::ThreeByFourRhythm, 0.02);
        let rhythm = regions
            .iter()
            .find(|r| r.lead == Lead::IIRhythm)
            .unwrap()
            .bbox;
        let fs = 500.0;
        let duration = rhythm.width() as f64 / fs;
        let trace = synth_ecg_trace(fs, 75.0, duration, 160.0, 90.0, 380.0);
        draw_trace_into(&mut img, &rhythm, &trace);

        let result = analyzer.analyze(&img).unwrap();
        assert!((result.px_per_second - 500.0).abs() < 500.0 * 0.1);
        assert!(result.calibration.confidence > 0.5);

        let anchor = result.anchor.expect("anchor analysis");
        assert_eq!(anchor.lead, Lead::IIRhythm);
        assert!(anchor.beats.len() >= 5, "beats={}", anchor.beats.len());
        let bpm = anchor.heart_rate.expect("heart rate").bpm_median;
        assert!((bpm - 75.0).abs() < 15.0, "bpm={bpm}");

        let m = &anchor.robust.median_robust;
        let pr = m.pr_ms.expect("pr");
        let qrs = m.qrs_ms.expect("qrs");
        let qt = m.qt_ms.expect("qt");
        assert!((pr - 160.0).abs() < 160.0 * 0.3, "pr={pr}");
        assert!((qrs - 90.0).abs() < 90.0 * 0.3, "qrs={qrs}");
        assert!((qt - 380.0).abs() < 380.0 * 0.3, "qt={qt}");
        let qtc = m.qtc_bazett_ms.expect("qtc");
        assert!((350.0..=460.0).contains(&qtc), "qtc={qtc}");

        assert!(anchor.robust.beats_used >= 1);
        assert_eq!(anchor.robust.mask.len(), anchor.robust.beats_total);
    }
}
