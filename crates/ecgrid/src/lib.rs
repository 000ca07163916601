//! ecgrid — clinical measurements from photographed or scanned paper ECG
//! strips.
//!
//! A scanned strip carries its own ruler: the 1 mm calibration grid. Once
//! the grid pitch is known, horizontal pixels become time and vertical
//! pixels become voltage, and the usual signal-processing chain applies
//! to the extracted pen trace. The pipeline stages are:
//!
//! 1. **Calibration** – grid-pitch autocorrelation, optional deskew and
//!    scale normalization, content bounding box.
//! 2. **Segmentation** – named lead regions for the `3x4`, `6x2`, and
//!    `3x4+rhythm` paper layouts, with optional label recognition.
//! 3. **Trace** – darkest-pixel centerline extraction and smoothing.
//! 4. **Beats** – R-peak detection (z-score or Pan-Tompkins-style).
//! 5. **Intervals** – PR/QRS/QT boundary refinement, QTc, robust
//!    MAD-based aggregation across beats.
//! 6. **Estimators** – hexaxial frontal axis, bundle-branch-block
//!    scoring, hypertrophy voltage criteria.
//!
//! # Public API
//! - [`Analyzer`] and [`AnalyzeConfig`] as primary entry points
//! - [`AnalysisResult`] and the per-stage result structures
//! - individual stage functions for callers composing their own chain

pub mod axis;
pub mod beats;
pub mod calib;
pub mod config;
pub mod criteria;
pub mod error;
pub mod intervals;
pub mod labels;
pub mod layout;
pub mod lead;
pub mod pipeline;
pub mod robust;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_utils;

pub use axis::{classify_axis, frontal_axis, AxisEstimate, AxisLabel, LeadAmplitude};
pub use beats::{heart_rate, rr_intervals, BeatDetector, HeartRate};
pub use calib::{
    detect_grid, estimate_skew, find_content_bbox, normalize_scale, ContentBBox, DeskewConfig,
    GridCalibration, GridDetectConfig, ScaleNormalization, SkewEstimate,
};
pub use config::AnalyzeConfig;
pub use criteria::{
    assess_hypertrophy, detect_blocks, BlockAssessment, BlockLabel, HypertrophyAssessment,
    HypertrophyMeasures, Sex,
};
pub use error::AnalyzeError;
pub use intervals::{
    measure_intervals, qtc_bazett, qtc_fridericia, BeatIntervals, IntervalConfig, IntervalMedians,
    IntervalReport,
};
pub use labels::{
    choose_layout, identify_labels, LabelDetection, LabelRecognizer, LayoutChoice, NoopRecognizer,
    TemplateRecognizer,
};
pub use layout::{segment_layout, LeadRegion, PaperLayout, LAYOUT_PRIORITY};
pub use lead::Lead;
pub use pipeline::{AnalysisResult, Analyzer, LeadAnalysis};
pub use robust::{robust_intervals, RobustIntervals, RobustMetric};
pub use trace::{extract_centerline, smooth, Trace};
