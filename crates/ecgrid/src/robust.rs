//! MAD-based outlier rejection over per-beat intervals.
//!
//! A secondary aggregation pass: beats whose reference metric falls
//! outside `median ± z * 1.4826 * MAD`, or whose QRS is physiologically
//! absurd, are masked out and the medians recomputed over the inliers.
//! The mask and counts are reported for auditability.

use serde::{Deserialize, Serialize};

use crate::intervals::{qtc_bazett, qtc_fridericia, IntervalMedians, IntervalReport};
use crate::trace::median;

/// Scale factor relating MAD to the standard deviation of a normal
/// distribution.
const MAD_SIGMA: f64 = 1.4826;

/// Hard QRS plausibility band (milliseconds) for the composite mask.
const QRS_ABSURD_MS: (f64, f64) = (50.0, 240.0);

/// Which per-beat metric drives the primary outlier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobustMetric {
    Pr,
    Qrs,
    #[default]
    Qt,
}

/// Robust aggregation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustIntervals {
    pub beats_total: usize,
    pub beats_used: usize,
    /// Inlier mask, one entry per beat (`mask.len() == beats_total`).
    pub mask: Vec<bool>,
    pub median_robust: IntervalMedians,
}

/// MAD inlier mask over optional values; `None` entries are outliers.
fn mad_mask(values: &[Option<f64>], z: f64) -> Vec<bool> {
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    let Some(med) = median(&present) else {
        return vec![false; values.len()];
    };
    let deviations: Vec<f64> = present.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0) + 1e-9;
    let half_band = z * MAD_SIGMA * mad;
    values
        .iter()
        .map(|v| match v {
            Some(v) => (v - med).abs() <= half_band,
            None => false,
        })
        .collect()
}

/// Recompute interval medians over MAD inliers of the preferred metric.
///
/// Invariants: `0 <= beats_used <= beats_total` and the mask length
/// equals `beats_total`.
pub fn robust_intervals(report: &IntervalReport, prefer: RobustMetric, z: f64) -> RobustIntervals {
    let n = report.per_beat.len();
    let pr: Vec<Option<f64>> = report.per_beat.iter().map(|b| b.pr_ms).collect();
    let qrs: Vec<Option<f64>> = report.per_beat.iter().map(|b| b.qrs_ms).collect();
    let qt: Vec<Option<f64>> = report.per_beat.iter().map(|b| b.qt_ms).collect();

    let base = match prefer {
        RobustMetric::Pr => &pr,
        RobustMetric::Qrs => &qrs,
        RobustMetric::Qt => &qt,
    };
    let primary = mad_mask(base, z);

    // Composite mask: additionally reject beats with absurd QRS.
    let mask: Vec<bool> = (0..n)
        .map(|i| {
            let mut ok = primary[i];
            if let Some(q) = qrs[i] {
                if q < QRS_ABSURD_MS.0 || q > QRS_ABSURD_MS.1 {
                    ok = false;
                }
            }
            ok
        })
        .collect();

    let masked = |vals: &[Option<f64>]| -> Vec<f64> {
        vals.iter()
            .zip(&mask)
            .filter_map(|(v, &m)| if m { *v } else { None })
            .collect()
    };
    let pr_m = median(&masked(&pr));
    let qrs_m = median(&masked(&qrs));
    let qt_m = median(&masked(&qt));

    let rr = report.median.rr_s;
    let qtc_b = qt_m.zip(rr).and_then(|(qt, rr)| qtc_bazett(qt, rr));
    let qtc_f = qt_m.zip(rr).and_then(|(qt, rr)| qtc_fridericia(qt, rr));

    RobustIntervals {
        beats_total: n,
        beats_used: mask.iter().filter(|&&m| m).count(),
        mask,
        median_robust: IntervalMedians {
            pr_ms: pr_m,
            qrs_ms: qrs_m,
            qt_ms: qt_m,
            qtc_bazett_ms: qtc_b,
            qtc_fridericia_ms: qtc_f,
            rr_s: rr,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervals::{BeatIntervals, IntervalReport};

    fn beat(r: usize, pr: Option<f64>, qrs: Option<f64>, qt: Option<f64>) -> BeatIntervals {
        BeatIntervals {
            r_peak: r,
            onset: r.saturating_sub(20),
            offset: r + 25,
            p_onset: None,
            t_end: None,
            pr_ms: pr,
            qrs_ms: qrs,
            qt_ms: qt,
        }
    }

    fn report(beats: Vec<BeatIntervals>, rr_s: Option<f64>) -> IntervalReport {
        IntervalReport {
            per_beat: beats,
            median: IntervalMedians {
                rr_s,
                ..Default::default()
            },
        }
    }

    #[test]
    fn mask_invariants_hold() {
        let beats = vec![
            beat(100, Some(150.0), Some(90.0), Some(380.0)),
            beat(500, Some(160.0), Some(95.0), Some(385.0)),
            beat(900, Some(155.0), Some(92.0), Some(900.0)), // QT outlier
            beat(1300, None, Some(300.0), Some(382.0)),      // absurd QRS
        ];
        let out = robust_intervals(&report(beats, Some(0.8)), RobustMetric::Qt, 2.7);
        assert_eq!(out.beats_total, 4);
        assert_eq!(out.mask.len(), 4);
        assert!(out.beats_used <= out.beats_total);
        assert!(!out.mask[2], "QT outlier must be rejected");
        assert!(!out.mask[3], "absurd QRS must be rejected");
        assert_eq!(out.beats_used, 2);
    }

    #[test]
    fn robust_median_ignores_outlier() {
        let beats = vec![
            beat(100, None, Some(90.0), Some(380.0)),
            beat(500, None, Some(91.0), Some(384.0)),
            beat(900, None, Some(89.0), Some(382.0)),
            beat(1300, None, Some(90.0), Some(1200.0)),
        ];
        let out = robust_intervals(&report(beats, Some(0.8)), RobustMetric::Qt, 2.7);
        let qt = out.median_robust.qt_ms.unwrap();
        assert!((qt - 382.0).abs() < 3.0, "qt={qt}");
        assert!(out.median_robust.qtc_bazett_ms.is_some());
    }

    #[test]
    fn all_missing_values_reject_everything() {
        let beats = vec![beat(100, None, None, None), beat(500, None, None, None)];
        let out = robust_intervals(&report(beats, None), RobustMetric::Qt, 2.7);
        assert_eq!(out.beats_used, 0);
        assert!(out.mask.iter().all(|&m| !m));
        assert!(out.median_robust.qt_ms.is_none());
    }

    #[test]
    fn empty_report_is_empty() {
        let out = robust_intervals(&report(Vec::new(), None), RobustMetric::Qt, 2.7);
        assert_eq!(out.beats_total, 0);
        assert_eq!(out.beats_used, 0);
        assert!(out.mask.is_empty());
    }
}
