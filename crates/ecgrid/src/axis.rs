//! Frontal-plane QRS axis from hexaxial lead amplitudes.
//!
//! Each frontal lead contributes a vector along its hexaxial direction,
//! scaled by the lead's net QRS deflection. The axis is the direction of
//! the resultant, classified into the standard deviation bands.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::lead::Lead;
use crate::trace::median;

/// Ignore leads whose net deflection is numerically zero.
const AMP_EPS: f64 = 1e-6;

/// Standard axis deviation bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisLabel {
    Normal,
    LeftDeviation,
    RightDeviation,
    ExtremeDeviation,
}

/// Net QRS deflection of one frontal lead, in trace units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadAmplitude {
    pub lead: Lead,
    pub amplitude: f64,
}

/// Frontal axis estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisEstimate {
    /// Axis angle in degrees, in `(-180, 180]`.
    pub angle_deg: f64,
    pub label: AxisLabel,
    /// Amplitudes that contributed to the resultant.
    pub amplitudes: Vec<LeadAmplitude>,
}

/// Classify an angle (degrees) into the standard bands.
pub fn classify_axis(angle_deg: f64) -> AxisLabel {
    if angle_deg > -30.0 && angle_deg <= 90.0 {
        AxisLabel::Normal
    } else if angle_deg > 90.0 && angle_deg <= 180.0 {
        AxisLabel::RightDeviation
    } else if angle_deg >= -90.0 && angle_deg < -30.0 {
        AxisLabel::LeftDeviation
    } else {
        AxisLabel::ExtremeDeviation
    }
}

/// Median net QRS deflection for one lead.
///
/// For each beat the window `[r - 80 ms, r + 120 ms]` is inspected and the
/// net deflection is `max + min` of the baseline-corrected trace (positive
/// peaks add, negative troughs subtract). Beats whose window falls outside
/// the trace are skipped; without detected beats the whole trace is used.
pub fn net_qrs_amplitude(trace: &[f64], peaks: &[usize], px_per_sec: f64) -> f64 {
    if trace.is_empty() {
        return 0.0;
    }
    let window = |lo: usize, hi: usize| -> f64 {
        let lo = lo.min(trace.len());
        let hi = hi.min(trace.len());
        if lo >= hi {
            return 0.0;
        }
        let seg = &trace[lo..hi];
        let max = seg.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = seg.iter().cloned().fold(f64::INFINITY, f64::min);
        max + min
    };
    if peaks.is_empty() {
        return window(0, trace.len());
    }
    let pre = (0.08 * px_per_sec).round() as usize;
    let post = (0.12 * px_per_sec).round() as usize;
    let per_beat: Vec<f64> = peaks
        .iter()
        .map(|&r| window(r.saturating_sub(pre), r + post + 1))
        .filter(|v| v.abs() > 1e-6)
        .collect();
    median(&per_beat).unwrap_or(0.0)
}

/// Estimate the frontal axis from per-lead net amplitudes.
///
/// Leads without a hexaxial direction or with near-zero amplitude are
/// skipped. Returns `None` when fewer than two leads contribute.
pub fn frontal_axis(amplitudes: &[LeadAmplitude]) -> Option<AxisEstimate> {
    let mut resultant = Vector2::zeros();
    let mut used = Vec::new();
    for la in amplitudes {
        let Some(theta) = la.lead.hexaxial_angle_deg() else {
            continue;
        };
        if la.amplitude.abs() <= AMP_EPS {
            continue;
        }
        let theta = theta.to_radians();
        resultant += Vector2::new(theta.cos(), theta.sin()) * la.amplitude;
        used.push(la.clone());
    }
    if used.len() < 2 || resultant.norm() <= AMP_EPS {
        return None;
    }
    let mut angle_deg = resultant.y.atan2(resultant.x).to_degrees();
    if angle_deg <= -180.0 {
        angle_deg += 360.0;
    }
    Some(AxisEstimate {
        angle_deg,
        label: classify_axis(angle_deg),
        amplitudes: used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amps(i: f64, avf: f64) -> Vec<LeadAmplitude> {
        vec![
            LeadAmplitude {
                lead: Lead::I,
                amplitude: i,
            },
            LeadAmplitude {
                lead: Lead::AVF,
                amplitude: avf,
            },
        ]
    }

    #[test]
    fn quadrants_classify_as_expected() {
        let cases = [
            (5.0, 3.0, AxisLabel::Normal),
            (5.0, -3.0, AxisLabel::LeftDeviation),
            (-5.0, 3.0, AxisLabel::RightDeviation),
            (-5.0, -3.0, AxisLabel::ExtremeDeviation),
        ];
        for (i, avf, want) in cases {
            let est = frontal_axis(&amps(i, avf)).expect("axis");
            assert_eq!(est.label, want, "I={i} aVF={avf} angle={}", est.angle_deg);
        }
    }

    #[test]
    fn pure_lead_i_pair_gives_known_angle() {
        use approx::assert_relative_eq;

        let est = frontal_axis(&amps(5.0, 5.0)).unwrap();
        assert_relative_eq!(est.angle_deg, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn too_few_leads_yield_none() {
        assert!(frontal_axis(&amps(5.0, 0.0)).is_none());
        assert!(frontal_axis(&[]).is_none());
    }

    #[test]
    fn precordial_leads_are_ignored() {
        let mut a = amps(5.0, 3.0);
        a.push(LeadAmplitude {
            lead: Lead::V3,
            amplitude: 100.0,
        });
        let est = frontal_axis(&a).unwrap();
        assert_eq!(est.amplitudes.len(), 2);
        assert_eq!(est.label, AxisLabel::Normal);
    }

    #[test]
    fn net_amplitude_uses_beat_windows() {
        let fs = 500.0;
        let mut trace = vec![0.0; 2000];
        // Positive spike at each beat, far-away artifact ignored.
        for r in [400usize, 800, 1200] {
            trace[r] = 10.0;
            trace[r + 20] = -2.0;
        }
        trace[10] = -50.0;
        let a = net_qrs_amplitude(&trace, &[400, 800, 1200], fs);
        assert!((a - 8.0).abs() < 1e-9, "a={a}");
    }

    #[test]
    fn beats_past_trace_end_are_skipped() {
        // Rhythm-strip beat indices can outrun a shorter lead's trace.
        let mut trace = vec![0.0; 840];
        trace[250] = 10.0;
        let a = net_qrs_amplitude(&trace, &[250, 3850], 500.0);
        assert!((a - 10.0).abs() < 1e-9, "a={a}");
    }

    #[test]
    fn no_beats_falls_back_to_whole_trace() {
        let trace = vec![-1.0, 0.0, 3.0];
        assert!((net_qrs_amplitude(&trace, &[], 500.0) - 2.0).abs() < 1e-9);
    }
}
