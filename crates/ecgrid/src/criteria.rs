//! Conduction-block and hypertrophy screening heuristics.
//!
//! These are coarse morphology scores over the extracted traces, meant as
//! triage hints rather than diagnoses. Amplitudes are measured against a
//! local pre-QRS baseline and converted to millimetres with the vertical
//! grid pitch; block detection is an additive score over V1/V2 and I/V6
//! morphology plus QRS width.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lead::Lead;
use crate::trace::median;

/// Patient sex, used only to pick the Cornell-product threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

/// Sokolow-Lyon positivity threshold (mm).
const SOKOLOW_THRESHOLD_MM: f64 = 35.0;
/// Cornell product thresholds (mm*ms), male / female.
const CORNELL_THRESHOLD_MALE: f64 = 2440.0;
const CORNELL_THRESHOLD_FEMALE: f64 = 2000.0;

/// Per-lead QRS morphology summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadMorphology {
    /// Median count of positive local maxima inside the QRS window
    /// (RSR'/notch proxy).
    pub peaks: f64,
    pub r_mm: f64,
    pub s_mm: f64,
    pub rs_ratio: f64,
}

/// Block screen outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockLabel {
    /// No major block evident.
    NoneEvident,
    ProbableRbbb,
    ProbableLbbb,
    /// Borderline score; incomplete block possible, review morphology.
    IncompleteHint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAssessment {
    pub label: BlockLabel,
    pub rbbb_score: f64,
    pub lbbb_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qrs_ms: Option<f64>,
    pub features: BTreeMap<Lead, LeadMorphology>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HypertrophyMeasures {
    pub r_avl_mm: f64,
    pub s_v3_mm: f64,
    pub s_v1_mm: f64,
    pub r_v5_mm: f64,
    pub r_v6_mm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypertrophyAssessment {
    pub sex: Sex,
    pub qrs_ms: f64,
    pub measures: HypertrophyMeasures,
    pub sokolow_lyon_mm: f64,
    pub cornell_mm: f64,
    pub cornell_product_mm_ms: f64,
    pub sokolow_threshold_mm: f64,
    pub cornell_threshold_mm_ms: f64,
    pub lvh_sokolow: bool,
    pub lvh_cornell_product: bool,
}

/// Strict local maxima with a +/-`win` neighborhood; plateau ties resolve
/// to the first sample.
fn local_peaks(x: &[f64], win: usize) -> Vec<usize> {
    let mut idx = Vec::new();
    if x.len() <= 2 * win {
        return idx;
    }
    for i in win..x.len() - win {
        let seg = &x[i - win..=i + win];
        let (arg, max) = seg
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |(ai, am), (j, &v)| {
                if v > am {
                    (j, v)
                } else {
                    (ai, am)
                }
            });
        if x[i] == max && arg == win {
            idx.push(i);
        }
    }
    idx
}

/// R and S amplitudes (trace units) of one beat against the local pre-QRS
/// baseline, both clamped non-negative.
fn rs_amplitudes(sig: &[f64], r: usize, px_per_sec: f64) -> Option<(f64, f64)> {
    if r >= sig.len() {
        return None;
    }
    let fs = px_per_sec;
    let i0 = r.saturating_sub((0.06 * fs) as usize);
    let i1 = ((r + (0.12 * fs) as usize) + 1).min(sig.len());
    let b0 = r.saturating_sub((0.12 * fs) as usize);
    let b1 = r.saturating_sub((0.08 * fs) as usize);
    let base = if b1 > b0 + 3 {
        median(&sig[b0..b1])?
    } else {
        median(&sig[r.saturating_sub(10)..r])?
    };
    let seg = &sig[i0..i1];
    if seg.len() < 3 {
        return None;
    }
    let max = seg.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = seg.iter().cloned().fold(f64::INFINITY, f64::min);
    Some(((max - base).max(0.0), (base - min).max(0.0)))
}

/// Median R/S amplitudes over beats, converted to millimetres.
pub fn rs_amplitudes_mm(
    sig: &[f64],
    peaks: &[usize],
    px_per_sec: f64,
    px_per_mm: f64,
) -> (f64, f64) {
    let mut rs = Vec::new();
    let mut ss = Vec::new();
    for &r in peaks {
        if let Some((rv, sv)) = rs_amplitudes(sig, r, px_per_sec) {
            rs.push(rv / px_per_mm);
            ss.push(sv / px_per_mm);
        }
    }
    (median(&rs).unwrap_or(0.0), median(&ss).unwrap_or(0.0))
}

/// Median number of positive peaks inside the QRS window across beats.
pub fn qrs_peak_count(sig: &[f64], peaks: &[usize], px_per_sec: f64) -> f64 {
    let counts: Vec<f64> = peaks
        .iter()
        .filter(|&&r| r < sig.len())
        .map(|&r| {
            let i0 = r.saturating_sub((0.06 * px_per_sec) as usize);
            let i1 = ((r + (0.12 * px_per_sec) as usize) + 1).min(sig.len());
            local_peaks(&sig[i0..i1], 2).len() as f64
        })
        .collect();
    median(&counts).unwrap_or(0.0)
}

/// Full morphology summary for one lead.
pub fn lead_morphology(
    sig: &[f64],
    peaks: &[usize],
    px_per_sec: f64,
    px_per_mm: f64,
) -> LeadMorphology {
    let (r_mm, s_mm) = rs_amplitudes_mm(sig, peaks, px_per_sec, px_per_mm);
    LeadMorphology {
        peaks: qrs_peak_count(sig, peaks, px_per_sec),
        r_mm,
        s_mm,
        rs_ratio: r_mm / (s_mm + 1e-9),
    }
}

/// Additive RBBB/LBBB scoring over V1/V2 and I/V6 morphology.
pub fn detect_blocks(
    features: &BTreeMap<Lead, LeadMorphology>,
    qrs_ms: Option<f64>,
) -> BlockAssessment {
    let peaks = |l: Lead| features.get(&l).map_or(0.0, |f| f.peaks);
    let rs = |l: Lead| features.get(&l).map_or(0.0, |f| f.rs_ratio);
    let r = |l: Lead| features.get(&l).map_or(1e-9, |f| f.r_mm);
    let s = |l: Lead| features.get(&l).map_or(0.0, |f| f.s_mm);

    let mut rbbb: f64 = 0.0;
    let mut lbbb: f64 = 0.0;
    // Both require a wide QRS.
    if qrs_ms.is_some_and(|q| q >= 120.0) {
        rbbb += 1.0;
        lbbb += 1.0;
    }
    // RBBB: RSR' or dominant R in V1/V2, prominent S laterally.
    if peaks(Lead::V1).max(peaks(Lead::V2)) >= 2.0 || rs(Lead::V1).max(rs(Lead::V2)) >= 1.5 {
        rbbb += 1.0;
    }
    if s(Lead::V6).max(s(Lead::I)) > 0.4 * r(Lead::V6).max(r(Lead::I)) {
        rbbb += 0.5;
    }
    // LBBB: notched lateral R with a dominant S in V1, plus tall lateral R.
    if peaks(Lead::I).max(peaks(Lead::V6)) >= 2.0 && s(Lead::V1) > 1.2 * r(Lead::V1).max(1e-9) {
        lbbb += 1.5;
    }
    let lat_s = |l: Lead| features.get(&l).map_or(1e-9, |f| f.s_mm);
    let lat_r = |l: Lead| features.get(&l).map_or(0.0, |f| f.r_mm);
    if lat_r(Lead::I).max(lat_r(Lead::V6)) > 1.5 * lat_s(Lead::I).max(lat_s(Lead::V6)) {
        lbbb += 0.5;
    }

    let label = if rbbb.max(lbbb) >= 2.0 {
        if rbbb >= lbbb {
            BlockLabel::ProbableRbbb
        } else {
            BlockLabel::ProbableLbbb
        }
    } else if rbbb.max(lbbb) >= 1.5 {
        BlockLabel::IncompleteHint
    } else {
        BlockLabel::NoneEvident
    };
    BlockAssessment {
        label,
        rbbb_score: rbbb,
        lbbb_score: lbbb,
        qrs_ms,
        features: features.clone(),
    }
}

/// Sokolow-Lyon and Cornell-product left-ventricular-hypertrophy screen.
///
/// Assumes standard 10 mm/mV calibration. A missing QRS width defaults to
/// 100 ms for the Cornell product.
pub fn assess_hypertrophy(
    measures: &HypertrophyMeasures,
    qrs_ms: Option<f64>,
    sex: Sex,
) -> HypertrophyAssessment {
    let qrs_ms = qrs_ms.unwrap_or(100.0);
    let sokolow = measures.s_v1_mm + measures.r_v5_mm.max(measures.r_v6_mm);
    let cornell = measures.r_avl_mm + measures.s_v3_mm;
    let cornell_product = cornell * qrs_ms;
    let cornell_thr = match sex {
        Sex::Male => CORNELL_THRESHOLD_MALE,
        Sex::Female => CORNELL_THRESHOLD_FEMALE,
    };
    HypertrophyAssessment {
        sex,
        qrs_ms,
        measures: measures.clone(),
        sokolow_lyon_mm: sokolow,
        cornell_mm: cornell,
        cornell_product_mm_ms: cornell_product,
        sokolow_threshold_mm: SOKOLOW_THRESHOLD_MM,
        cornell_threshold_mm_ms: cornell_thr,
        lvh_sokolow: sokolow > SOKOLOW_THRESHOLD_MM,
        lvh_cornell_product: cornell_product > cornell_thr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn morph(peaks: f64, r_mm: f64, s_mm: f64) -> LeadMorphology {
        LeadMorphology {
            peaks,
            r_mm,
            s_mm,
            rs_ratio: r_mm / (s_mm + 1e-9),
        }
    }

    #[test]
    fn local_peaks_finds_strict_maxima() {
        let x = [0.0, 1.0, 0.0, 0.0, 3.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0];
        let idx = local_peaks(&x, 2);
        assert_eq!(idx, vec![4, 7]);
    }

    #[test]
    fn rs_amplitudes_measure_against_baseline() {
        let fs = 500.0;
        let mut sig = vec![10.0; 1000];
        sig[500] = 50.0; // R
        sig[515] = -20.0; // S
        let (r, s) = rs_amplitudes(&sig, 500, fs).unwrap();
        assert!((r - 40.0).abs() < 1e-9);
        assert!((s - 30.0).abs() < 1e-9);
    }

    #[test]
    fn rs_amplitudes_mm_scales_by_pitch() {
        let fs = 500.0;
        let mut sig = vec![0.0; 1000];
        sig[500] = 100.0;
        let (r, s) = rs_amplitudes_mm(&sig, &[500], fs, 10.0);
        assert!((r - 10.0).abs() < 1e-9);
        assert!(s.abs() < 1e-9);
    }

    #[test]
    fn beats_past_trace_end_are_ignored() {
        let fs = 500.0;
        let mut sig = vec![10.0; 840];
        sig[500] = 50.0;
        sig[515] = -20.0;
        let (r, s) = rs_amplitudes_mm(&sig, &[500, 3850], fs, 1.0);
        assert!((r - 40.0).abs() < 1e-9);
        assert!((s - 30.0).abs() < 1e-9);
        assert_eq!(qrs_peak_count(&sig, &[3850], fs), 0.0);
    }

    #[test]
    fn rbbb_pattern_scores_probable() {
        let mut f = BTreeMap::new();
        f.insert(Lead::V1, morph(2.0, 8.0, 3.0)); // RSR'
        f.insert(Lead::V6, morph(1.0, 5.0, 6.0)); // prominent lateral S
        f.insert(Lead::I, morph(1.0, 5.0, 1.0));
        let out = detect_blocks(&f, Some(130.0));
        assert_eq!(out.label, BlockLabel::ProbableRbbb);
        assert!(out.rbbb_score >= 2.0, "score={}", out.rbbb_score);
    }

    #[test]
    fn lbbb_pattern_scores_probable() {
        let mut f = BTreeMap::new();
        f.insert(Lead::V1, morph(1.0, 1.0, 9.0)); // dominant S in V1
        f.insert(Lead::V6, morph(2.0, 12.0, 1.0)); // notched tall lateral R
        f.insert(Lead::I, morph(2.0, 10.0, 1.0));
        let out = detect_blocks(&f, Some(140.0));
        assert_eq!(out.label, BlockLabel::ProbableLbbb);
        assert!(out.lbbb_score >= 2.0, "score={}", out.lbbb_score);
    }

    #[test]
    fn narrow_qrs_without_morphology_is_clean() {
        let mut f = BTreeMap::new();
        f.insert(Lead::V1, morph(1.0, 2.0, 5.0));
        f.insert(Lead::V6, morph(1.0, 8.0, 1.0));
        f.insert(Lead::I, morph(1.0, 7.0, 1.0));
        let out = detect_blocks(&f, Some(90.0));
        // Tall lateral R alone only reaches the 0.5 LBBB contribution.
        assert_eq!(out.label, BlockLabel::NoneEvident);
    }

    #[test]
    fn sokolow_threshold_is_exclusive() {
        let m = HypertrophyMeasures {
            s_v1_mm: 15.0,
            r_v5_mm: 20.0,
            ..Default::default()
        };
        let out = assess_hypertrophy(&m, Some(100.0), Sex::Male);
        assert!((out.sokolow_lyon_mm - 35.0).abs() < 1e-9);
        assert!(!out.lvh_sokolow);
    }

    #[test]
    fn cornell_product_depends_on_sex() {
        let m = HypertrophyMeasures {
            r_avl_mm: 12.0,
            s_v3_mm: 10.0,
            ..Default::default()
        };
        // 22 mm * 100 ms = 2200 mm*ms: positive for female, not male.
        let male = assess_hypertrophy(&m, Some(100.0), Sex::Male);
        let female = assess_hypertrophy(&m, Some(100.0), Sex::Female);
        assert!(!male.lvh_cornell_product);
        assert!(female.lvh_cornell_product);
        assert!((male.cornell_product_mm_ms - 2200.0).abs() < 1e-9);
    }

    #[test]
    fn missing_qrs_defaults_to_100ms() {
        let out = assess_hypertrophy(&HypertrophyMeasures::default(), None, Sex::Male);
        assert!((out.qrs_ms - 100.0).abs() < 1e-9);
        assert!(!out.lvh_sokolow);
        assert!(!out.lvh_cornell_product);
    }
}
