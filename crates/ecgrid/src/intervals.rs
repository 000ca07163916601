//! Per-beat onset/offset/P-onset/T-end search and interval aggregation.
//!
//! Boundary search runs on the normalized absolute first derivative plus
//! a short-window energy signal, with adaptive thresholds blended from a
//! high percentile and the window maximum. Beats missing a boundary simply
//! omit the affected interval; partial results are expected.
//!
//! The QRS duration clamp (raw results outside [60, 200] ms pull the
//! offset to onset + 80 / + 200 ms) is a deliberate robustness policy
//! inherited from the reference measurements. It biases aggregates toward
//! plausible values instead of discarding the beat; revisit if per-beat
//! rejection becomes preferable.

use serde::{Deserialize, Serialize};

use crate::beats::{moving_avg, rr_intervals};
use crate::trace::{median, smooth};

/// Tunables for boundary search. Durations in seconds unless suffixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// Moving-average window (samples) applied before differentiation.
    pub smooth_window: usize,
    /// Search extent before the R peak.
    pub pre_window_s: f64,
    /// Search extent after the R peak.
    pub post_window_s: f64,
    /// Energy signal window.
    pub energy_window_s: f64,
    /// Hold duration for the onset/offset stability check.
    pub stability_hold_s: f64,
    /// Gradient level below which the signal counts as quiet.
    pub stability_threshold: f64,
    /// Clamp floor for the adaptive thresholds.
    pub threshold_floor: f64,
    /// Clamp ceiling for the adaptive thresholds.
    pub threshold_ceil: f64,
    /// How far before QRS onset to search for the P wave.
    pub p_search_s: f64,
    /// Gradient level the P wave must sustain.
    pub p_threshold: f64,
    /// P-wave sustain duration.
    pub p_hold_s: f64,
    /// How far after QRS offset to search for the T end.
    pub t_search_s: f64,
    /// Gradient level below which the T wave has ended.
    pub t_threshold: f64,
    /// T-end quiet duration.
    pub t_hold_s: f64,
    /// QRS clamp band (milliseconds).
    pub qrs_min_ms: f64,
    pub qrs_max_ms: f64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            smooth_window: 7,
            pre_window_s: 0.16,
            post_window_s: 0.18,
            energy_window_s: 0.04,
            stability_hold_s: 0.015,
            stability_threshold: 0.14,
            threshold_floor: 0.08,
            threshold_ceil: 0.6,
            p_search_s: 0.32,
            p_threshold: 0.06,
            p_hold_s: 0.02,
            t_search_s: 0.62,
            t_threshold: 0.10,
            t_hold_s: 0.03,
            qrs_min_ms: 60.0,
            qrs_max_ms: 200.0,
        }
    }
}

/// Boundaries and derived durations for one beat. Absent boundaries leave
/// the dependent intervals unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatIntervals {
    /// R-peak sample index.
    pub r_peak: usize,
    pub onset: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_onset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_end: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qrs_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qt_ms: Option<f64>,
}

/// Median interval durations across beats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntervalMedians {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qrs_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qt_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qtc_bazett_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qtc_fridericia_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr_s: Option<f64>,
}

/// Per-lead interval measurement result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntervalReport {
    pub per_beat: Vec<BeatIntervals>,
    pub median: IntervalMedians,
}

/// Bazett correction: QT / sqrt(RR seconds).
pub fn qtc_bazett(qt_ms: f64, rr_s: f64) -> Option<f64> {
    (rr_s > 1e-9).then(|| qt_ms / rr_s.sqrt())
}

/// Fridericia correction: QT / cbrt(RR seconds).
pub fn qtc_fridericia(qt_ms: f64, rr_s: f64) -> Option<f64> {
    (rr_s > 1e-9).then(|| qt_ms / rr_s.cbrt())
}

/// First difference with the first sample prepended (same length).
fn gradient(x: &[f64]) -> Vec<f64> {
    let mut g = Vec::with_capacity(x.len());
    if x.is_empty() {
        return g;
    }
    g.push(0.0);
    for i in 1..x.len() {
        g.push(x[i] - x[i - 1]);
    }
    g
}

/// Min-max normalization to [0, 1] with an epsilon guard.
fn norm01(x: &[f64]) -> Vec<f64> {
    let lo = x.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = (hi - lo) + 1e-9;
    x.iter().map(|v| (v - lo) / span).collect()
}

/// Normalized short-window energy of the centered signal.
fn energy(x: &[f64], win: usize) -> Vec<f64> {
    let win = win.max(3) | 1;
    let sq: Vec<f64> = x.iter().map(|v| v * v).collect();
    norm01(&moving_avg(&sq, win))
}

/// Linear-interpolated quantile of an unsorted slice.
fn quantile(x: &[f64], q: f64) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Centered, smoothed working copy of a raw trace.
fn conditioned(trace: &[f64], win: usize) -> Vec<f64> {
    let med = median(trace).unwrap_or(0.0);
    let centered: Vec<f64> = trace.iter().map(|v| v - med).collect();
    smooth(&centered, win)
}

/// Walk from `start` in `direction` until the gradient stays quiet
/// (`< thr`) for `hold` samples; falls back to `start`.
fn stable_point(gabs: &[f64], start: usize, direction: i32, hold: usize, thr: f64) -> usize {
    let n = gabs.len();
    if n == 0 {
        return start;
    }
    if direction < 0 {
        for i in (0..=start.min(n - 1)).rev() {
            let lo = i.saturating_sub(hold);
            if gabs[lo..i].iter().all(|&v| v < thr) {
                return i;
            }
        }
    } else {
        for i in start.min(n - 1)..n {
            let hi = (i + hold).min(n);
            if gabs[i..hi].iter().all(|&v| v < thr) {
                return i;
            }
        }
    }
    start
}

/// QRS onset/offset for one beat, with the duration clamp applied.
pub fn find_onset_offset(
    trace: &[f64],
    r_idx: usize,
    fs: f64,
    cfg: &IntervalConfig,
) -> (usize, usize) {
    let n = trace.len();
    if n == 0 || fs <= 0.0 {
        return (0, 0);
    }
    let y = conditioned(trace, cfg.smooth_window);
    let gabs = norm01(&gradient(&y).iter().map(|v| v.abs()).collect::<Vec<_>>());
    let e = energy(&y, (cfg.energy_window_s * fs) as usize);

    let r = r_idx.min(n - 1);
    let pre = (cfg.pre_window_s * fs) as usize;
    let post = (cfg.post_window_s * fs) as usize;
    let i0 = r.saturating_sub(pre);
    let i1 = (r + post).min(n - 1);
    let gw = &gabs[i0..=i1];
    let ew = &e[i0..=i1];

    let blend = |w: &[f64]| {
        let max = w.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (0.25 * quantile(w, 0.98) + 0.05 * max).clamp(cfg.threshold_floor, cfg.threshold_ceil)
    };
    let thr_g = blend(gw);
    let thr_e = blend(ew);

    let hold = ((cfg.stability_hold_s * fs) as usize).max(1);
    let center = r - i0;

    let mut onset = i0;
    for i in (0..=center).rev() {
        if gw[i] > thr_g || ew[i] > thr_e {
            onset = i0 + stable_point(gw, i, -1, hold, cfg.stability_threshold);
            break;
        }
    }
    let mut offset = i1;
    for i in center..gw.len() {
        if gw[i] > thr_g || ew[i] > thr_e {
            offset = i0 + stable_point(gw, i, 1, hold, cfg.stability_threshold);
            break;
        }
    }

    // Duration clamp: prefer a plausible underestimate over an
    // implausible raw result.
    let qrs_ms = (offset.saturating_sub(onset)) as f64 * 1000.0 / fs;
    if qrs_ms < cfg.qrs_min_ms {
        offset = (onset + (0.08 * fs) as usize).min(n - 1);
    } else if qrs_ms > cfg.qrs_max_ms {
        offset = (onset + (cfg.qrs_max_ms / 1000.0 * fs) as usize).min(n - 1);
    }
    (onset, offset)
}

/// P-wave onset: searched backward from QRS onset for a sustained
/// gradient rise. `None` when nothing qualifies in range.
pub fn find_p_onset(
    trace: &[f64],
    qrs_onset: usize,
    fs: f64,
    cfg: &IntervalConfig,
) -> Option<usize> {
    let n = trace.len();
    if n == 0 || fs <= 0.0 || qrs_onset == 0 {
        return None;
    }
    let y = conditioned(trace, cfg.smooth_window);
    let gabs = norm01(&gradient(&y).iter().map(|v| v.abs()).collect::<Vec<_>>());

    let i0 = qrs_onset.saturating_sub((cfg.p_search_s * fs) as usize);
    let hold = ((cfg.p_hold_s * fs) as usize).max(1);
    let qrs_onset = qrs_onset.min(n - 1);
    for i in (i0 + 1..=qrs_onset).rev() {
        let lo = i.saturating_sub(hold);
        if gabs[lo..i].iter().all(|&v| v > cfg.p_threshold) {
            return Some(i.saturating_sub(hold));
        }
    }
    None
}

/// T-wave end: first sustained-quiet point after QRS offset. `None`
/// when the gradient never settles inside the search range.
pub fn find_t_end(trace: &[f64], qrs_offset: usize, fs: f64, cfg: &IntervalConfig) -> Option<usize> {
    let n = trace.len();
    if n == 0 || fs <= 0.0 {
        return None;
    }
    let y = conditioned(trace, cfg.smooth_window);
    let gabs = norm01(&gradient(&y).iter().map(|v| v.abs()).collect::<Vec<_>>());

    let hold = ((cfg.t_hold_s * fs) as usize).max(1);
    let i1 = (qrs_offset + (cfg.t_search_s * fs) as usize).min(n - 1);
    for i in (qrs_offset + hold)..=i1 {
        if gabs[i - hold..i].iter().all(|&v| v < cfg.t_threshold) {
            return Some(i);
        }
    }
    None
}

/// Measure PR/QRS/QT for every detected beat and aggregate medians.
///
/// Beats missing a P onset or T end omit PR / QT for that beat. An empty
/// peak list produces an empty report.
pub fn measure_intervals(
    trace: &[f64],
    peaks: &[usize],
    px_per_sec: f64,
    cfg: &IntervalConfig,
) -> IntervalReport {
    let fs = px_per_sec;
    if trace.is_empty() || peaks.is_empty() || fs <= 0.0 {
        return IntervalReport::default();
    }
    let work = conditioned(trace, cfg.smooth_window);

    let mut per_beat = Vec::with_capacity(peaks.len());
    for &r in peaks {
        let (onset, offset) = find_onset_offset(&work, r, fs, cfg);
        let p_onset = find_p_onset(&work, onset, fs, cfg);
        let t_end = find_t_end(&work, offset, fs, cfg);

        let to_ms = |a: usize, b: usize| (b.saturating_sub(a)) as f64 * 1000.0 / fs;
        per_beat.push(BeatIntervals {
            r_peak: r,
            onset,
            offset,
            p_onset,
            t_end,
            pr_ms: p_onset.map(|p| to_ms(p, onset)),
            qrs_ms: Some(to_ms(onset, offset)),
            qt_ms: t_end.map(|t| to_ms(onset, t)),
        });
    }

    let rr = rr_intervals(peaks, fs);
    let rr_med = median(&rr);

    let collect = |f: fn(&BeatIntervals) -> Option<f64>| -> Vec<f64> {
        per_beat.iter().filter_map(f).collect()
    };
    let pr_med = median(&collect(|b| b.pr_ms));
    let qrs_med = median(&collect(|b| b.qrs_ms));
    let qt_med = median(&collect(|b| b.qt_ms));

    let qtc_b = qt_med.zip(rr_med).and_then(|(qt, rr)| qtc_bazett(qt, rr));
    let qtc_f = qt_med
        .zip(rr_med)
        .and_then(|(qt, rr)| qtc_fridericia(qt, rr));

    IntervalReport {
        per_beat,
        median: IntervalMedians {
            pr_ms: pr_med,
            qrs_ms: qrs_med,
            qt_ms: qt_med,
            qtc_bazett_ms: qtc_b,
            qtc_fridericia_ms: qtc_f,
            rr_s: rr_med,
        },
    }
}
