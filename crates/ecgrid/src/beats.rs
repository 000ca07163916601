//! R-peak detection over a 1D trace: two strategies behind one enum.
//!
//! Both detectors output a strictly increasing list of sample indices and
//! return an empty list when nothing qualifies. The sampling rate is the
//! pixels-per-second proxy derived from the grid calibration and paper
//! speed.

use serde::{Deserialize, Serialize};

use crate::trace::{inverted_baseline, median};

/// Configuration for the basic z-score detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicDetectorConfig {
    /// z-score threshold for a sample to qualify as a peak.
    pub z_threshold: f64,
    /// Maximum physiological heart rate; sets the minimum peak spacing.
    pub max_bpm: f64,
}

impl Default for BasicDetectorConfig {
    fn default() -> Self {
        Self {
            z_threshold: 2.0,
            max_bpm: 220.0,
        }
    }
}

/// Configuration for the Pan-Tompkins-style adaptive detector.
///
/// Window durations are in milliseconds and converted to samples with the
/// per-image sampling rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanTompkinsConfig {
    /// Short moving-average window (high-pass side of the band limit).
    pub lo_ms: f64,
    /// Long moving-average window (DC removal side of the band limit).
    pub hi_ms: f64,
    /// Derivative smoothing window.
    pub deriv_ms: f64,
    /// Moving-window integration length.
    pub integ_ms: f64,
    /// Refractory period between accepted peaks.
    pub refractory_ms: f64,
    /// Length of the threshold learning phase (seconds).
    pub learn_sec: f64,
}

impl Default for PanTompkinsConfig {
    fn default() -> Self {
        Self {
            lo_ms: 12.0,
            hi_ms: 180.0,
            deriv_ms: 8.0,
            integ_ms: 150.0,
            refractory_ms: 200.0,
            learn_sec: 2.0,
        }
    }
}

/// Beat-detection strategy, selectable by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BeatDetector {
    Basic(BasicDetectorConfig),
    PanTompkins(PanTompkinsConfig),
}

impl Default for BeatDetector {
    fn default() -> Self {
        BeatDetector::PanTompkins(PanTompkinsConfig::default())
    }
}

impl BeatDetector {
    /// Detect R-peaks in `trace` (raw centerline rows, origin top).
    ///
    /// Deterministic; an empty or degenerate trace yields an empty list.
    pub fn detect(&self, trace: &[f64], px_per_sec: f64) -> Vec<usize> {
        match self {
            BeatDetector::Basic(cfg) => detect_basic(trace, px_per_sec, cfg),
            BeatDetector::PanTompkins(cfg) => detect_pan_tompkins(trace, px_per_sec, cfg),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BeatDetector::Basic(_) => "basic",
            BeatDetector::PanTompkins(_) => "pan_tompkins",
        }
    }
}

/// Same-mode moving average with a fixed divisor.
pub(crate) fn moving_avg(x: &[f64], win: usize) -> Vec<f64> {
    let win = win.max(1);
    let half = win / 2;
    let n = x.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + win - half).min(n);
        let sum: f64 = x[lo..hi].iter().sum();
        out.push(sum / win as f64);
    }
    out
}

/// Windows in samples for a duration in milliseconds, at least 1.
fn ms_to_samples(ms: f64, fs: f64) -> usize {
    ((ms * fs / 1000.0) as usize).max(1)
}

/// Basic detector: invert, z-score, local maxima above a fixed threshold
/// with a max-heart-rate minimum spacing.
fn detect_basic(trace: &[f64], px_per_sec: f64, cfg: &BasicDetectorConfig) -> Vec<usize> {
    let n = trace.len();
    if n < 3 || px_per_sec <= 0.0 {
        return Vec::new();
    }
    let inv = inverted_baseline(trace);
    let mean = inv.iter().sum::<f64>() / n as f64;
    let var = inv.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let std = var.sqrt() + 1e-6;
    let z: Vec<f64> = inv.iter().map(|v| (v - mean) / std).collect();

    let min_dist = ((px_per_sec * 60.0 / cfg.max_bpm) as usize).max(1);
    let mut peaks = Vec::new();
    let mut last: i64 = i64::MIN / 2;
    for i in 1..n - 1 {
        if z[i] > cfg.z_threshold && z[i] >= z[i - 1] && z[i] >= z[i + 1] {
            if i as i64 - last >= min_dist as i64 {
                peaks.push(i);
                last = i as i64;
            }
        }
    }
    peaks
}

/// Pan-Tompkins-style detector: band limit, slope energy, integration,
/// adaptive dual-threshold peak picking with a refractory period.
fn detect_pan_tompkins(trace: &[f64], px_per_sec: f64, cfg: &PanTompkinsConfig) -> Vec<usize> {
    let n = trace.len();
    if n < 4 || px_per_sec <= 0.0 {
        return Vec::new();
    }
    let fs = px_per_sec;
    let inv = inverted_baseline(trace);

    // Band limit: short MA minus long MA.
    let lo_win = ms_to_samples(cfg.lo_ms, fs);
    let hi_win = ms_to_samples(cfg.hi_ms, fs).max(lo_win + 1);
    let lo = moving_avg(&inv, lo_win);
    let hi = moving_avg(&inv, hi_win);
    let band: Vec<f64> = lo.iter().zip(&hi).map(|(a, b)| a - b).collect();

    // Smoothed derivative, squared: QRS slope energy.
    let d_win = ms_to_samples(cfg.deriv_ms, fs);
    let mut deriv = Vec::with_capacity(n);
    deriv.push(0.0);
    for i in 1..n {
        deriv.push(band[i] - band[i - 1]);
    }
    let deriv = moving_avg(&deriv, d_win);
    let squared: Vec<f64> = deriv.iter().map(|v| v * v).collect();

    // Moving-window integration, then median/std normalization.
    let i_win = ms_to_samples(cfg.integ_ms, fs);
    let mut integ = moving_avg(&squared, i_win);
    let med = median(&integ).unwrap_or(0.0);
    let var = integ.iter().map(|v| (v - med) * (v - med)).sum::<f64>() / n as f64;
    let std = var.sqrt() + 1e-6;
    for v in &mut integ {
        *v = (*v - med) / std;
    }

    // Adaptive thresholds seeded from the learning window.
    let n_learn = ((cfg.learn_sec * fs) as usize).max(10).min(n);
    let mut learn: Vec<f64> = integ[..n_learn].to_vec();
    learn.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut npk = learn[learn.len() / 2];
    let mut spk = learn[((learn.len() as f64 * 0.95) as usize).min(learn.len() - 1)];
    let mut thr = npk + 0.25 * (spk - npk);

    let refractory = ms_to_samples(cfg.refractory_ms, fs);
    let mut peaks = Vec::new();
    let mut last: i64 = i64::MIN / 2;
    for i in 0..n {
        let yi = integ[i];
        if yi > thr && i as i64 - last >= refractory as i64 {
            let prev = if i > 0 { integ[i - 1] } else { yi };
            let next = integ[(i + 1).min(n - 1)];
            if yi >= prev && yi >= next {
                peaks.push(i);
                last = i as i64;
                spk = 0.875 * spk + 0.125 * yi;
                thr = npk + 0.25 * (spk - npk);
            }
        } else {
            npk = 0.875 * npk + 0.125 * yi;
            thr = npk + 0.25 * (spk - npk);
        }
    }

    // The integrated energy leads the R wave by up to the integration
    // window; snap each candidate to the trace extremum around it.
    let mut refined = Vec::with_capacity(peaks.len());
    let mut last: i64 = i64::MIN / 2;
    for &p in &peaks {
        let lo = p.saturating_sub(i_win);
        let hi = (p + i_win + 1).min(n);
        let mut best = lo;
        for i in lo..hi {
            if inv[i] > inv[best] {
                best = i;
            }
        }
        if best as i64 - last >= refractory as i64 {
            refined.push(best);
            last = best as i64;
        }
    }
    refined
}

/// RR intervals in seconds between consecutive peaks.
pub fn rr_intervals(peaks: &[usize], px_per_sec: f64) -> Vec<f64> {
    if px_per_sec <= 0.0 {
        return Vec::new();
    }
    peaks
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / px_per_sec)
        .collect()
}

/// Heart-rate summary from detected peaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRate {
    pub bpm_mean: f64,
    pub bpm_median: f64,
}

/// Mean/median heart rate; `None` with fewer than two peaks.
pub fn heart_rate(peaks: &[usize], px_per_sec: f64) -> Option<HeartRate> {
    let rr = rr_intervals(peaks, px_per_sec);
    let bpm: Vec<f64> = rr
        .iter()
        .filter(|&&r| r > 1e-6)
        .map(|&r| 60.0 / r)
        .collect();
    if bpm.is_empty() {
        return None;
    }
    Some(HeartRate {
        bpm_mean: bpm.iter().sum::<f64>() / bpm.len() as f64,
        bpm_median: median(&bpm).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::synth_ecg_trace;

    #[test]
    fn basic_detector_finds_synthetic_beats() {
        let fs = 500.0;
        let trace = synth_ecg_trace(fs, 75.0, 6.0, 160.0, 90.0, 380.0);
        let cfg = BasicDetectorConfig::default();
        let peaks = BeatDetector::Basic(cfg).detect(&trace, fs);
        // 75 bpm over 6 s is ~7 beats; allow edge losses.
        assert!((5..=9).contains(&peaks.len()), "n={}", peaks.len());
        assert!(peaks.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn pan_tompkins_finds_expected_rate() {
        let fs = 500.0;
        let trace = synth_ecg_trace(fs, 75.0, 8.0, 160.0, 90.0, 380.0);
        let peaks = BeatDetector::default().detect(&trace, fs);
        let hr = heart_rate(&peaks, fs).expect("heart rate");
        assert!(
            (hr.bpm_median - 75.0).abs() < 15.0,
            "median bpm={}",
            hr.bpm_median
        );
    }

    #[test]
    fn peaks_snap_to_trace_extrema() {
        let fs = 500.0;
        let trace = synth_ecg_trace(fs, 75.0, 8.0, 160.0, 90.0, 380.0);
        let peaks = BeatDetector::default().detect(&trace, fs);
        assert!(!peaks.is_empty());
        // R peaks sit at 0.5 s + k * 0.8 s in the synthetic strip.
        for &p in &peaks {
            let k = ((p as f64 / fs - 0.5) / 0.8).round();
            let expected = (0.5 + 0.8 * k) * fs;
            assert!((p as f64 - expected).abs() <= 3.0, "p={p}");
        }
    }

    #[test]
    fn detector_is_deterministic() {
        let fs = 400.0;
        let trace = synth_ecg_trace(fs, 60.0, 5.0, 160.0, 90.0, 380.0);
        let det = BeatDetector::default();
        let a = det.detect(&trace, fs);
        let b = det.detect(&trace, fs);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn tolerates_pixel_noise() {
        use rand::{Rng, SeedableRng};

        let fs = 500.0;
        let clean = synth_ecg_trace(fs, 75.0, 8.0, 160.0, 90.0, 380.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let noisy: Vec<f64> = clean.iter().map(|v| v + rng.gen_range(-1.0..1.0)).collect();
        let det = BeatDetector::default();
        let clean_peaks = det.detect(&clean, fs);
        let noisy_peaks = det.detect(&noisy, fs);
        let diff = (clean_peaks.len() as i64 - noisy_peaks.len() as i64).abs();
        assert!(diff <= 1, "clean={} noisy={}", clean_peaks.len(), noisy_peaks.len());
    }

    #[test]
    fn refractory_spacing_is_enforced() {
        let fs = 500.0;
        let trace = synth_ecg_trace(fs, 180.0, 5.0, 120.0, 80.0, 300.0);
        let cfg = PanTompkinsConfig::default();
        let min_gap = ((cfg.refractory_ms * fs / 1000.0) as usize).max(1);
        let peaks = BeatDetector::PanTompkins(cfg).detect(&trace, fs);
        assert!(peaks.windows(2).all(|w| w[1] - w[0] >= min_gap));
    }

    #[test]
    fn empty_and_flat_traces_yield_no_beats() {
        let det = BeatDetector::default();
        assert!(det.detect(&[], 250.0).is_empty());
        let flat = vec![12.0; 1000];
        assert!(det.detect(&flat, 250.0).is_empty());
        assert!(BeatDetector::Basic(BasicDetectorConfig::default())
            .detect(&flat, 250.0)
            .is_empty());
    }
}
