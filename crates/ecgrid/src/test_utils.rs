//! Shared synthetic-image and synthetic-signal helpers for unit tests.

use image::{GrayImage, Luma};

use crate::calib::ContentBBox;

/// Render a page with grid lines every `period` pixels on both axes.
pub(crate) fn draw_grid_image(w: u32, h: u32, period: u32, line_pix: u8, bg_pix: u8) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([bg_pix]));
    for y in 0..h {
        for x in 0..w {
            if x % period == 0 || y % period == 0 {
                img.put_pixel(x, y, Luma([line_pix]));
            }
        }
    }
    img
}

/// Synthetic single-lead trace in raw centerline coordinates (row index,
/// origin top): baseline plus P/QRS/T morphology per beat.
///
/// `pr_ms` is P-onset to QRS-onset, `qrs_ms` the QRS duration, `qt_ms`
/// QRS-onset to T-end. Upward paper deflections are lower row values.
pub(crate) fn synth_ecg_trace(
    fs: f64,
    bpm: f64,
    duration_s: f64,
    pr_ms: f64,
    qrs_ms: f64,
    qt_ms: f64,
) -> Vec<f64> {
    let n = (fs * duration_s) as usize;
    let baseline: f64 = 100.0;
    let mut trace = vec![baseline; n];

    let period = 60.0 / bpm; // seconds per beat
    let qrs_s = qrs_ms / 1000.0;
    let pr_s = pr_ms / 1000.0;
    let qt_s = qt_ms / 1000.0;
    let p_rise = 0.025;
    let qrs_amp = 40.0;
    let p_amp = 6.0;
    let t_amp = 19.0;

    let mut t_r = 0.5; // first R at 0.5 s
    while t_r < duration_s {
        let qrs_on = t_r - 0.4 * qrs_s;
        let qrs_off = qrs_on + qrs_s;
        let p_on = qrs_on - pr_s;
        // T lands slightly before the nominal QT end so the post-T
        // baseline is already quiet at `qrs_on + qt_s`.
        let t_fin = qrs_on + qt_s - 0.035;

        for i in 0..n {
            let t = i as f64 / fs;
            let mut dip = 0.0;

            // P wave: sharp 25 ms rise, then slow decay down to QRS onset
            if t >= p_on && t < qrs_on {
                if t < p_on + p_rise {
                    dip += p_amp * (t - p_on) / p_rise;
                } else {
                    let fall = (qrs_on - p_on - p_rise).max(1e-9);
                    dip += p_amp * (qrs_on - t) / fall;
                }
            }
            // QRS: triangular spike peaking at t_r
            if t >= qrs_on && t < qrs_off {
                let tri = if t < t_r {
                    (t - qrs_on) / (t_r - qrs_on).max(1e-9)
                } else {
                    (qrs_off - t) / (qrs_off - t_r).max(1e-9)
                };
                dip += qrs_amp * tri.max(0.0);
            }
            // T wave: triangle spanning QRS offset to just before QT end
            if t >= qrs_off && t < t_fin {
                let mid = 0.5 * (qrs_off + t_fin);
                let half = (mid - qrs_off).max(1e-9);
                let tri = 1.0 - ((t - mid).abs() / half);
                dip += t_amp * tri.max(0.0);
            }

            if dip > 0.0 {
                trace[i] = (trace[i]).min(baseline - dip);
            }
        }
        t_r += period;
    }
    trace
}

/// Burn a trace into a crop as dark ink, one pixel per column.
pub(crate) fn draw_trace_into(img: &mut GrayImage, bbox: &ContentBBox, trace: &[f64]) {
    let w = bbox.width() as usize;
    let h = bbox.height();
    if w == 0 || h == 0 || trace.is_empty() {
        return;
    }
    let t_min = trace.iter().cloned().fold(f64::INFINITY, f64::min);
    let t_max = trace.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = (t_max - t_min).max(1.0);
    for x in 0..w {
        let ti = x * trace.len() / w;
        // map trace rows into the central 70% of the crop height
        let frac = (trace[ti] - t_min) / span;
        let y = bbox.y0 + (h as f64 * (0.15 + 0.7 * frac)) as u32;
        let px = bbox.x0 + x as u32;
        if px < img.width() && y < img.height() {
            img.put_pixel(px, y, Luma([0]));
            if y + 1 < img.height() {
                img.put_pixel(px, y + 1, Luma([0]));
            }
        }
    }
}
