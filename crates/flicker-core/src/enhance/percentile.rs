use ndarray::{s, Array2};

use crate::config::Roi;
use crate::frame::Sample;

use super::basic::rescale_range;

/// Percentile clip: saturate samples outside the `[p_low, p_high]` percentile
/// values, then stretch the remaining span onto the full range.
///
/// Percentiles are in [0, 100]. When `roi` is given (and fits the frame) the
/// percentile values come from that sub-window only; the clip is still
/// applied to the whole frame.
pub fn percentile_clip(
    data: &Array2<Sample>,
    p_low: f32,
    p_high: f32,
    roi: Option<&Roi>,
    bit_depth: u8,
) -> Array2<Sample> {
    let (px_low, px_high) = match roi {
        Some(r) if r.is_enabled() && r.fits(data.dim()) => {
            let view = data.slice(s![r.y..r.y + r.height, r.x..r.x + r.width]);
            percentile_bounds(view.iter().copied().collect(), p_low, p_high)
        }
        _ => percentile_bounds(data.iter().copied().collect(), p_low, p_high),
    };
    rescale_range(data, px_low, px_high, bit_depth)
}

/// Sample values at the two percentiles, using linear interpolation between
/// closest ranks and rounding to the nearest integer.
pub fn percentile_bounds(mut values: Vec<Sample>, p_low: f32, p_high: f32) -> (Sample, Sample) {
    if values.is_empty() {
        return (0, 0);
    }
    let low = percentile(&mut values, p_low);
    let high = percentile(&mut values, p_high);
    (low, high.max(low))
}

/// Single percentile of `values` (reorders the slice).
///
/// Uses `select_nth_unstable` for O(n) selection without a full sort.
pub fn percentile(values: &mut [Sample], p: f32) -> Sample {
    let n = values.len();
    if n == 0 {
        return 0;
    }
    let rank = f64::from(p.clamp(0.0, 100.0)) / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;

    let (_, &mut lo_val, upper) = values.select_nth_unstable(lo);
    if frac == 0.0 || upper.is_empty() {
        return lo_val;
    }
    // Next order statistic is the minimum of the upper partition.
    let hi_val = upper.iter().copied().min().unwrap_or(lo_val);
    (f64::from(lo_val) + frac * f64::from(hi_val - lo_val)).round() as Sample
}
