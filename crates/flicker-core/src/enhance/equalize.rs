use ndarray::Array2;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::frame::{max_value, Sample};

/// Global histogram equalization.
///
/// Builds a histogram with one bin per representable level, then maps each
/// level `v` to `round(levels * cdf(v) / total)`, clamped to the full range.
/// Integer arithmetic only; samples outside `[0, max]` are clamped first.
pub fn equalize_histogram(data: &Array2<Sample>, bit_depth: u8) -> Array2<Sample> {
    let full = max_value(bit_depth);
    let levels = full as usize + 1;
    let total = data.len() as u64;
    if total == 0 {
        return data.clone();
    }

    let mut hist = vec![0u64; levels];
    for &v in data.iter() {
        hist[v.clamp(0, full) as usize] += 1;
    }

    let mut lut = vec![0 as Sample; levels];
    let mut cdf = 0u64;
    for (level, count) in hist.iter().enumerate() {
        cdf += count;
        let mapped = (levels as u64 * cdf + total / 2) / total;
        lut[level] = (mapped as Sample).min(full);
    }

    let mut out = data.clone();
    let map = |v: &mut Sample| *v = lut[(*v).clamp(0, full) as usize];
    if data.len() >= PARALLEL_PIXEL_THRESHOLD {
        out.par_map_inplace(map);
    } else {
        out.map_inplace(map);
    }
    out
}
