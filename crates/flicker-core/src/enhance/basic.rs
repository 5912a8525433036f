use ndarray::Array2;

use crate::frame::{max_value, Sample};

/// Linear rescale mapping `[0, max(frame)]` onto the full range of `bit_depth`.
///
/// Negative samples (from difference images) clamp to 0. A frame with no
/// positive sample is returned as all zeros.
pub fn rescale_to_max(data: &Array2<Sample>, bit_depth: u8) -> Array2<Sample> {
    let frame_max = data.iter().copied().max().unwrap_or(0);
    if frame_max <= 0 {
        return Array2::zeros(data.dim());
    }
    rescale_range(data, 0, frame_max, bit_depth)
}

/// Clamp samples to `[low, high]` and stretch that span onto the full range.
///
/// The span is at least 1, so `low == high` never divides by zero.
pub fn rescale_range(data: &Array2<Sample>, low: Sample, high: Sample, bit_depth: u8) -> Array2<Sample> {
    let full = i64::from(max_value(bit_depth));
    let low = i64::from(low);
    let high = i64::from(high).max(low);
    let span = (high - low).max(1);

    data.mapv(|v| {
        let v = i64::from(v).clamp(low, high);
        ((v - low) * full / span) as Sample
    })
}
