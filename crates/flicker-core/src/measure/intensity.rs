use ndarray::{s, Array2};

use crate::config::Roi;
use crate::frame::Sample;

/// Mean sample value of the whole frame.
pub fn mean_intensity(data: &Array2<Sample>) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: i64 = data.iter().map(|&v| i64::from(v)).sum();
    sum as f64 / data.len() as f64
}

/// Mean sample value inside `roi`, or `None` if the ROI is disabled or does
/// not fit the frame.
pub fn roi_mean(data: &Array2<Sample>, roi: &Roi) -> Option<f64> {
    if !roi.is_enabled() || !roi.fits(data.dim()) {
        return None;
    }
    let view = data.slice(s![roi.y..roi.y + roi.height, roi.x..roi.x + roi.width]);
    let sum: i64 = view.iter().map(|&v| i64::from(v)).sum();
    Some(sum as f64 / view.len() as f64)
}
