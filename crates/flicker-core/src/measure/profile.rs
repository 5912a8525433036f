use ndarray::Array2;

use crate::config::LineEndpoints;
use crate::frame::Sample;

/// Sample the frame along a straight line, nearest-neighbour, one sample per
/// pixel step along the longer axis (both endpoints included).
///
/// Returns `None` if either endpoint lies outside the frame.
pub fn line_profile(data: &Array2<Sample>, line: &LineEndpoints) -> Option<Vec<Sample>> {
    let (h, w) = data.dim();
    let (x0, y0) = line.start;
    let (x1, y1) = line.end;
    if x0 >= w || x1 >= w || y0 >= h || y1 >= h {
        return None;
    }

    let dx = x1 as f64 - x0 as f64;
    let dy = y1 as f64 - y0 as f64;
    let steps = dx.abs().max(dy.abs()) as usize;
    if steps == 0 {
        return Some(vec![data[[y0, x0]]]);
    }

    let profile = (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let x = (x0 as f64 + t * dx).round() as usize;
            let y = (y0 as f64 + t * dy).round() as usize;
            data[[y.min(h - 1), x.min(w - 1)]]
        })
        .collect();
    Some(profile)
}
