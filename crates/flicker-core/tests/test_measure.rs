use approx::assert_relative_eq;
use ndarray::{array, Array2};

use flicker_core::config::{LineEndpoints, Roi};
use flicker_core::measure::{histogram, line_profile, mean_intensity, roi_mean};

#[test]
fn test_mean_intensity() {
    let data = array![[1, 2], [3, 4]];
    assert_relative_eq!(mean_intensity(&data), 2.5);
    assert_relative_eq!(mean_intensity(&Array2::<i32>::zeros((0, 0))), 0.0);
}

#[test]
fn test_roi_mean_inside_and_outside() {
    let data = Array2::from_shape_fn((6, 6), |(r, c)| (r * 6 + c) as i32);
    let roi = Roi::new(1, 2, 2, 2);
    // rows 2..4, cols 1..3 -> 13, 14, 19, 20
    assert_relative_eq!(roi_mean(&data, &roi).unwrap(), 16.5);

    assert!(roi_mean(&data, &Roi::default()).is_none());
    assert!(roi_mean(&data, &Roi::new(5, 5, 2, 2)).is_none());
}

#[test]
fn test_line_profile_horizontal_and_diagonal() {
    let data = Array2::from_shape_fn((5, 5), |(r, c)| (r * 10 + c) as i32);
    let flat = LineEndpoints {
        start: (0, 2),
        end: (4, 2),
    };
    assert_eq!(line_profile(&data, &flat).unwrap(), vec![20, 21, 22, 23, 24]);

    let diag = LineEndpoints {
        start: (4, 4),
        end: (0, 0),
    };
    assert_eq!(line_profile(&data, &diag).unwrap(), vec![44, 33, 22, 11, 0]);

    let point = LineEndpoints {
        start: (1, 1),
        end: (1, 1),
    };
    assert_eq!(line_profile(&data, &point).unwrap(), vec![11]);
}

#[test]
fn test_line_profile_out_of_bounds() {
    let data = Array2::<i32>::zeros((4, 4));
    let line = LineEndpoints {
        start: (0, 0),
        end: (4, 0),
    };
    assert!(line_profile(&data, &line).is_none());
}

#[test]
fn test_histogram_bins_and_clamping() {
    let data = array![[0, 1, 2, 3], [252, 255, 300, -4]];
    let hist = histogram(&data, 64, 8);
    assert_eq!(hist.bin_width, 4);
    assert_eq!(hist.counts.len(), 64);
    assert_eq!(hist.total(), 8);
    // 0, 1, 2, 3 and the clamped -4
    assert_eq!(hist.counts[0], 5);
    // 252, 255 and the clamped 300
    assert_eq!(hist.counts[63], 3);
    assert_eq!(hist.bin_starts()[1], 4);
}
