use ndarray::Array2;

use flicker_core::frame::Frame;
use flicker_core::io::{load_image, save_frame, save_image, save_png, save_tiff};

#[test]
fn test_tiff_round_trip_at_full_depth() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.tiff");

    let data = Array2::from_shape_fn((6, 9), |(r, c)| (r * 1000 + c * 7) as i32);
    save_tiff(&data, 16, &path).unwrap();

    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.bit_depth, 16);
    assert_eq!(loaded.dim(), (6, 9));
    assert_eq!(loaded.data, data);
}

#[test]
fn test_low_depth_is_stretched_to_sixteen_bits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.tif");

    let data = Array2::from_shape_fn((2, 2), |(r, c)| if r + c == 0 { 0 } else { 4095 });
    save_image(&data, 12, &path).unwrap();

    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.data[[0, 0]], 0);
    assert_eq!(loaded.data[[1, 1]], 65535);
}

#[test]
fn test_png_is_eight_bit_and_clamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");

    let data = ndarray::array![[-10, 0], [128, 300]];
    save_png(&data, 8, &path).unwrap();

    let loaded = load_image(&path).unwrap();
    // 8-bit samples widen by 257 on load.
    assert_eq!(loaded.data[[0, 0]], 0);
    assert_eq!(loaded.data[[1, 0]], 128 * 257);
    assert_eq!(loaded.data[[1, 1]], 255 * 257);
}

#[test]
fn test_save_frame_uses_extension() {
    let dir = tempfile::tempdir().unwrap();
    let frame = Frame::new(Array2::from_elem((3, 3), 500), 4, 0).with_bit_depth(10);

    let png = dir.path().join("a.png");
    save_frame(&frame, &png).unwrap();
    assert!(png.exists());

    let other = dir.path().join("a.dat");
    save_frame(&frame, &other).unwrap();
    assert!(other.exists());
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_image(&dir.path().join("missing.tiff")).is_err());
}
