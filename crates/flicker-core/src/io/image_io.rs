use std::path::Path;

use image::{GrayImage, ImageBuffer, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::{FlickerError, Result};
use crate::frame::{max_value, Frame, Sample};

/// Rescale a sample from `[0, max(bit_depth)]` to `[0, out_max]`, clamping
/// negatives and overshoot.
fn scale(v: Sample, full: Sample, out_max: u32) -> u32 {
    (v.clamp(0, full) as u64 * out_max as u64 / full as u64) as u32
}

/// Save samples as 16-bit grayscale TIFF, stretched from `bit_depth`.
pub fn save_tiff(data: &Array2<Sample>, bit_depth: u8, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let full = max_value(bit_depth);
    let pixels: Vec<u16> = data
        .iter()
        .map(|&v| scale(v, full, u16::MAX as u32) as u16)
        .collect();

    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or(FlickerError::InvalidDimensions { width: w, height: h })?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save samples as 8-bit grayscale PNG.
pub fn save_png(data: &Array2<Sample>, bit_depth: u8, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let full = max_value(bit_depth);

    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in data.indexed_iter() {
        img.put_pixel(col as u32, row as u32, Luma([scale(v, full, 255) as u8]));
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save samples, choosing format from file extension. Unknown extensions get
/// TIFF.
pub fn save_image(data: &Array2<Sample>, bit_depth: u8, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(data, bit_depth, path),
        _ => save_tiff(data, bit_depth, path),
    }
}

pub fn save_frame(frame: &Frame, path: &Path) -> Result<()> {
    save_image(&frame.data, frame.bit_depth, path)
}

/// Load an image file as a 16-bit grayscale frame with index 0.
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Err(FlickerError::InvalidDimensions {
            width: w as usize,
            height: h as usize,
        });
    }
    let data = Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] as Sample
    });

    Ok(Frame::new(data, 0, 0).with_bit_depth(16))
}
