use ndarray::{Array2, Zip};

use crate::error::{FlickerError, Result};
use crate::frame::{max_value, Sample};

/// Subtract a background frame from a single live frame.
///
/// Negative results clamp to 0 instead of wrapping.
pub fn subtract_background(data: &Array2<Sample>, background: &Array2<Sample>) -> Result<Array2<Sample>> {
    check_dims(data, background)?;
    Ok(Zip::from(data)
        .and(background)
        .map_collect(|&v, &bg| (v - bg).max(0)))
}

/// Subtract a background frame from a difference image and re-centre the
/// result around mid-grey: `clamp((d - bg + half) / 2, 0, max)`.
pub fn subtract_background_difference(
    data: &Array2<Sample>,
    background: &Array2<Sample>,
    bit_depth: u8,
) -> Result<Array2<Sample>> {
    check_dims(data, background)?;
    let full = max_value(bit_depth);
    let half = (full + 1) / 2;
    Ok(Zip::from(data)
        .and(background)
        .map_collect(|&d, &bg| ((d - bg + half).div_euclid(2)).clamp(0, full)))
}

fn check_dims(data: &Array2<Sample>, background: &Array2<Sample>) -> Result<()> {
    if data.dim() != background.dim() {
        return Err(FlickerError::DimensionMismatch {
            expected: data.dim(),
            actual: background.dim(),
        });
    }
    Ok(())
}
