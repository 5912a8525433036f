use ndarray::{Array2, Zip};

use crate::error::{FlickerError, Result};
use crate::frame::{Frame, Sample};

/// Integer mean across a sequence of same-shaped sample arrays.
///
/// Each output pixel is `floor(sum / count)`. Sums are accumulated in i64, so
/// 16-bit samples cannot overflow for any supported averaging depth.
pub fn int_mean<'a, I>(arrays: I) -> Result<Array2<Sample>>
where
    I: IntoIterator<Item = &'a Array2<Sample>>,
{
    let mut iter = arrays.into_iter();
    let first = iter.next().ok_or(FlickerError::EmptyStack)?;
    let dim = first.dim();

    let mut sum = first.mapv(i64::from);
    let mut count: i64 = 1;

    for data in iter {
        if data.dim() != dim {
            return Err(FlickerError::DimensionMismatch {
                expected: dim,
                actual: data.dim(),
            });
        }
        Zip::from(&mut sum).and(data).for_each(|s, &v| *s += i64::from(v));
        count += 1;
    }

    Ok(sum.mapv(|s| s.div_euclid(count) as Sample))
}

/// Stack frames by integer mean. Metadata is taken from the newest frame.
pub fn mean_stack(frames: &[Frame]) -> Result<Frame> {
    let last = frames.last().ok_or(FlickerError::EmptyStack)?;
    let data = int_mean(frames.iter().map(|f| &f.data))?;
    Ok(Frame {
        data,
        index: last.index,
        timestamp_us: last.timestamp_us,
        bit_depth: last.bit_depth,
    })
}
