use ndarray::{s, Array2, Axis};
use rayon::prelude::*;

use crate::consts::{CLAHE_BINS, CLAHE_TILE_GRID, PARALLEL_PIXEL_THRESHOLD};
use crate::frame::{max_value, Sample};

/// Contrast-limited adaptive histogram equalization (CLAHE).
///
/// The frame is split into a grid of up to 8x8 tiles. Each tile gets its own
/// clipped, redistributed histogram and lookup table; every output pixel is a
/// bilinear blend of the four nearest tile mappings.
///
/// `clip_limit` is a fraction of the tile pixel count (0.01-0.05 typical).
/// `0.0` disables clipping, which degenerates to plain tile-local
/// equalization.
pub fn equalize_adaptive(data: &Array2<Sample>, clip_limit: f32, bit_depth: u8) -> Array2<Sample> {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return data.clone();
    }
    let full = max_value(bit_depth);

    let rows = tile_bounds(h, CLAHE_TILE_GRID.min(h));
    let cols = tile_bounds(w, CLAHE_TILE_GRID.min(w));

    let tiles: Vec<(usize, usize)> = (0..rows.len())
        .flat_map(|ty| (0..cols.len()).map(move |tx| (ty, tx)))
        .collect();

    let luts: Vec<Vec<f32>> = tiles
        .par_iter()
        .map(|&(ty, tx)| {
            let (r0, r1) = rows[ty];
            let (c0, c1) = cols[tx];
            let tile = data.slice(s![r0..r1, c0..c1]);
            let mut hist = [0u32; CLAHE_BINS];
            for &v in tile.iter() {
                hist[bin_of(v, full)] += 1;
            }
            tile_lut(&mut hist, tile.len(), clip_limit, full)
        })
        .collect();

    let row_centres: Vec<f32> = rows.iter().map(|&(a, b)| (a + b) as f32 / 2.0).collect();
    let col_centres: Vec<f32> = cols.iter().map(|&(a, b)| (a + b) as f32 / 2.0).collect();
    let col_weights: Vec<(usize, usize, f32)> = (0..w)
        .map(|c| interpolation_weights(&col_centres, c as f32 + 0.5))
        .collect();

    let n_cols = cols.len();
    let mut out = Array2::<Sample>::zeros((h, w));

    let map_row = |r: usize, mut out_row: ndarray::ArrayViewMut1<Sample>| {
        let (y0, y1, wy) = interpolation_weights(&row_centres, r as f32 + 0.5);
        for (c, o) in out_row.iter_mut().enumerate() {
            let (x0, x1, wx) = col_weights[c];
            let bin = bin_of(data[[r, c]], full);
            let top = luts[y0 * n_cols + x0][bin] * (1.0 - wx) + luts[y0 * n_cols + x1][bin] * wx;
            let bottom =
                luts[y1 * n_cols + x0][bin] * (1.0 - wx) + luts[y1 * n_cols + x1][bin] * wx;
            *o = (top * (1.0 - wy) + bottom * wy).round() as Sample;
        }
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(r, row)| map_row(r, row));
    } else {
        for (r, row) in out.axis_iter_mut(Axis(0)).enumerate() {
            map_row(r, row);
        }
    }

    out
}

/// Split `len` into `n` contiguous, non-empty `(start, end)` ranges.
fn tile_bounds(len: usize, n: usize) -> Vec<(usize, usize)> {
    (0..n).map(|i| (i * len / n, (i + 1) * len / n)).collect()
}

fn bin_of(v: Sample, full: Sample) -> usize {
    let v = i64::from(v.clamp(0, full));
    (v * CLAHE_BINS as i64 / (i64::from(full) + 1)) as usize
}

/// Clip the histogram, redistribute the excess evenly, and build a lookup
/// table from bin to output level.
fn tile_lut(hist: &mut [u32; CLAHE_BINS], pixels: usize, clip_limit: f32, full: Sample) -> Vec<f32> {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * pixels as f32) as u32).max(1);
        let mut excess = 0u32;
        for count in hist.iter_mut() {
            if *count > limit {
                excess += *count - limit;
                *count = limit;
            }
        }
        let per_bin = excess / CLAHE_BINS as u32;
        let remainder = (excess % CLAHE_BINS as u32) as usize;
        for (i, count) in hist.iter_mut().enumerate() {
            *count += per_bin + u32::from(i < remainder);
        }
    }

    let scale = full as f32 / pixels.max(1) as f32;
    let mut cdf = 0u32;
    hist.iter()
        .map(|&count| {
            cdf += count;
            cdf as f32 * scale
        })
        .collect()
}

/// Neighbouring tile indices and blend weight for a pixel centre at `pos`.
fn interpolation_weights(centres: &[f32], pos: f32) -> (usize, usize, f32) {
    let last = centres.len() - 1;
    if pos <= centres[0] {
        return (0, 0, 0.0);
    }
    if pos >= centres[last] {
        return (last, last, 0.0);
    }
    let i1 = centres.partition_point(|&c| c <= pos);
    let i0 = i1 - 1;
    let span = centres[i1] - centres[i0];
    let weight = if span > 0.0 { (pos - centres[i0]) / span } else { 0.0 };
    (i0, i1, weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_bounds_cover_without_gaps() {
        let bounds = tile_bounds(10, 8);
        assert_eq!(bounds.first().unwrap().0, 0);
        assert_eq!(bounds.last().unwrap().1, 10);
        for pair in bounds.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        assert!(bounds.iter().all(|&(a, b)| b > a));
    }

    #[test]
    fn test_interpolation_weights_edges() {
        let centres = [2.0, 6.0, 10.0];
        assert_eq!(interpolation_weights(&centres, 0.5), (0, 0, 0.0));
        assert_eq!(interpolation_weights(&centres, 11.0), (2, 2, 0.0));
        let (i0, i1, wgt) = interpolation_weights(&centres, 4.0);
        assert_eq!((i0, i1), (0, 1));
        assert!((wgt - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clip_redistributes_all_pixels() {
        let mut hist = [0u32; CLAHE_BINS];
        hist[10] = 100;
        let lut = tile_lut(&mut hist, 100, 0.05, 255);
        assert_eq!(hist.iter().sum::<u32>(), 100);
        assert!((lut[CLAHE_BINS - 1] - 255.0).abs() < 1e-3);
    }
}
