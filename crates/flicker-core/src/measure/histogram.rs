use ndarray::Array2;

use crate::frame::{max_value, Sample};

/// Fixed-width histogram over `[0, max(bit_depth)]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Histogram {
    pub counts: Vec<u64>,
    /// Sample values covered by each bin.
    pub bin_width: u32,
}

impl Histogram {
    /// Lower edge of every bin.
    pub fn bin_starts(&self) -> Vec<u32> {
        (0..self.counts.len() as u32).map(|i| i * self.bin_width).collect()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Histogram of `data` with at most `bins` bins. Out-of-range samples land in
/// the first or last bin.
pub fn histogram(data: &Array2<Sample>, bins: usize, bit_depth: u8) -> Histogram {
    let full = max_value(bit_depth);
    let levels = full as u32 + 1;
    let bins = (bins.max(1) as u32).min(levels);
    let bin_width = levels.div_ceil(bins);
    let n_bins = levels.div_ceil(bin_width) as usize;

    let mut counts = vec![0u64; n_bins];
    for &v in data.iter() {
        let idx = v.clamp(0, full) as u32 / bin_width;
        counts[idx as usize] += 1;
    }
    Histogram { counts, bin_width }
}
