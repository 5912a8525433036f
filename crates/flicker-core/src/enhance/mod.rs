pub mod adaptive;
pub mod basic;
pub mod equalize;
pub mod percentile;

use ndarray::Array2;

use crate::config::{EnhancementMode, ProcessingConfig};
use crate::frame::Sample;

pub use adaptive::equalize_adaptive;
pub use basic::{rescale_range, rescale_to_max};
pub use equalize::equalize_histogram;
pub use percentile::percentile_clip;

/// Apply the enhancement selected in `config`.
///
/// Every mode returns an array of the input shape. `None` returns the samples
/// untouched; every other mode produces values in `[0, max(bit_depth)]`.
pub fn enhance(data: &Array2<Sample>, config: &ProcessingConfig, bit_depth: u8) -> Array2<Sample> {
    match config.enhancement {
        EnhancementMode::None => data.clone(),
        EnhancementMode::Basic => rescale_to_max(data, bit_depth),
        EnhancementMode::Percentile => {
            let roi = config.percentile_use_roi.then_some(&config.roi);
            percentile_clip(data, config.p_low, config.p_high, roi, bit_depth)
        }
        EnhancementMode::HistogramEqualization => equalize_histogram(data, bit_depth),
        EnhancementMode::AdaptiveEqualization => {
            equalize_adaptive(data, config.clip_limit, bit_depth)
        }
    }
}
