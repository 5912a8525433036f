pub mod config;
pub mod enhance;
pub mod run;

use clap::ValueEnum;
use flicker_core::config::EnhancementMode;

/// Command-line spelling of [`EnhancementMode`].
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum EnhancementArg {
    None,
    Basic,
    Percentile,
    Equalize,
    Clahe,
}

impl From<EnhancementArg> for EnhancementMode {
    fn from(arg: EnhancementArg) -> Self {
        match arg {
            EnhancementArg::None => Self::None,
            EnhancementArg::Basic => Self::Basic,
            EnhancementArg::Percentile => Self::Percentile,
            EnhancementArg::Equalize => Self::HistogramEqualization,
            EnhancementArg::Clahe => Self::AdaptiveEqualization,
        }
    }
}
