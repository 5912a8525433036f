use ndarray::Array2;

use crate::consts::DEFAULT_BIT_DEPTH;

/// Sample storage type. Camera samples are at most 16 bits wide but are held
/// in a wider signed integer so frame differences never wrap.
pub type Sample = i32;

/// A single captured camera frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<Sample>,
    /// Monotonic hardware frame counter.
    pub index: u64,
    /// Capture time in microseconds since acquisition start.
    pub timestamp_us: u64,
    /// Bit depth of the source samples (1..=16).
    pub bit_depth: u8,
}

impl Frame {
    pub fn new(data: Array2<Sample>, index: u64, timestamp_us: u64) -> Self {
        Self {
            data,
            index,
            timestamp_us,
            bit_depth: DEFAULT_BIT_DEPTH,
        }
    }

    pub fn with_bit_depth(mut self, bit_depth: u8) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// (height, width)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// True when the hardware index marks the first exposure of a pair.
    pub fn is_even(&self) -> bool {
        self.index % 2 == 0
    }
}

/// Largest representable sample for the given bit depth.
pub fn max_value(bit_depth: u8) -> Sample {
    ((1u32 << bit_depth.clamp(1, 16)) - 1) as Sample
}

/// One unit of work handed from acquisition to processing.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum FrameItem {
    /// A free-running frame.
    Single(Frame),
    /// Exposure A (even index) and exposure B (odd index) of a difference pair.
    DifferencePair(Frame, Frame),
    /// Pushed when difference acquisition stops before a pair is complete, so
    /// the consumer is never left waiting.
    Incomplete,
}

impl FrameItem {
    /// (height, width) of the frames carried, if any.
    pub fn dim(&self) -> Option<(usize, usize)> {
        match self {
            Self::Single(f) | Self::DifferencePair(f, _) => Some(f.dim()),
            Self::Incomplete => None,
        }
    }
}
