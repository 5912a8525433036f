use std::time::Duration;

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Default frame channel capacity. Kept small so acquisition never runs far
/// ahead of processing.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 2;

/// Default timed-wait on channel permits. Bounds worst-case shutdown latency
/// of both loops.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Default sample bit depth of the camera.
pub const DEFAULT_BIT_DEPTH: u8 = 16;

/// Largest supported sample bit depth.
pub const MAX_BIT_DEPTH: u8 = 16;

/// Largest supported averaging depth. 16-bit samples summed over this many
/// frames still fit comfortably in an i64 accumulator.
pub const MAX_AVERAGING_DEPTH: usize = 256;

/// Number of histogram bins published with each processed frame.
pub const HISTOGRAM_BINS: usize = 256;

/// Number of mean-intensity samples retained for the time series.
pub const INTENSITY_HISTORY_LEN: usize = 100;

/// Default exposure time in seconds.
pub const DEFAULT_EXPOSURE_TIME: f64 = 0.05;

/// Default hardware binning factor.
pub const DEFAULT_BINNING: u32 = 2;

/// Default CLAHE clip limit (fraction of tile pixel count).
pub const DEFAULT_CLIP_LIMIT: f32 = 0.03;

/// Number of CLAHE tiles along each axis.
pub const CLAHE_TILE_GRID: usize = 8;

/// Number of grey levels CLAHE bins samples into.
pub const CLAHE_BINS: usize = 256;

/// Number of consecutive device stalls after which the loop logs a warning
/// instead of a debug line.
pub const STALL_WARN_THRESHOLD: u32 = 100;

/// Undelivered frame notifications kept on the event queue before newer
/// ones are dropped.
pub const EVENT_QUEUE_FRAMES: usize = 8;
