use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_BINNING, DEFAULT_BIT_DEPTH, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CLIP_LIMIT,
    DEFAULT_EXPOSURE_TIME, DEFAULT_POLL_TIMEOUT, MAX_AVERAGING_DEPTH, MAX_BIT_DEPTH,
};
use crate::error::{FlickerError, Result};
use crate::frame::Sample;

/// Per-frame contrast enhancement applied before display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnhancementMode {
    #[default]
    None,
    Basic,
    Percentile,
    HistogramEqualization,
    AdaptiveEqualization,
}

impl fmt::Display for EnhancementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic => write!(f, "Basic"),
            Self::Percentile => write!(f, "Percentile Clip"),
            Self::HistogramEqualization => write!(f, "Histogram Equalization"),
            Self::AdaptiveEqualization => write!(f, "Adaptive Equalization"),
        }
    }
}

/// How the camera is triggered and how frames are grouped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionMode {
    /// Free-running internal trigger, one frame per item.
    #[default]
    Single,
    /// External trigger, frames grouped into (even, odd) pairs.
    Difference,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "Single"),
            Self::Difference => write!(f, "Difference"),
        }
    }
}

/// Rectangular region of interest. `width == height == 0` disables it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Roi {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Whether the region lies entirely inside a (height, width) frame.
    pub fn fits(&self, dim: (usize, usize)) -> bool {
        let (h, w) = dim;
        self.x + self.width <= w && self.y + self.height <= h
    }
}

/// Endpoints of a line profile, in (x, y) pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEndpoints {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

/// Everything the processing loop reads on each frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub enhancement: EnhancementMode,
    /// Lower percentile, 0..100.
    pub p_low: f32,
    /// Upper percentile, 0..100, always above `p_low`.
    pub p_high: f32,
    /// Compute percentile bounds over the ROI instead of the whole frame.
    pub percentile_use_roi: bool,
    /// Adaptive equalization contrast limit.
    pub clip_limit: f32,
    pub subtract_background: bool,
    /// Rolling average depth; 0 disables averaging.
    pub averaging: usize,
    pub roi: Roi,
    pub line: Option<LineEndpoints>,
    #[serde(skip)]
    pub background: Option<Arc<Array2<Sample>>>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            enhancement: EnhancementMode::None,
            p_low: 0.0,
            p_high: 100.0,
            percentile_use_roi: false,
            clip_limit: DEFAULT_CLIP_LIMIT,
            subtract_background: false,
            averaging: 0,
            roi: Roi::default(),
            line: None,
            background: None,
        }
    }
}

impl ProcessingConfig {
    pub fn averaging_enabled(&self) -> bool {
        self.averaging > 0
    }

    /// Set both percentile bounds. Rejected unless `0 <= low < high <= 100`.
    pub fn set_percentiles(&mut self, low: f32, high: f32) -> Result<()> {
        check_percentiles(low, high)?;
        self.p_low = low;
        self.p_high = high;
        Ok(())
    }

    pub fn set_percentile_low(&mut self, low: f32) -> Result<()> {
        self.set_percentiles(low, self.p_high)
    }

    pub fn set_percentile_high(&mut self, high: f32) -> Result<()> {
        self.set_percentiles(self.p_low, high)
    }

    pub fn set_clip_limit(&mut self, clip_limit: f32) -> Result<()> {
        if !clip_limit.is_finite() || clip_limit < 0.0 {
            return Err(FlickerError::InvalidConfig(format!(
                "clip limit must be a non-negative number, got {clip_limit}"
            )));
        }
        self.clip_limit = clip_limit;
        Ok(())
    }

    pub fn set_averaging(&mut self, depth: usize) -> Result<()> {
        if depth > MAX_AVERAGING_DEPTH {
            return Err(FlickerError::InvalidConfig(format!(
                "averaging depth {depth} exceeds {MAX_AVERAGING_DEPTH}"
            )));
        }
        self.averaging = depth;
        Ok(())
    }

    /// Check a deserialized config.
    pub fn validate(&self) -> Result<()> {
        check_percentiles(self.p_low, self.p_high)?;
        if !self.clip_limit.is_finite() || self.clip_limit < 0.0 {
            return Err(FlickerError::InvalidConfig(format!(
                "clip limit must be a non-negative number, got {}",
                self.clip_limit
            )));
        }
        if self.averaging > MAX_AVERAGING_DEPTH {
            return Err(FlickerError::InvalidConfig(format!(
                "averaging depth {} exceeds {MAX_AVERAGING_DEPTH}",
                self.averaging
            )));
        }
        Ok(())
    }
}

fn check_percentiles(low: f32, high: f32) -> Result<()> {
    if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) {
        return Err(FlickerError::InvalidConfig(format!(
            "percentiles must lie in [0, 100], got [{low}, {high}]"
        )));
    }
    if low >= high {
        return Err(FlickerError::InvalidConfig(format!(
            "lower percentile {low} must be below upper percentile {high}"
        )));
    }
    Ok(())
}

/// Camera and channel settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub mode: AcquisitionMode,
    /// Exposure time in seconds.
    pub exposure_time: f64,
    pub binning: u32,
    pub bit_depth: u8,
    pub channel_capacity: usize,
    pub poll_timeout_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            mode: AcquisitionMode::Single,
            exposure_time: DEFAULT_EXPOSURE_TIME,
            binning: DEFAULT_BINNING,
            bit_depth: DEFAULT_BIT_DEPTH,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT.as_millis() as u64,
        }
    }
}

impl AcquisitionConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.exposure_time.is_finite() || self.exposure_time <= 0.0 {
            return Err(FlickerError::InvalidConfig(format!(
                "exposure time must be positive, got {}",
                self.exposure_time
            )));
        }
        check_binning(self.binning)?;
        if self.bit_depth == 0 || self.bit_depth > MAX_BIT_DEPTH {
            return Err(FlickerError::InvalidConfig(format!(
                "bit depth must be 1..={MAX_BIT_DEPTH}, got {}",
                self.bit_depth
            )));
        }
        if self.channel_capacity == 0 {
            return Err(FlickerError::InvalidConfig(
                "channel capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_binning(binning: u32) -> Result<()> {
    if matches!(binning, 1 | 2 | 4) {
        Ok(())
    } else {
        Err(FlickerError::InvalidConfig(format!(
            "binning must be 1, 2 or 4, got {binning}"
        )))
    }
}

/// Top-level TOML document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        self.acquisition.validate()?;
        self.processing.validate()
    }
}
