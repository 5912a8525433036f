//! Camera device abstraction.
//!
//! The pipeline only needs a handful of operations from the hardware: trigger
//! configuration, binning, exposure, start/stop, and frame reads. Vendor
//! drivers implement [`CameraDevice`]; [`SimulatedCamera`] stands in when no
//! hardware is attached.

pub mod sim;

use crate::error::Result;
use crate::frame::Frame;

pub use sim::{SimulatedCamera, SimulatedCameraConfig};

/// Trigger mode for frame acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Internal trigger (free-running at the configured exposure)
    Internal,
    /// External trigger on a hardware line, one frame per pulse
    External,
}

/// Coarse device state reported alongside frame reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Acquiring; a frame is on its way.
    Busy,
    /// Not acquiring.
    Idle,
    /// The device reported a fault.
    Error,
}

/// Operations the acquisition loop needs from a camera.
pub trait CameraDevice: Send {
    /// Unbinned sensor size as (height, width).
    fn detector_size(&self) -> (usize, usize);

    /// Sample bit depth of produced frames.
    fn bit_depth(&self) -> u8;

    fn configure_trigger(&mut self, mode: TriggerMode) -> Result<()>;

    fn trigger_mode(&self) -> TriggerMode;

    fn set_binning(&mut self, binning: u32) -> Result<()>;

    fn binning(&self) -> u32;

    /// Exposure time in seconds.
    fn set_exposure(&mut self, seconds: f64) -> Result<()>;

    fn exposure(&self) -> f64;

    fn start_acquisition(&mut self) -> Result<()>;

    fn stop_acquisition(&mut self) -> Result<()>;

    /// Next available frame, waiting at most about one frame period.
    ///
    /// `Ok(None)` means no frame arrived in that window; callers consult
    /// [`CameraDevice::status`] to tell a slow frame from a stall.
    fn read_latest_frame(&mut self) -> Result<Option<Frame>>;

    /// Capture a single frame synchronously, outside continuous acquisition.
    fn snap(&mut self) -> Result<Frame>;

    /// Capture `n` frames synchronously.
    fn snap_n(&mut self, n: usize) -> Result<Vec<Frame>> {
        (0..n).map(|_| self.snap()).collect()
    }

    fn status(&self) -> DeviceStatus;

    /// (height, width) of frames at the current binning.
    fn frame_dim(&self) -> (usize, usize) {
        let (h, w) = self.detector_size();
        let b = self.binning().max(1) as usize;
        (h / b, w / b)
    }
}
