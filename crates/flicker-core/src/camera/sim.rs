use std::thread;
use std::time::{Duration, Instant};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::check_binning;
use crate::consts::{DEFAULT_BINNING, DEFAULT_BIT_DEPTH, DEFAULT_EXPOSURE_TIME};
use crate::error::{FlickerError, Result};
use crate::frame::{max_value, Frame, Sample};

use super::{CameraDevice, DeviceStatus, TriggerMode};

/// Settings for [`SimulatedCamera`].
#[derive(Clone, Debug)]
pub struct SimulatedCameraConfig {
    /// Unbinned sensor size as (height, width).
    pub detector_size: (usize, usize),
    pub bit_depth: u8,
    pub seed: u64,
    /// Peak noise amplitude in counts.
    pub noise: Sample,
    /// Sleep for the exposure time on each read, like real hardware.
    pub paced: bool,
    /// Under external trigger, deliver each pair odd-first.
    pub swap_pairs: bool,
    /// Every n-th read returns nothing with the device idle.
    pub stall_every: Option<u64>,
}

impl Default for SimulatedCameraConfig {
    fn default() -> Self {
        Self {
            detector_size: (512, 512),
            bit_depth: DEFAULT_BIT_DEPTH,
            seed: 0x5eed,
            noise: 64,
            paced: true,
            swap_pairs: false,
            stall_every: None,
        }
    }
}

/// Software camera producing a smooth background with a disc whose contrast
/// flips between the two exposures of an externally triggered pair.
pub struct SimulatedCamera {
    config: SimulatedCameraConfig,
    rng: StdRng,
    trigger: TriggerMode,
    binning: u32,
    exposure: f64,
    acquiring: bool,
    stalled: bool,
    reads: u64,
    next_index: u64,
    started: Instant,
}

impl SimulatedCamera {
    /// Open the simulated device. Fails like a real connection would when the
    /// sensor geometry is unusable.
    pub fn connect(config: SimulatedCameraConfig) -> Result<Self> {
        let (h, w) = config.detector_size;
        if h < 4 || w < 4 || config.bit_depth == 0 || config.bit_depth > 16 {
            return Err(FlickerError::DeviceConnection(format!(
                "simulated sensor {w}x{h} at {} bits is not usable",
                config.bit_depth
            )));
        }
        info!(width = w, height = h, bits = config.bit_depth, "Simulated camera connected");
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            trigger: TriggerMode::Internal,
            binning: DEFAULT_BINNING,
            exposure: DEFAULT_EXPOSURE_TIME,
            acquiring: false,
            stalled: false,
            reads: 0,
            next_index: 0,
            started: Instant::now(),
        })
    }

    fn render(&mut self, index: u64) -> Frame {
        let (h, w) = self.frame_dim();
        let full = max_value(self.config.bit_depth);
        let b = self.binning as f64;
        // Signal grows with exposure and binned area; 50 ms at 1x1 fills ~25%.
        let gain = (self.exposure / DEFAULT_EXPOSURE_TIME) * b * b / 4.0;
        let base = f64::from(full) * 0.25 * gain.min(3.5);
        let contrast = match (self.trigger, index % 2) {
            (TriggerMode::External, 1) => -0.1,
            _ => 0.1,
        };
        let (cy, cx) = (h as f64 / 2.0, w as f64 / 2.0);
        let radius = h.min(w) as f64 / 4.0;
        let noise = self.config.noise.max(0);

        let data = Array2::from_shape_fn((h, w), |(r, c)| {
            let shade = 0.75 + 0.25 * (c as f64 / w as f64);
            let dist = ((r as f64 - cy).powi(2) + (c as f64 - cx).powi(2)).sqrt();
            let disc = if dist < radius { 1.0 + contrast } else { 1.0 };
            let jitter = if noise > 0 {
                self.rng.gen_range(-noise..=noise)
            } else {
                0
            };
            ((base * shade * disc) as Sample + jitter).clamp(0, full)
        });

        let timestamp_us = self.started.elapsed().as_micros() as u64;
        Frame::new(data, index, timestamp_us).with_bit_depth(self.config.bit_depth)
    }

    fn take_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        if self.trigger == TriggerMode::External && self.config.swap_pairs {
            index ^ 1
        } else {
            index
        }
    }
}

impl CameraDevice for SimulatedCamera {
    fn detector_size(&self) -> (usize, usize) {
        self.config.detector_size
    }

    fn bit_depth(&self) -> u8 {
        self.config.bit_depth
    }

    fn configure_trigger(&mut self, mode: TriggerMode) -> Result<()> {
        if self.acquiring {
            return Err(FlickerError::DeviceBusy);
        }
        self.trigger = mode;
        Ok(())
    }

    fn trigger_mode(&self) -> TriggerMode {
        self.trigger
    }

    fn set_binning(&mut self, binning: u32) -> Result<()> {
        check_binning(binning)?;
        if self.acquiring {
            return Err(FlickerError::DeviceBusy);
        }
        self.binning = binning;
        Ok(())
    }

    fn binning(&self) -> u32 {
        self.binning
    }

    fn set_exposure(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(FlickerError::Device(format!("exposure {seconds}s rejected")));
        }
        self.exposure = seconds;
        Ok(())
    }

    fn exposure(&self) -> f64 {
        self.exposure
    }

    fn start_acquisition(&mut self) -> Result<()> {
        self.acquiring = true;
        self.stalled = false;
        self.next_index = 0;
        debug!(trigger = ?self.trigger, "Simulated acquisition started");
        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<()> {
        self.acquiring = false;
        Ok(())
    }

    fn read_latest_frame(&mut self) -> Result<Option<Frame>> {
        if !self.acquiring {
            return Ok(None);
        }
        self.reads += 1;
        if let Some(every) = self.config.stall_every {
            if every > 0 && self.reads % every == 0 {
                self.stalled = true;
                return Ok(None);
            }
        }
        self.stalled = false;
        if self.config.paced {
            thread::sleep(Duration::from_secs_f64(self.exposure));
        }
        let index = self.take_index();
        Ok(Some(self.render(index)))
    }

    fn snap(&mut self) -> Result<Frame> {
        if self.acquiring {
            return Err(FlickerError::DeviceBusy);
        }
        if self.config.paced {
            thread::sleep(Duration::from_secs_f64(self.exposure));
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(self.render(index))
    }

    fn status(&self) -> DeviceStatus {
        match (self.acquiring, self.stalled) {
            (true, false) => DeviceStatus::Busy,
            _ => DeviceStatus::Idle,
        }
    }
}
