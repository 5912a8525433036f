#![allow(dead_code)]

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use ndarray::Array2;

use flicker_core::camera::{CameraDevice, DeviceStatus, TriggerMode};
use flicker_core::error::{FlickerError, Result};
use flicker_core::frame::{Frame, Sample};

/// Frame filled with `value`, shape (height, width).
pub fn constant_frame(value: Sample, dim: (usize, usize), index: u64) -> Frame {
    Frame::new(Array2::from_elem(dim, value), index, index * 1000)
}

/// Frame whose pixel (r, c) holds `r * width + c`.
pub fn ramp_frame(dim: (usize, usize), index: u64) -> Frame {
    let (_, w) = dim;
    let data = Array2::from_shape_fn(dim, |(r, c)| (r * w + c) as Sample);
    Frame::new(data, index, index * 1000)
}

/// What a [`MockCamera`] delivers on each read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Script {
    /// Consecutive indices; every third pair arrives odd-first.
    Jittered,
    /// Only even indices, so no pair ever completes.
    EvenOnly,
    /// Never delivers a frame and reports the device idle.
    Stalling,
    /// Consecutive indices, with one idle stall right after frame 0.
    StallOnce,
}

/// Deterministic camera for driving the loops in tests.
pub struct MockCamera {
    script: Script,
    detector: (usize, usize),
    trigger: TriggerMode,
    binning: u32,
    exposure: f64,
    acquiring: bool,
    counter: u64,
    pending: VecDeque<u64>,
    read_delay: Duration,
    stalled: bool,
    idle: bool,
}

impl MockCamera {
    pub fn new(script: Script, detector: (usize, usize)) -> Self {
        Self {
            script,
            detector,
            trigger: TriggerMode::Internal,
            binning: 1,
            exposure: 0.001,
            acquiring: false,
            counter: 0,
            pending: VecDeque::new(),
            read_delay: Duration::from_micros(100),
            stalled: false,
            idle: false,
        }
    }

    fn next_index(&mut self) -> u64 {
        match self.script {
            Script::Jittered => {
                if self.pending.is_empty() {
                    let k = self.counter;
                    self.counter += 1;
                    if k % 3 == 1 {
                        self.pending.extend([2 * k + 1, 2 * k]);
                    } else {
                        self.pending.extend([2 * k, 2 * k + 1]);
                    }
                }
                self.pending.pop_front().unwrap_or(0)
            }
            Script::StallOnce => {
                let index = self.counter;
                self.counter += 1;
                index
            }
            Script::EvenOnly | Script::Stalling => {
                let index = 2 * self.counter;
                self.counter += 1;
                index
            }
        }
    }

    fn make_frame(&mut self) -> Frame {
        let index = self.next_index();
        constant_frame((index % 1000) as Sample, self.frame_dim(), index)
    }
}

impl CameraDevice for MockCamera {
    fn detector_size(&self) -> (usize, usize) {
        self.detector
    }

    fn bit_depth(&self) -> u8 {
        16
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
        self.binning = binning;
        Ok(())
    }

    fn binning(&self) -> u32 {
        self.binning
    }

    fn set_exposure(&mut self, seconds: f64) -> Result<()> {
        self.exposure = seconds;
        Ok(())
    }

    fn exposure(&self) -> f64 {
        self.exposure
    }

    fn start_acquisition(&mut self) -> Result<()> {
        self.acquiring = true;
        self.counter = 0;
        self.pending.clear();
        self.stalled = false;
        self.idle = false;
        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<()> {
        self.acquiring = false;
        Ok(())
    }

    fn read_latest_frame(&mut self) -> Result<Option<Frame>> {
        thread::sleep(self.read_delay);
        self.idle = false;
        if self.script == Script::StallOnce && self.counter == 1 && !self.stalled {
            self.stalled = true;
            self.idle = true;
            return Ok(None);
        }
        if !self.acquiring || self.script == Script::Stalling {
            return Ok(None);
        }
        Ok(Some(self.make_frame()))
    }

    fn snap(&mut self) -> Result<Frame> {
        if self.acquiring {
            return Err(FlickerError::DeviceBusy);
        }
        Ok(self.make_frame())
    }

    fn status(&self) -> DeviceStatus {
        if self.acquiring && self.script != Script::Stalling && !self.idle {
            DeviceStatus::Busy
        } else {
            DeviceStatus::Idle
        }
    }
}
