use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::camera::{CameraDevice, DeviceStatus, TriggerMode};
use crate::channel::{FrameChannel, SpacePermit};
use crate::config::{check_binning, AcquisitionMode};
use crate::consts::STALL_WARN_THRESHOLD;
use crate::error::{FlickerError, Result};
use crate::events::{emit, EventSender, PipelineEvent};
use crate::frame::{Frame, FrameItem};
use crate::state::SharedContext;

/// Producer side of the pipeline: pulls frames from the camera and pushes
/// them into the frame channel.
///
/// The device is held for the whole duration of a run, so reconfiguration
/// calls made while a loop is active fail with [`FlickerError::DeviceBusy`].
pub struct CameraAcquisition<D: CameraDevice> {
    device: Mutex<D>,
    ctx: Arc<SharedContext>,
    channel: Arc<FrameChannel>,
    events: EventSender,
    poll_timeout: Duration,
}

/// Outcome of one attempt to read a frame while holding a channel slot.
enum Read {
    Frame(Frame),
    /// No frame yet, device still busy: keep the slot and try again.
    Pending,
    /// Device stalled or errored: hand the slot back.
    Stalled,
}

impl<D: CameraDevice> CameraAcquisition<D> {
    pub fn new(
        device: D,
        ctx: Arc<SharedContext>,
        channel: Arc<FrameChannel>,
        events: EventSender,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            device: Mutex::new(device),
            ctx,
            channel,
            events,
            poll_timeout,
        }
    }

    /// Run the loop for `mode` until the shared state leaves `Running`.
    pub fn run(&self, mode: AcquisitionMode) -> Result<()> {
        match mode {
            AcquisitionMode::Single => self.run_single(),
            AcquisitionMode::Difference => self.run_difference(),
        }
    }

    /// Free-running acquisition: one frame per channel item.
    pub fn run_single(&self) -> Result<()> {
        let mut device = self.device.lock();
        device.configure_trigger(TriggerMode::Internal)?;
        device.start_acquisition()?;
        info!("Single-frame acquisition started");

        let mut stalls = 0u32;
        let mut pushed = 0u64;
        while self.ctx.is_running() {
            let Some(permit) = self.channel.acquire_space(self.poll_timeout) else {
                continue;
            };
            self.fill_single(&mut *device, permit, &mut stalls, &mut pushed);
        }

        self.finish(&mut *device, pushed);
        Ok(())
    }

    fn fill_single(&self, device: &mut D, permit: SpacePermit<'_>, stalls: &mut u32, pushed: &mut u64) {
        while self.ctx.is_running() {
            match read_frame(device, stalls) {
                Read::Frame(frame) => {
                    permit.push(FrameItem::Single(frame));
                    *pushed += 1;
                    return;
                }
                Read::Pending => continue,
                Read::Stalled => return,
            }
        }
        // Dropping the permit returns the slot.
    }

    /// Externally triggered acquisition, grouping frames into (A, B) pairs by
    /// hardware index parity.
    pub fn run_difference(&self) -> Result<()> {
        let mut device = self.device.lock();
        device.configure_trigger(TriggerMode::External)?;
        device.start_acquisition()?;
        info!("Difference acquisition started");

        let mut stalls = 0u32;
        let mut pushed = 0u64;
        let mut pairs = PairAssembler::default();
        while self.ctx.is_running() {
            let Some(permit) = self.channel.acquire_space(self.poll_timeout) else {
                continue;
            };
            self.fill_pair(&mut *device, permit, &mut pairs, &mut stalls, &mut pushed);
        }

        self.finish(&mut *device, pushed);
        Ok(())
    }

    fn fill_pair(
        &self,
        device: &mut D,
        permit: SpacePermit<'_>,
        pairs: &mut PairAssembler,
        stalls: &mut u32,
        pushed: &mut u64,
    ) {
        loop {
            if !self.ctx.is_running() {
                debug!("Stopped mid-pair, pushing incomplete marker");
                permit.push(FrameItem::Incomplete);
                return;
            }
            match read_frame(device, stalls) {
                Read::Frame(frame) => {
                    if let Some((a, b)) = pairs.offer(frame) {
                        permit.push(FrameItem::DifferencePair(a, b));
                        *pushed += 1;
                        return;
                    }
                }
                Read::Pending => {}
                // Keep any half pair; `offer` discards it if its partner
                // never turns up.
                Read::Stalled => return,
            }
        }
    }

    fn finish(&self, device: &mut D, pushed: u64) {
        if let Err(e) = device.stop_acquisition() {
            warn!(error = %e, "Failed to stop camera acquisition");
        }
        info!(items = pushed, "Acquisition stopped");
        if self.ctx.should_notify_ready() {
            emit(&self.events, PipelineEvent::CameraReady);
        }
    }

    pub fn set_exposure_time(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(FlickerError::InvalidConfig(format!(
                "exposure time must be positive, got {seconds}"
            )));
        }
        let mut device = self.device.try_lock().ok_or(FlickerError::DeviceBusy)?;
        device.set_exposure(seconds)?;
        info!(seconds, "Exposure time set");
        emit(&self.events, PipelineEvent::CameraReady);
        Ok(())
    }

    /// Change hardware binning. Publishes the new frame shape and rebuilds
    /// the channel so no frame of the old shape is delivered afterwards.
    pub fn set_binning(&self, binning: u32) -> Result<()> {
        check_binning(binning)?;
        let mut device = self.device.try_lock().ok_or(FlickerError::DeviceBusy)?;
        device.set_binning(binning)?;
        let dim = device.frame_dim();
        self.ctx.set_dim(dim);
        self.channel.rebuild();
        info!(binning, height = dim.0, width = dim.1, "Binning set");
        emit(&self.events, PipelineEvent::CameraReady);
        Ok(())
    }

    /// Capture `n` frames synchronously with the internal trigger, then
    /// restore the previous trigger mode. The continuous loop must be stopped.
    pub fn grab_n_frames(&self, n: usize) -> Result<Vec<Frame>> {
        let mut device = self.device.try_lock().ok_or(FlickerError::DeviceBusy)?;
        let previous = device.trigger_mode();
        device.configure_trigger(TriggerMode::Internal)?;
        let frames = device.snap_n(n);
        let restored = device.configure_trigger(previous);
        let frames = frames?;
        restored?;
        debug!(count = frames.len(), "Grabbed frames");
        Ok(frames)
    }

    pub fn frame_dim(&self) -> Result<(usize, usize)> {
        let device = self.device.try_lock().ok_or(FlickerError::DeviceBusy)?;
        Ok(device.frame_dim())
    }

    pub fn exposure(&self) -> Result<f64> {
        let device = self.device.try_lock().ok_or(FlickerError::DeviceBusy)?;
        Ok(device.exposure())
    }

    pub fn binning(&self) -> Result<u32> {
        let device = self.device.try_lock().ok_or(FlickerError::DeviceBusy)?;
        Ok(device.binning())
    }
}

fn read_frame<D: CameraDevice>(device: &mut D, stalls: &mut u32) -> Read {
    match device.read_latest_frame() {
        Ok(Some(frame)) => {
            *stalls = 0;
            Read::Frame(frame)
        }
        Ok(None) if device.status() == DeviceStatus::Busy => Read::Pending,
        Ok(None) => {
            *stalls += 1;
            if *stalls % STALL_WARN_THRESHOLD == 0 {
                warn!(stalls = *stalls, status = ?device.status(), "Camera keeps stalling");
            } else {
                debug!(status = ?device.status(), "Camera stalled, releasing slot");
            }
            Read::Stalled
        }
        Err(e) => {
            *stalls += 1;
            warn!(error = %e, "Camera read failed");
            Read::Stalled
        }
    }
}

/// Pairs externally triggered frames by hardware index: exposure A carries
/// an even index `2k`, exposure B the following odd index `2k + 1`. Arrival
/// order does not matter.
#[derive(Default)]
pub struct PairAssembler {
    a: Option<Frame>,
    b: Option<Frame>,
}

impl PairAssembler {
    /// Feed one frame; returns a completed (A, B) pair when one forms.
    pub fn offer(&mut self, frame: Frame) -> Option<(Frame, Frame)> {
        if frame.is_even() {
            self.a = Some(frame);
        } else {
            self.b = Some(frame);
        }

        let (a_idx, b_idx) = match (&self.a, &self.b) {
            (Some(a), Some(b)) => (a.index, b.index),
            _ => return None,
        };
        if b_idx == a_idx + 1 {
            return self.a.take().zip(self.b.take());
        }
        if b_idx < a_idx {
            // B belongs to an older pair whose A never arrived.
            self.b = None;
        } else {
            // A's partner was lost; wait for B's own partner.
            self.a = None;
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_none() && self.b.is_none()
    }
}
