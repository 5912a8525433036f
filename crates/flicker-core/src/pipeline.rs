use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ndarray::Array2;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::acquisition::CameraAcquisition;
use crate::camera::CameraDevice;
use crate::channel::FrameChannel;
use crate::config::{AcquisitionMode, EnhancementMode, LineEndpoints, ProcessingConfig, Roi, SessionConfig};
use crate::consts::EVENT_QUEUE_FRAMES;
use crate::error::{FlickerError, Result};
use crate::events::{event_channel, EventReceiver};
use crate::frame::{Frame, FrameItem, Sample};
use crate::processing::{FrameProcessor, ProcessedFrame, ProcessorStatus};
use crate::stack::mean_stack;
use crate::state::{RunState, SharedContext};

struct Workers {
    acquisition: JoinHandle<()>,
    processing: JoinHandle<()>,
}

/// Owns the acquisition and processing loops and exposes the operations an
/// operator front-end needs: starting and stopping modes, camera settings,
/// and processing settings.
///
/// Changing a camera setting while running stops both loops, applies the
/// change, and restarts them in the same mode.
pub struct Pipeline<D: CameraDevice + 'static> {
    ctx: Arc<SharedContext>,
    channel: Arc<FrameChannel>,
    acquisition: Arc<CameraAcquisition<D>>,
    processor: Arc<Mutex<FrameProcessor>>,
    status: Arc<Mutex<ProcessorStatus>>,
    mode: AcquisitionMode,
    workers: Option<Workers>,
    background_stack: Vec<Frame>,
}

impl<D: CameraDevice + 'static> Pipeline<D> {
    /// Configure `device` from `config` and build the pipeline in the idle
    /// state. Notifications arrive on the returned receiver.
    pub fn new(mut device: D, config: &SessionConfig) -> Result<(Self, EventReceiver)> {
        config.validate()?;
        let acq = &config.acquisition;
        device.set_exposure(acq.exposure_time)?;
        device.set_binning(acq.binning)?;
        let dim = device.frame_dim();
        if dim.0 == 0 || dim.1 == 0 {
            return Err(FlickerError::InvalidDimensions {
                width: dim.1,
                height: dim.0,
            });
        }

        let (tx, rx) = event_channel(EVENT_QUEUE_FRAMES);
        let ctx = Arc::new(SharedContext::new(dim, config.processing.clone()));
        let channel = Arc::new(FrameChannel::new(acq.channel_capacity));
        let poll_timeout = acq.poll_timeout();

        let acquisition = Arc::new(CameraAcquisition::new(
            device,
            Arc::clone(&ctx),
            Arc::clone(&channel),
            tx.clone(),
            poll_timeout,
        ));
        let processor = FrameProcessor::new(Arc::clone(&ctx), Arc::clone(&channel), tx, poll_timeout);
        let status = processor.status();
        let processor = Arc::new(Mutex::new(processor));

        info!(
            width = dim.1,
            height = dim.0,
            capacity = channel.capacity(),
            "Pipeline ready"
        );
        let pipeline = Self {
            ctx,
            channel,
            acquisition,
            processor,
            status,
            mode: acq.mode,
            workers: None,
            background_stack: Vec::new(),
        };
        Ok((pipeline, rx))
    }

    pub fn start_single(&mut self) -> Result<()> {
        self.start(AcquisitionMode::Single)
    }

    pub fn start_difference(&mut self) -> Result<()> {
        self.start(AcquisitionMode::Difference)
    }

    /// Start both loops in `mode`, stopping any running loops first.
    pub fn start(&mut self, mode: AcquisitionMode) -> Result<()> {
        if self.ctx.state() == RunState::Closing {
            return Err(FlickerError::Closed);
        }
        self.ctx.begin_reconfigure();
        self.join_workers();
        if mode != self.mode {
            // Items queued by the previous mode must not reach the new one.
            self.channel.rebuild();
        }
        self.mode = mode;
        self.ctx.start()?;
        self.spawn_workers(mode)?;
        info!(%mode, "Pipeline started");
        Ok(())
    }

    /// Stop both loops. Each announces readiness on exit.
    pub fn pause(&mut self) {
        if self.ctx.pause() {
            self.join_workers();
            info!("Pipeline paused");
        }
    }

    /// Restart in the last mode.
    pub fn resume(&mut self) -> Result<()> {
        self.start(self.mode)
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn state(&self) -> RunState {
        self.ctx.state()
    }

    pub fn set_exposure_time(&mut self, seconds: f64) -> Result<()> {
        let was_running = self.suspend();
        let result = self.acquisition.set_exposure_time(seconds);
        self.restart_if(was_running)?;
        result
    }

    /// Change hardware binning. Averaging stacks are recreated and a
    /// background of the old shape is discarded.
    pub fn set_binning(&mut self, binning: u32) -> Result<()> {
        let was_running = self.suspend();
        let result = self.acquisition.set_binning(binning);
        if result.is_ok() {
            self.processor.lock().reset_stacks();
            let dim = self.ctx.dim();
            self.ctx.update_config(|c| {
                if c.background.as_ref().is_some_and(|bg| bg.dim() != dim) {
                    warn!("Discarding background captured at the previous binning");
                    c.background = None;
                }
                Ok(())
            })?;
            self.background_stack.clear();
        }
        self.restart_if(was_running)?;
        result
    }

    /// Capture `n` frames synchronously. Running loops are stopped for the
    /// capture and restarted afterwards.
    pub fn grab_n_frames(&mut self, n: usize) -> Result<Vec<Frame>> {
        let was_running = self.suspend();
        let result = self.acquisition.grab_n_frames(n);
        self.restart_if(was_running)?;
        result
    }

    /// Grab `n` frames, integer-mean them and install the result as the
    /// background frame.
    pub fn capture_background(&mut self, n: usize) -> Result<()> {
        let frames = self.grab_n_frames(n.max(1))?;
        let background = mean_stack(&frames)?;
        self.set_background(Some(background.data))?;
        self.background_stack = frames;
        info!(frames = self.background_stack.len(), "Background captured");
        Ok(())
    }

    /// Raw frames the current background was averaged from.
    pub fn background_stack(&self) -> &[Frame] {
        &self.background_stack
    }

    pub fn set_background(&self, background: Option<Array2<Sample>>) -> Result<()> {
        let dim = self.ctx.dim();
        if let Some(bg) = &background {
            if bg.dim() != dim {
                return Err(FlickerError::DimensionMismatch {
                    expected: dim,
                    actual: bg.dim(),
                });
            }
        }
        self.ctx.update_config(|c| {
            c.background = background.map(Arc::new);
            Ok(())
        })
    }

    pub fn set_enhancement(&self, mode: EnhancementMode) -> Result<()> {
        self.ctx.update_config(|c| {
            c.enhancement = mode;
            Ok(())
        })
    }

    pub fn set_percentiles(&self, low: f32, high: f32) -> Result<()> {
        self.ctx.update_config(|c| c.set_percentiles(low, high))
    }

    pub fn set_clip_limit(&self, clip_limit: f32) -> Result<()> {
        self.ctx.update_config(|c| c.set_clip_limit(clip_limit))
    }

    pub fn set_subtract_background(&self, subtract: bool) -> Result<()> {
        self.ctx.update_config(|c| {
            c.subtract_background = subtract;
            Ok(())
        })
    }

    pub fn set_roi(&self, roi: Roi) -> Result<()> {
        let dim = self.ctx.dim();
        if roi.is_enabled() && !roi.fits(dim) {
            return Err(FlickerError::InvalidConfig(format!(
                "ROI {roi:?} does not fit a {}x{} frame",
                dim.1, dim.0
            )));
        }
        self.ctx.update_config(|c| {
            c.roi = roi;
            Ok(())
        })
    }

    pub fn set_line(&self, line: Option<LineEndpoints>) -> Result<()> {
        self.ctx.update_config(|c| {
            c.line = line;
            Ok(())
        })
    }

    /// Averaging depth; 0 disables averaging.
    pub fn set_averaging(&self, depth: usize) -> Result<()> {
        self.ctx.update_config(|c| c.set_averaging(depth))
    }

    pub fn processing_config(&self) -> ProcessingConfig {
        self.ctx.config()
    }

    /// (height, width) of frames at the current binning.
    pub fn frame_dim(&self) -> (usize, usize) {
        self.ctx.dim()
    }

    pub fn latest_processed(&self) -> Option<Arc<ProcessedFrame>> {
        self.status.lock().latest_processed.clone()
    }

    pub fn latest_raw(&self) -> Option<FrameItem> {
        self.status.lock().latest_raw.clone()
    }

    /// Mean intensities of the most recent raw frames, oldest first.
    pub fn intensity_history(&self) -> Vec<f64> {
        self.status.lock().intensities.iter().copied().collect()
    }

    /// (processed, dropped) item counts.
    pub fn counts(&self) -> (u64, u64) {
        let status = self.status.lock();
        (status.processed, status.dropped)
    }

    pub fn channel(&self) -> &FrameChannel {
        &self.channel
    }

    /// Stop both loops for good.
    pub fn close(&mut self) {
        self.ctx.close();
        self.join_workers();
    }

    /// Stop running loops ahead of a reconfiguration. Returns whether they
    /// were running.
    fn suspend(&mut self) -> bool {
        let was_running = self.ctx.begin_reconfigure();
        self.join_workers();
        was_running
    }

    fn restart_if(&mut self, was_running: bool) -> Result<()> {
        if was_running {
            self.start(self.mode)
        } else {
            Ok(())
        }
    }

    fn spawn_workers(&mut self, mode: AcquisitionMode) -> Result<()> {
        let acquisition = Arc::clone(&self.acquisition);
        let ctx = Arc::clone(&self.ctx);
        let acquisition = thread::Builder::new()
            .name("flicker-acquisition".into())
            .spawn(move || {
                if let Err(e) = acquisition.run(mode) {
                    error!(error = %e, "Acquisition loop failed");
                    ctx.pause();
                }
            })?;

        let processor = Arc::clone(&self.processor);
        let processing = thread::Builder::new()
            .name("flicker-processing".into())
            .spawn(move || processor.lock().run());

        let processing = match processing {
            Ok(handle) => handle,
            Err(e) => {
                self.ctx.pause();
                let _ = acquisition.join();
                return Err(e.into());
            }
        };

        self.workers = Some(Workers {
            acquisition,
            processing,
        });
        Ok(())
    }

    fn join_workers(&mut self) {
        if let Some(workers) = self.workers.take() {
            if workers.acquisition.join().is_err() {
                error!("Acquisition thread panicked");
            }
            if workers.processing.join().is_err() {
                error!("Processing thread panicked");
            }
        }
    }
}

impl<D: CameraDevice + 'static> Drop for Pipeline<D> {
    fn drop(&mut self) {
        self.close();
    }
}
