use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{Array2, Zip};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::background::{subtract_background, subtract_background_difference};
use crate::channel::FrameChannel;
use crate::config::ProcessingConfig;
use crate::consts::{HISTOGRAM_BINS, INTENSITY_HISTORY_LEN};
use crate::enhance::enhance;
use crate::error::{FlickerError, Result};
use crate::events::{emit, EventSender, PipelineEvent};
use crate::frame::{Frame, FrameItem, Sample};
use crate::measure::{histogram, line_profile, mean_intensity, roi_mean, Histogram};
use crate::stack::FrameStack;
use crate::state::SharedContext;

/// Whether a processed frame came from one exposure or a difference pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Single,
    Difference,
}

/// Measurements published with every processed frame.
#[derive(Clone, Debug, Default)]
pub struct Measurements {
    /// Mean of the contributing raw frame(s).
    pub mean_intensity: f64,
    /// Means of exposures A and B, difference mode only.
    pub pair_means: Option<(f64, f64)>,
    /// Mean over the ROI of the pre-enhancement frame.
    pub roi_mean: Option<f64>,
    /// Samples along the configured line of the enhanced frame.
    pub line_profile: Option<Vec<Sample>>,
    /// Histogram of the enhanced frame.
    pub histogram: Histogram,
    /// Hardware time since the previous processed frame.
    pub frame_interval: Option<Duration>,
    pub processing_time: Duration,
    /// Number of frames (or pairs) averaged into this result.
    pub averaged: usize,
}

/// Output of the processing loop for one channel item.
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    pub kind: FrameKind,
    /// Hardware index of the newest contributing frame.
    pub index: u64,
    pub timestamp_us: u64,
    pub bit_depth: u8,
    /// Averaged or differenced frame before background subtraction and
    /// enhancement.
    pub source: Array2<Sample>,
    /// Display frame after background subtraction and enhancement.
    pub enhanced: Array2<Sample>,
    pub measurements: Measurements,
}

/// Results the processing loop publishes for readers on other threads.
#[derive(Debug, Default)]
pub struct ProcessorStatus {
    /// Mean intensities of the most recent raw frames, oldest first.
    pub intensities: VecDeque<f64>,
    /// Latest raw frame or pair that produced a result.
    pub latest_raw: Option<FrameItem>,
    pub latest_processed: Option<Arc<ProcessedFrame>>,
    pub processed: u64,
    pub dropped: u64,
}

/// Consumer side of the pipeline.
///
/// Owns the averaging stacks; the orchestrator only touches them through
/// [`FrameProcessor::reset_stacks`] while the loop is stopped.
pub struct FrameProcessor {
    ctx: Arc<SharedContext>,
    channel: Arc<FrameChannel>,
    events: EventSender,
    poll_timeout: Duration,
    single_stack: Option<FrameStack>,
    stack_a: Option<FrameStack>,
    stack_b: Option<FrameStack>,
    last_timestamp_us: Option<u64>,
    status: Arc<Mutex<ProcessorStatus>>,
}

impl FrameProcessor {
    pub fn new(
        ctx: Arc<SharedContext>,
        channel: Arc<FrameChannel>,
        events: EventSender,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            ctx,
            channel,
            events,
            poll_timeout,
            single_stack: None,
            stack_a: None,
            stack_b: None,
            last_timestamp_us: None,
            status: Arc::new(Mutex::new(ProcessorStatus {
                intensities: VecDeque::with_capacity(INTENSITY_HISTORY_LEN),
                ..Default::default()
            })),
        }
    }

    /// Pop and process items until the shared state leaves `Running`.
    pub fn run(&mut self) {
        info!("Frame processing started");
        while self.ctx.is_running() {
            let Some(item) = self.channel.try_pop(self.poll_timeout) else {
                continue;
            };
            self.handle(item);
        }
        let (processed, dropped) = self.counts();
        info!(processed, dropped, "Frame processing stopped");
        if self.ctx.should_notify_ready() {
            emit(&self.events, PipelineEvent::ProcessorReady);
        }
    }

    /// Process one channel item and publish the result.
    pub fn handle(&mut self, item: FrameItem) -> Option<Arc<ProcessedFrame>> {
        let started = Instant::now();
        let (config, dim) = self.ctx.snapshot();

        match item.dim() {
            None => {
                debug!("Discarding incomplete pair marker");
                return None;
            }
            Some(actual) if actual != dim => {
                warn!(
                    expected = ?dim,
                    actual = ?actual,
                    "Discarding frame with stale dimensions"
                );
                self.status.lock().dropped += 1;
                return None;
            }
            Some(_) => {}
        }

        let result = match &item {
            FrameItem::Single(frame) => self.process_single(frame, &config, dim),
            FrameItem::DifferencePair(a, b) => self.process_pair(a, b, &config, dim),
            FrameItem::Incomplete => return None,
        };

        match result {
            Ok(mut processed) => {
                processed.measurements.processing_time = started.elapsed();
                let processed = Arc::new(processed);
                {
                    let mut status = self.status.lock();
                    status.latest_raw = Some(item);
                    status.latest_processed = Some(Arc::clone(&processed));
                    status.processed += 1;
                }
                emit(&self.events, PipelineEvent::FrameProcessed(Arc::clone(&processed)));
                Some(processed)
            }
            Err(e) => {
                warn!(error = %e, "Frame processing failed, skipping");
                self.status.lock().dropped += 1;
                None
            }
        }
    }

    fn process_single(
        &mut self,
        frame: &Frame,
        config: &ProcessingConfig,
        dim: (usize, usize),
    ) -> Result<ProcessedFrame> {
        let mean = mean_intensity(&frame.data);
        self.record_intensity(mean);

        let (source, averaged) = if config.averaging_enabled() {
            let stack = ensure_stack(&mut self.single_stack, config.averaging, dim);
            stack.push(frame.clone())?;
            (stack.mean()?, stack.len())
        } else {
            (frame.data.clone(), 1)
        };

        let subtracted = match (config.subtract_background, &config.background) {
            (true, Some(bg)) => Some(subtract_background(&source, bg)),
            _ => None,
        };
        let measurements = Measurements {
            mean_intensity: mean,
            frame_interval: self.interval_since_last(frame.timestamp_us),
            averaged,
            ..Default::default()
        };
        self.finish(FrameKind::Single, frame, source, subtracted, config, measurements)
    }

    fn process_pair(
        &mut self,
        a: &Frame,
        b: &Frame,
        config: &ProcessingConfig,
        dim: (usize, usize),
    ) -> Result<ProcessedFrame> {
        if b.dim() != a.dim() {
            return Err(FlickerError::DimensionMismatch {
                expected: a.dim(),
                actual: b.dim(),
            });
        }
        let mean_a = mean_intensity(&a.data);
        let mean_b = mean_intensity(&b.data);
        self.record_intensity(mean_a);
        self.record_intensity(mean_b);

        let (source, averaged) = if config.averaging_enabled() {
            let stack_a = ensure_stack(&mut self.stack_a, config.averaging, dim);
            stack_a.push(a.clone())?;
            let avg_a = stack_a.mean()?;
            let stack_b = ensure_stack(&mut self.stack_b, config.averaging, dim);
            stack_b.push(b.clone())?;
            let avg_b = stack_b.mean()?;
            (difference(&avg_a, &avg_b), stack_b.len())
        } else {
            (difference(&a.data, &b.data), 1)
        };

        let subtracted = match (config.subtract_background, &config.background) {
            (true, Some(bg)) => Some(subtract_background_difference(&source, bg, b.bit_depth)),
            _ => None,
        };
        let measurements = Measurements {
            mean_intensity: (mean_a + mean_b) / 2.0,
            pair_means: Some((mean_a, mean_b)),
            frame_interval: self.interval_since_last(b.timestamp_us),
            averaged,
            ..Default::default()
        };
        self.finish(FrameKind::Difference, b, source, subtracted, config, measurements)
    }

    /// Shared tail: background, enhancement and the measurements that depend
    /// on them.
    fn finish(
        &mut self,
        kind: FrameKind,
        newest: &Frame,
        source: Array2<Sample>,
        subtracted: Option<Result<Array2<Sample>>>,
        config: &ProcessingConfig,
        mut measurements: Measurements,
    ) -> Result<ProcessedFrame> {
        let bit_depth = newest.bit_depth;
        let subtracted = match subtracted {
            Some(Ok(data)) => Some(data),
            Some(Err(e)) => {
                warn!(error = %e, "Background does not match frame, not subtracting");
                None
            }
            None => None,
        };
        let enhanced = enhance(subtracted.as_ref().unwrap_or(&source), config, bit_depth);

        measurements.roi_mean = roi_mean(&source, &config.roi);
        measurements.line_profile = config.line.as_ref().and_then(|l| line_profile(&enhanced, l));
        measurements.histogram = histogram(&enhanced, HISTOGRAM_BINS, bit_depth);
        self.last_timestamp_us = Some(newest.timestamp_us);

        Ok(ProcessedFrame {
            kind,
            index: newest.index,
            timestamp_us: newest.timestamp_us,
            bit_depth,
            source,
            enhanced,
            measurements,
        })
    }

    fn record_intensity(&self, mean: f64) {
        let intensities = &mut self.status.lock().intensities;
        if intensities.len() == INTENSITY_HISTORY_LEN {
            intensities.pop_front();
        }
        intensities.push_back(mean);
    }

    fn interval_since_last(&self, timestamp_us: u64) -> Option<Duration> {
        self.last_timestamp_us
            .filter(|&last| timestamp_us >= last)
            .map(|last| Duration::from_micros(timestamp_us - last))
    }

    /// Drop every averaging stack. They are recreated with the current frame
    /// shape on the next frame.
    pub fn reset_stacks(&mut self) {
        self.single_stack = None;
        self.stack_a = None;
        self.stack_b = None;
        self.last_timestamp_us = None;
    }

    pub fn single_stack(&self) -> Option<&FrameStack> {
        self.single_stack.as_ref()
    }

    pub fn difference_stacks(&self) -> (Option<&FrameStack>, Option<&FrameStack>) {
        (self.stack_a.as_ref(), self.stack_b.as_ref())
    }

    /// Shared handle to the published results, readable while the loop runs.
    pub fn status(&self) -> Arc<Mutex<ProcessorStatus>> {
        Arc::clone(&self.status)
    }

    pub fn latest_raw(&self) -> Option<FrameItem> {
        self.status.lock().latest_raw.clone()
    }

    pub fn latest_processed(&self) -> Option<Arc<ProcessedFrame>> {
        self.status.lock().latest_processed.clone()
    }

    pub fn intensity_history(&self) -> Vec<f64> {
        self.status.lock().intensities.iter().copied().collect()
    }

    /// (processed, dropped) item counts.
    pub fn counts(&self) -> (u64, u64) {
        let status = self.status.lock();
        (status.processed, status.dropped)
    }
}

/// Return the stack in `slot`, recreating it if the averaging depth or frame
/// shape changed.
fn ensure_stack(slot: &mut Option<FrameStack>, depth: usize, dim: (usize, usize)) -> &mut FrameStack {
    let stale = slot
        .as_ref()
        .map_or(true, |s| s.capacity() != depth || s.dim() != dim);
    if stale {
        debug!(depth, ?dim, "Allocating averaging stack");
        *slot = Some(FrameStack::new(depth, dim));
    }
    slot.get_or_insert_with(|| FrameStack::new(depth, dim))
}

/// Signed elementwise `a - b`.
fn difference(a: &Array2<Sample>, b: &Array2<Sample>) -> Array2<Sample> {
    Zip::from(a).and(b).map_collect(|&x, &y| x - y)
}
