use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvError, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::processing::ProcessedFrame;

/// Notifications sent from the worker loops to whoever drives the pipeline.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// The acquisition loop exited or the camera was reconfigured; the device
    /// can accept a new start.
    CameraReady,
    /// The processing loop exited; dimension-dependent state may be
    /// reallocated before the next start.
    ProcessorReady,
    /// One frame (or pair) has been processed.
    FrameProcessed(Arc<ProcessedFrame>),
}

/// Build an event queue holding at most `max_frames` undelivered
/// [`PipelineEvent::FrameProcessed`] notifications.
///
/// Frame notifications beyond that are dropped; the latest result stays
/// readable from the processor status. Ready notifications are never
/// dropped.
pub fn event_channel(max_frames: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    let queued = Arc::new(AtomicUsize::new(0));
    let sender = EventSender {
        tx,
        queued_frames: Arc::clone(&queued),
        max_frames: max_frames.max(1),
    };
    let receiver = EventReceiver {
        rx,
        queued_frames: queued,
    };
    (sender, receiver)
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PipelineEvent>,
    queued_frames: Arc<AtomicUsize>,
    max_frames: usize,
}

impl EventSender {
    /// Queue `event`. Returns false if it was dropped, either because the
    /// frame queue is full or because the receiver is gone.
    pub fn send(&self, event: PipelineEvent) -> bool {
        if !matches!(event, PipelineEvent::FrameProcessed(_)) {
            return self.tx.send(event).is_ok();
        }

        let max = self.max_frames;
        let reserved = self
            .queued_frames
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1));
        if reserved.is_err() {
            trace!(max, "Event queue full, dropping frame notification");
            return false;
        }
        if self.tx.send(event).is_err() {
            self.queued_frames.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }
}

pub struct EventReceiver {
    rx: mpsc::Receiver<PipelineEvent>,
    queued_frames: Arc<AtomicUsize>,
}

impl EventReceiver {
    pub fn recv(&self) -> Result<PipelineEvent, RecvError> {
        self.rx.recv().map(|e| self.delivered(e))
    }

    pub fn try_recv(&self) -> Result<PipelineEvent, TryRecvError> {
        self.rx.try_recv().map(|e| self.delivered(e))
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<PipelineEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout).map(|e| self.delivered(e))
    }

    /// Drain whatever is queued without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = PipelineEvent> + '_ {
        std::iter::from_fn(move || self.try_recv().ok())
    }

    /// Frame notifications queued and not yet received.
    pub fn pending_frames(&self) -> usize {
        self.queued_frames.load(Ordering::Acquire)
    }

    fn delivered(&self, event: PipelineEvent) -> PipelineEvent {
        if matches!(event, PipelineEvent::FrameProcessed(_)) {
            self.queued_frames.fetch_sub(1, Ordering::AcqRel);
        }
        event
    }
}

/// Send an event; a dropped receiver is not an error for the loops.
pub(crate) fn emit(tx: &EventSender, event: PipelineEvent) {
    tx.send(event);
}
