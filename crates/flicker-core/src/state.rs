use parking_lot::Mutex;

use crate::config::ProcessingConfig;
use crate::error::{FlickerError, Result};

/// Lifecycle of the two worker loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Loops stopped. A loop that exits into this state announces it is ready.
    Idle,
    /// Loops keep pulling frames.
    Running,
    /// A mode change is pending: loops exit without announcing readiness.
    Waiting,
    /// Shutting down for good.
    Closing,
}

struct Shared {
    run: RunState,
    /// (height, width) of the frames currently produced.
    dim: (usize, usize),
    config: ProcessingConfig,
}

/// State shared by reference between the orchestrator, the acquisition loop
/// and the processing loop. Everything sits behind a single mutex; the run
/// state only changes through the transition methods below.
pub struct SharedContext {
    inner: Mutex<Shared>,
}

impl SharedContext {
    pub fn new(dim: (usize, usize), config: ProcessingConfig) -> Self {
        Self {
            inner: Mutex::new(Shared {
                run: RunState::Idle,
                dim,
                config,
            }),
        }
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().run
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().run == RunState::Running
    }

    /// Move to `to` only if currently in `from`. Returns whether it happened.
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        let mut inner = self.inner.lock();
        if inner.run == from {
            inner.run = to;
            true
        } else {
            false
        }
    }

    /// Idle or Waiting -> Running. Fails once closing.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.run {
            RunState::Closing => Err(FlickerError::Closed),
            _ => {
                inner.run = RunState::Running;
                Ok(())
            }
        }
    }

    /// Running -> Idle.
    pub fn pause(&self) -> bool {
        self.transition(RunState::Running, RunState::Idle)
    }

    /// Running -> Waiting, ahead of a mode change.
    pub fn begin_reconfigure(&self) -> bool {
        self.transition(RunState::Running, RunState::Waiting)
    }

    /// Any state -> Closing.
    pub fn close(&self) {
        self.inner.lock().run = RunState::Closing;
    }

    /// Whether a loop exiting now should announce it is ready for a restart.
    pub fn should_notify_ready(&self) -> bool {
        !matches!(self.inner.lock().run, RunState::Waiting | RunState::Closing)
    }

    pub fn dim(&self) -> (usize, usize) {
        self.inner.lock().dim
    }

    pub fn set_dim(&self, dim: (usize, usize)) {
        self.inner.lock().dim = dim;
    }

    /// Copy of the processing configuration and the current frame shape,
    /// taken atomically.
    pub fn snapshot(&self) -> (ProcessingConfig, (usize, usize)) {
        let inner = self.inner.lock();
        (inner.config.clone(), inner.dim)
    }

    pub fn config(&self) -> ProcessingConfig {
        self.inner.lock().config.clone()
    }

    /// Apply a fallible edit to the configuration. On error the previous
    /// configuration is kept.
    pub fn update_config<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut ProcessingConfig) -> Result<()>,
    {
        let mut inner = self.inner.lock();
        let mut next = inner.config.clone();
        edit(&mut next)?;
        inner.config = next;
        Ok(())
    }
}
