use ndarray::Array2;

use crate::error::{FlickerError, Result};
use crate::frame::{Frame, Sample};

use super::mean::int_mean;

/// Rolling stack of the last `capacity` frames.
///
/// Appends overwrite the oldest slot once the stack is full. After `k`
/// insertions with `k >= capacity`, slot `(k - 1) % capacity` holds the most
/// recent frame and slot `k % capacity` the oldest.
#[derive(Debug)]
pub struct FrameStack {
    slots: Vec<Frame>,
    capacity: usize,
    inserted: usize,
    dim: (usize, usize),
}

impl FrameStack {
    /// `dim` is (height, width); every pushed frame must match it.
    pub fn new(capacity: usize, dim: (usize, usize)) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            inserted: 0,
            dim,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid frames.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Total insertions since creation.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if frame.dim() != self.dim {
            return Err(FlickerError::DimensionMismatch {
                expected: self.dim,
                actual: frame.dim(),
            });
        }
        let slot = self.inserted % self.capacity;
        if slot < self.slots.len() {
            self.slots[slot] = frame;
        } else {
            self.slots.push(frame);
        }
        self.inserted += 1;
        Ok(())
    }

    /// Most recently pushed frame.
    pub fn latest(&self) -> Option<&Frame> {
        if self.inserted == 0 {
            return None;
        }
        self.slots.get((self.inserted - 1) % self.capacity)
    }

    /// Oldest frame still held.
    pub fn oldest(&self) -> Option<&Frame> {
        if self.is_full() {
            self.slots.get(self.inserted % self.capacity)
        } else {
            self.slots.first()
        }
    }

    /// Frames in slot order.
    pub fn frames(&self) -> &[Frame] {
        &self.slots
    }

    /// Integer mean of every valid frame.
    pub fn mean(&self) -> Result<Array2<Sample>> {
        int_mean(self.slots.iter().map(|f| &f.data))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.inserted = 0;
    }
}
