use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::frame::FrameItem;

/// Fixed-capacity single-producer/single-consumer hand-off between the
/// acquisition and processing loops.
///
/// Two counting resources gate the ring: `spaces` (free slots) and `items`
/// (filled slots). Both sides wait on them with a timeout, so neither loop
/// ever blocks past one poll interval once it has been asked to stop.
///
/// At every point `items + spaces + reserved == capacity`, where `reserved`
/// counts space permits handed out to a producer but not yet committed.
pub struct FrameChannel {
    capacity: usize,
    state: Mutex<ChannelState>,
    space_freed: Condvar,
    item_ready: Condvar,
}

struct ChannelState {
    slots: Vec<Option<FrameItem>>,
    /// Monotonic write cursor; slot = write % capacity.
    write: usize,
    /// Monotonic read cursor; slot = read % capacity.
    read: usize,
    spaces: usize,
    items: usize,
    reserved: usize,
    /// Bumped on every rebuild so permits from an older ring are ignored.
    epoch: u64,
}

impl ChannelState {
    fn fresh(capacity: usize, epoch: u64) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            write: 0,
            read: 0,
            spaces: capacity,
            items: 0,
            reserved: 0,
            epoch,
        }
    }
}

/// Returned by [`FrameChannel::try_push`] when no slot freed up in time.
/// Carries the rejected item back so the caller can retry or drop it.
#[derive(Debug)]
pub struct Full(pub FrameItem);

/// A reserved slot in the channel.
///
/// Dropping the permit without pushing hands the slot back, so an
/// acquisition loop that bails out mid-read never leaks capacity.
pub struct SpacePermit<'a> {
    channel: &'a FrameChannel,
    epoch: u64,
    armed: bool,
}

impl SpacePermit<'_> {
    /// Commit `item` into the reserved slot and signal the consumer.
    pub fn push(mut self, item: FrameItem) {
        self.armed = false;
        let ch = self.channel;
        let mut state = ch.state.lock();
        if state.epoch != self.epoch {
            debug!("Dropping item reserved before channel rebuild");
            return;
        }
        let slot = state.write % ch.capacity;
        state.slots[slot] = Some(item);
        state.write = state.write.wrapping_add(1);
        state.reserved -= 1;
        state.items += 1;
        drop(state);
        ch.item_ready.notify_one();
    }
}

impl Drop for SpacePermit<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let ch = self.channel;
        let mut state = ch.state.lock();
        if state.epoch != self.epoch {
            return;
        }
        state.reserved -= 1;
        state.spaces += 1;
        drop(state);
        ch.space_freed.notify_one();
    }
}

impl FrameChannel {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(ChannelState::fresh(capacity, 0)),
            space_freed: Condvar::new(),
            item_ready: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots not yet reserved by a producer.
    pub fn spaces(&self) -> usize {
        self.state.lock().spaces
    }

    /// Filled slots waiting for the consumer.
    pub fn items(&self) -> usize {
        self.state.lock().items
    }

    /// Slots reserved by an outstanding [`SpacePermit`].
    pub fn reserved(&self) -> usize {
        self.state.lock().reserved
    }

    /// Reserve one slot, waiting at most `timeout`.
    pub fn acquire_space(&self, timeout: Duration) -> Option<SpacePermit<'_>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.spaces == 0 {
            if self.space_freed.wait_until(&mut state, deadline).timed_out() && state.spaces == 0 {
                return None;
            }
        }
        state.spaces -= 1;
        state.reserved += 1;
        Some(SpacePermit {
            channel: self,
            epoch: state.epoch,
            armed: true,
        })
    }

    /// Push `item`, waiting at most `timeout` for a free slot.
    pub fn try_push(&self, item: FrameItem, timeout: Duration) -> Result<(), Full> {
        match self.acquire_space(timeout) {
            Some(permit) => {
                permit.push(item);
                Ok(())
            }
            None => Err(Full(item)),
        }
    }

    /// Pop the oldest item, waiting at most `timeout` for one to arrive.
    ///
    /// If an item permit is obtained but its slot turns out to be empty, the
    /// ring is rebuilt from scratch and `None` is returned.
    pub fn try_pop(&self, timeout: Duration) -> Option<FrameItem> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.items == 0 {
            if self.item_ready.wait_until(&mut state, deadline).timed_out() && state.items == 0 {
                return None;
            }
        }
        state.items -= 1;
        let slot = state.read % self.capacity;
        let item = state.slots[slot].take();
        state.read = state.read.wrapping_add(1);
        state.spaces += 1;

        match item {
            Some(item) => {
                drop(state);
                self.space_freed.notify_one();
                Some(item)
            }
            None => {
                warn!(slot, "Frame channel slot empty after pop, rebuilding channel");
                let epoch = state.epoch + 1;
                *state = ChannelState::fresh(self.capacity, epoch);
                drop(state);
                self.space_freed.notify_all();
                self.item_ready.notify_all();
                None
            }
        }
    }

    /// Discard every queued item and outstanding reservation.
    pub fn rebuild(&self) {
        let mut state = self.state.lock();
        let epoch = state.epoch + 1;
        *state = ChannelState::fresh(self.capacity, epoch);
        drop(state);
        debug!(capacity = self.capacity, "Frame channel rebuilt");
        self.space_freed.notify_all();
        self.item_ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameItem;

    const SHORT: Duration = Duration::from_millis(1);

    #[test]
    fn test_empty_slot_rebuilds_channel() {
        let ch = FrameChannel::new(2);
        ch.try_push(FrameItem::Incomplete, SHORT).unwrap();
        {
            let mut state = ch.state.lock();
            state.slots[0] = None;
        }
        assert!(ch.try_pop(SHORT).is_none());
        assert_eq!(ch.spaces(), 2);
        assert_eq!(ch.items(), 0);

        // Fully usable afterwards.
        ch.try_push(FrameItem::Incomplete, SHORT).unwrap();
        assert!(matches!(ch.try_pop(SHORT), Some(FrameItem::Incomplete)));
    }

    #[test]
    fn test_stale_permit_after_rebuild_is_ignored() {
        let ch = FrameChannel::new(1);
        let permit = ch.acquire_space(SHORT).unwrap();
        ch.rebuild();
        permit.push(FrameItem::Incomplete);
        assert_eq!(ch.items(), 0);
        assert_eq!(ch.spaces(), 1);
        assert_eq!(ch.reserved(), 0);
    }
}
