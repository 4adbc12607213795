use std::time::{Duration, Instant};

use crate::animation::Phase;
use crate::roster::SlotId;

/// Identifies an armed timer and carries what its expiry should act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerHandle {
    Liveness { slot: SlotId },
    Frame { slot: SlotId, phase: Phase },
}

impl TimerHandle {
    pub fn slot(&self) -> SlotId {
        match *self {
            TimerHandle::Liveness { slot } | TimerHandle::Frame { slot, .. } => slot,
        }
    }

    /// Two handles with the same slot and kind share one timer.
    fn same_timer(&self, other: &TimerHandle) -> bool {
        matches!(
            (self, other),
            (TimerHandle::Liveness { slot: a }, TimerHandle::Liveness { slot: b })
                | (TimerHandle::Frame { slot: a, .. }, TimerHandle::Frame { slot: b, .. })
                if a == b
        )
    }
}

/// One-shot timers keyed by slot and kind.
pub trait TimerQueue {
    /// Arms `handle` to fire `delay` after `now`, replacing any timer of the
    /// same slot and kind.
    fn arm(&mut self, handle: TimerHandle, delay: Duration, now: Instant);

    /// Cancels the timer of the same slot and kind as `handle`, if armed.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Deadline table polled by the run loop.
#[derive(Debug, Default)]
pub struct DeadlineTimers {
    armed: Vec<(TimerHandle, Instant)>,
}

impl DeadlineTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.iter().map(|(_, deadline)| *deadline).min()
    }

    /// Removes and returns the earliest timer due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerHandle> {
        let index = self
            .armed
            .iter()
            .enumerate()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .min_by_key(|(_, (_, deadline))| *deadline)
            .map(|(index, _)| index)?;
        Some(self.armed.remove(index).0)
    }

    #[cfg(test)]
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.armed.iter().any(|(armed, _)| *armed == handle)
    }
}

impl TimerQueue for DeadlineTimers {
    fn arm(&mut self, handle: TimerHandle, delay: Duration, now: Instant) {
        self.cancel(handle);
        self.armed.push((handle, now + delay));
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.retain(|(armed, _)| !armed.same_timer(&handle));
    }
}
