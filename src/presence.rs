use std::time::{Duration, Instant};

use crate::color::{BLACK, Color};

/// Last known state of one beacon.
#[derive(Clone, Debug)]
pub struct PresenceSlot {
    reported: Color,
    deadline: Option<Instant>,
}

impl PresenceSlot {
    pub fn new() -> Self {
        PresenceSlot {
            reported: BLACK,
            deadline: None,
        }
    }

    pub fn reported_color(&self) -> Color {
        self.reported
    }

    /// Records a report and pushes the liveness deadline to `now + ttl`.
    ///
    /// Returns whether the color changed.
    pub fn refresh(&mut self, color: Color, now: Instant, ttl: Duration) -> bool {
        self.deadline = Some(now + ttl);
        if color == self.reported {
            return false;
        }
        self.reported = color;
        true
    }

    /// True once the deadline has passed without a refresh. Clears the
    /// deadline so the expiry is reported only once.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deadline.is_some()
    }
}
