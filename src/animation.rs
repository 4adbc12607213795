//! Per-beacon brightness ramp.
//!
//! ```text
//!            refreshed                 tick (== 100)
//!   Dark ─────────────▶ Undimming ─────────────────▶ Steady
//!    ▲                   ▲      │                       │
//!    │ tick (== 0)       │      │ lost                  │ lost
//!    │         refreshed │      ▼                       │
//!    └────────────────── Dimming ◀──────────────────────┘
//! ```
//!
//! The animation never touches timers itself. Every event returns an
//! [`Outcome`] telling the caller what to do with the slot's frame timer.

use log::debug;

use crate::color::FULL_BRIGHTNESS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Dark,
    Undimming,
    Steady,
    Dimming,
}

/// What the caller must do with the frame timer after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameTimer {
    /// Cancel any armed frame timer and arm a new one for the current phase.
    Arm,
    Disarm,
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub brightness_changed: bool,
    pub frame_timer: FrameTimer,
}

impl Outcome {
    const IDLE: Outcome = Outcome {
        brightness_changed: false,
        frame_timer: FrameTimer::Unchanged,
    };
}

#[derive(Clone, Debug)]
pub struct Animation {
    brightness: u8,
    phase: Phase,
    step: u8,
}

impl Animation {
    /// `step` is the brightness change per frame, in percentage points.
    pub fn new(step: u8) -> Self {
        Animation {
            brightness: 0,
            phase: Phase::Dark,
            step: step.clamp(1, FULL_BRIGHTNESS),
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// A report arrived for this beacon.
    ///
    /// Starts an undim ramp from `Dark` or `Dimming`, applying the first step
    /// right away.
    pub fn presence_refreshed(&mut self) -> Outcome {
        match self.phase {
            Phase::Undimming | Phase::Steady => Outcome::IDLE,
            Phase::Dark | Phase::Dimming => {
                self.enter(Phase::Undimming);
                self.brighten()
            }
        }
    }

    /// The beacon's liveness deadline passed.
    pub fn presence_lost(&mut self) -> Outcome {
        match self.phase {
            Phase::Steady | Phase::Undimming => {
                self.enter(Phase::Dimming);
                Outcome {
                    brightness_changed: false,
                    frame_timer: FrameTimer::Arm,
                }
            }
            Phase::Dark | Phase::Dimming => Outcome::IDLE,
        }
    }

    /// The frame timer armed for `phase` fired.
    ///
    /// Ticks for a phase the slot has already left are ignored.
    pub fn frame_tick(&mut self, phase: Phase) -> Outcome {
        if phase != self.phase {
            debug!("Ignoring stale {:?} frame (now {:?})", phase, self.phase);
            return Outcome::IDLE;
        }
        match self.phase {
            Phase::Undimming => self.brighten(),
            Phase::Dimming => self.darken(),
            Phase::Dark | Phase::Steady => Outcome::IDLE,
        }
    }

    fn brighten(&mut self) -> Outcome {
        self.brightness = self.brightness.saturating_add(self.step).min(FULL_BRIGHTNESS);
        if self.brightness == FULL_BRIGHTNESS {
            self.enter(Phase::Steady);
            return Outcome {
                brightness_changed: true,
                frame_timer: FrameTimer::Disarm,
            };
        }
        Outcome {
            brightness_changed: true,
            frame_timer: FrameTimer::Arm,
        }
    }

    fn darken(&mut self) -> Outcome {
        self.brightness = self.brightness.saturating_sub(self.step);
        if self.brightness == 0 {
            self.enter(Phase::Dark);
            return Outcome {
                brightness_changed: true,
                frame_timer: FrameTimer::Disarm,
            };
        }
        Outcome {
            brightness_changed: true,
            frame_timer: FrameTimer::Arm,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(
            "Phase {:?} -> {:?} at brightness {}",
            self.phase, phase, self.brightness
        );
        self.phase = phase;
    }
}

/// Number of frames a full ramp takes.
pub fn frame_count(step: u8) -> u32 {
    u32::from(FULL_BRIGHTNESS).div_ceil(u32::from(step.clamp(1, FULL_BRIGHTNESS)))
}
