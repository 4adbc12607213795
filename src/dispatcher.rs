//! Routes advertisement reports and timer expiries into the presence slots
//! and brightness animations, and renders the blended result.
//!
//! The dispatcher is driven from a single task. Every handler runs to
//! completion and re-arms or cancels timers synchronously, so a liveness
//! expiry can never be processed against a slot that was refreshed after the
//! expiry was scheduled.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::animation::{Animation, FrameTimer, Outcome};
use crate::blend::blend;
use crate::color::{BLACK, Color};
use crate::messages::{AdvertisementReport, MIN_PAYLOAD_LEN};
use crate::output::LightOutput;
use crate::presence::PresenceSlot;
use crate::roster::{Roster, SlotId};
use crate::timers::{TimerHandle, TimerQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Reports weaker than this (dBm) are dropped.
    pub rssi_threshold: i8,
    pub presence_timeout: Duration,
    /// Brightness change per frame, in percentage points.
    pub step: u8,
    pub frame_period: Duration,
}

/// Why a report was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    UnknownDevice(u16),
    WeakSignal(i8),
    MalformedPayload(usize),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UnknownDevice(id) => write!(f, "unknown device 0x{:04X}", id),
            Rejection::WeakSignal(rssi) => write!(f, "signal too weak ({} dBm)", rssi),
            Rejection::MalformedPayload(len) => write!(
                f,
                "payload of {} bytes is shorter than {}",
                len, MIN_PAYLOAD_LEN
            ),
        }
    }
}

struct Slot {
    presence: PresenceSlot,
    animation: Animation,
}

impl Slot {
    fn animated_color(&self) -> Color {
        self.presence.reported_color().scale(self.animation.brightness())
    }
}

pub struct Dispatcher<O> {
    roster: Roster,
    slots: Vec<Slot>,
    settings: Settings,
    output: O,
    rendered: Color,
}

impl<O: LightOutput> Dispatcher<O> {
    pub fn new(roster: Roster, settings: Settings, output: O) -> Self {
        let slots = (0..roster.len())
            .map(|_| Slot {
                presence: PresenceSlot::new(),
                animation: Animation::new(settings.step),
            })
            .collect();
        Dispatcher {
            roster,
            slots,
            settings,
            output,
            rendered: BLACK,
        }
    }

    /// Applies one advertisement report.
    ///
    /// Accepted reports reset the slot's liveness timer before anything else
    /// happens, then start or continue the undim ramp.
    pub fn handle_report(
        &mut self,
        report: &AdvertisementReport,
        now: Instant,
        timers: &mut impl TimerQueue,
    ) -> Result<SlotId, Rejection> {
        let slot = self
            .roster
            .lookup(report.sender)
            .ok_or(Rejection::UnknownDevice(report.sender))?;
        if report.rssi < self.settings.rssi_threshold {
            return Err(Rejection::WeakSignal(report.rssi));
        }
        let color = report
            .color()
            .ok_or(Rejection::MalformedPayload(report.payload.len()))?;

        timers.arm(TimerHandle::Liveness { slot }, self.settings.presence_timeout, now);

        let state = &mut self.slots[slot];
        if state.presence.refresh(color, now, self.settings.presence_timeout) {
            debug!("{} now reports color {}", self.roster.name(slot), color);
        }
        let outcome = state.animation.presence_refreshed();
        self.apply(slot, outcome, now, timers);
        self.render();
        Ok(slot)
    }

    /// Applies one timer expiry.
    pub fn handle_timer(
        &mut self,
        handle: TimerHandle,
        now: Instant,
        timers: &mut impl TimerQueue,
    ) {
        let slot = handle.slot();
        let Some(state) = self.slots.get_mut(slot) else {
            debug!("Ignoring timer for unknown slot {}", slot);
            return;
        };

        let outcome = match handle {
            TimerHandle::Liveness { .. } => {
                if !state.presence.expire(now) {
                    debug!("Ignoring stale liveness timer for slot {}", slot);
                    return;
                }
                info!("{} went silent", self.roster.name(slot));
                state.animation.presence_lost()
            }
            TimerHandle::Frame { phase, .. } => state.animation.frame_tick(phase),
        };
        self.apply(slot, outcome, now, timers);
        if outcome.brightness_changed {
            self.render();
        }
    }

    /// Turns the light off if it is on.
    pub fn shutdown(&mut self) {
        if !self.rendered.is_black() {
            self.rendered = BLACK;
            self.output.render(BLACK);
        }
    }

    /// Number of beacons currently considered present.
    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.presence.is_live()).count()
    }

    fn apply(
        &mut self,
        slot: SlotId,
        outcome: Outcome,
        now: Instant,
        timers: &mut impl TimerQueue,
    ) {
        let phase = self.slots[slot].animation.phase();
        let handle = TimerHandle::Frame { slot, phase };
        match outcome.frame_timer {
            FrameTimer::Arm => timers.arm(handle, self.settings.frame_period, now),
            FrameTimer::Disarm => timers.cancel(handle),
            FrameTimer::Unchanged => {}
        }
    }

    /// Re-blends every slot and renders if the result differs from what is
    /// currently shown.
    fn render(&mut self) {
        let color = blend(self.slots.iter().map(Slot::animated_color));
        if color != self.rendered {
            self.rendered = color;
            self.output.render(color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Phase;
    use crate::messages::manufacturer_payload;
    use crate::roster::RosterEntry;
    use crate::timers::DeadlineTimers;

    const MS: Duration = Duration::from_millis(1);
    const RED: Color = Color::new(255, 0, 0);
    const GREEN: Color = Color::new(0, 255, 0);

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Color>,
    }

    impl LightOutput for Recorder {
        fn render(&mut self, color: Color) {
            self.frames.push(color);
        }
    }

    impl<O> Dispatcher<O> {
        fn phase(&self, slot: SlotId) -> Phase {
            self.slots[slot].animation.phase()
        }

        fn brightness(&self, slot: SlotId) -> u8 {
            self.slots[slot].animation.brightness()
        }

        fn reported_color(&self, slot: SlotId) -> Color {
            self.slots[slot].presence.reported_color()
        }
    }

    /// Simulated clock driving a dispatcher and its timers.
    struct Harness {
        dispatcher: Dispatcher<Recorder>,
        timers: DeadlineTimers,
        start: Instant,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let roster = Roster::new(vec![
                RosterEntry {
                    id: 0xAABB,
                    name: "left".to_string(),
                },
                RosterEntry {
                    id: 0xCCDD,
                    name: "right".to_string(),
                },
            ])
            .unwrap();
            let settings = Settings {
                rssi_threshold: -48,
                presence_timeout: 1500 * MS,
                step: 10,
                frame_period: 100 * MS,
            };
            let start = Instant::now();
            Harness {
                dispatcher: Dispatcher::new(roster, settings, Recorder::default()),
                timers: DeadlineTimers::new(),
                start,
                now: start,
            }
        }

        fn at(&self, ms: u64) -> Instant {
            self.start + Duration::from_millis(ms)
        }

        /// Fires every timer due up to `ms`, each at its own deadline.
        fn advance_to(&mut self, ms: u64) {
            let until = self.at(ms);
            while let Some(deadline) = self.timers.next_deadline().filter(|d| *d <= until) {
                let handle = self.timers.pop_due(deadline).unwrap();
                self.dispatcher.handle_timer(handle, deadline, &mut self.timers);
            }
            self.now = until;
        }

        fn report(
            &mut self,
            ms: u64,
            sender: u16,
            color: Color,
            rssi: i8,
        ) -> Result<SlotId, Rejection> {
            self.advance_to(ms);
            let report = AdvertisementReport {
                sender,
                payload: manufacturer_payload(0x0059, &[color.green, color.red, color.blue]),
                rssi,
            };
            self.dispatcher.handle_report(&report, self.now, &mut self.timers)
        }

        fn frames(&self) -> &[Color] {
            &self.dispatcher.output.frames
        }

        fn last_frame(&self) -> Option<Color> {
            self.frames().last().copied()
        }
    }

    #[test]
    fn test_two_beacons_blend_and_fade() {
        let mut h = Harness::new();

        assert_eq!(h.report(0, 0xAABB, RED, -40), Ok(0));
        assert_eq!(h.last_frame(), Some(Color::new(25, 0, 0)));
        h.advance_to(900);
        assert_eq!(h.dispatcher.phase(0), Phase::Steady);
        assert_eq!(h.last_frame(), Some(RED));
        assert_eq!(h.frames().len(), 10);

        for ms in (1000..=4000).step_by(500) {
            if ms <= 1500 {
                h.report(ms, 0xAABB, RED, -40).unwrap();
            }
            h.report(ms, 0xCCDD, GREEN, -40).unwrap();
            if ms == 2000 {
                assert_eq!(h.last_frame(), Some(Color::new(255, 255, 0)));
            }
        }

        // Left expired at 3000 and finished dimming at 4000.
        assert_eq!(h.dispatcher.phase(0), Phase::Dark);
        assert_eq!(h.dispatcher.phase(1), Phase::Steady);
        assert_eq!(h.last_frame(), Some(GREEN));
        assert_eq!(h.dispatcher.present_count(), 1);
    }

    #[test]
    fn test_silent_beacon_goes_dark_within_ttl_and_ramp() {
        let mut h = Harness::new();
        h.report(0, 0xAABB, RED, -40).unwrap();
        h.advance_to(1000);
        h.report(1000, 0xAABB, RED, -40).unwrap();

        h.advance_to(2499);
        assert_eq!(h.dispatcher.phase(0), Phase::Steady);
        h.advance_to(2500 + 1000);
        assert_eq!(h.dispatcher.phase(0), Phase::Dark);
        assert_eq!(h.dispatcher.brightness(0), 0);
        assert_eq!(h.last_frame(), Some(Color::new(0, 0, 0)));

        let rendered = h.frames().len();
        h.advance_to(10_000);
        assert_eq!(h.frames().len(), rendered);
        assert_eq!(h.timers.next_deadline(), None);
    }

    #[test]
    fn test_rejected_reports_change_nothing() {
        let mut h = Harness::new();
        assert_eq!(
            h.report(0, 0x1234, RED, -40),
            Err(Rejection::UnknownDevice(0x1234))
        );
        assert_eq!(
            h.report(0, 0xAABB, RED, -90),
            Err(Rejection::WeakSignal(-90))
        );

        let short = AdvertisementReport {
            sender: 0xAABB,
            payload: vec![0x02, 0x01, 0x06],
            rssi: -40,
        };
        assert_eq!(
            h.dispatcher.handle_report(&short, h.now, &mut h.timers),
            Err(Rejection::MalformedPayload(3))
        );

        assert_eq!(h.dispatcher.reported_color(0), BLACK);
        assert!(h.frames().is_empty());
        assert_eq!(h.timers.next_deadline(), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut h = Harness::new();
        assert_eq!(h.report(0, 0xCCDD, GREEN, -48), Ok(1));
    }

    #[test]
    fn test_color_change_while_steady_renders_immediately() {
        let mut h = Harness::new();
        h.report(0, 0xAABB, RED, -40).unwrap();
        h.advance_to(900);
        h.report(1000, 0xAABB, GREEN, -40).unwrap();
        assert_eq!(h.dispatcher.phase(0), Phase::Steady);
        assert_eq!(h.last_frame(), Some(GREEN));
    }

    #[test]
    fn test_color_change_while_undimming_keeps_ramp() {
        let mut h = Harness::new();
        h.report(0, 0xAABB, RED, -40).unwrap();
        h.advance_to(200);
        assert_eq!(h.dispatcher.brightness(0), 30);

        let blue = Color::new(0, 0, 255);
        h.report(250, 0xAABB, blue, -40).unwrap();
        assert_eq!(h.dispatcher.phase(0), Phase::Undimming);
        assert_eq!(h.dispatcher.brightness(0), 30);
        assert_eq!(h.dispatcher.reported_color(0), blue);
        assert_eq!(h.last_frame(), Some(Color::new(0, 0, 76)));

        // The ramp continues on its original schedule.
        h.advance_to(300);
        assert_eq!(h.dispatcher.brightness(0), 40);
        h.advance_to(900);
        assert_eq!(h.dispatcher.phase(0), Phase::Steady);
        assert_eq!(h.last_frame(), Some(blue));
    }

    #[test]
    fn test_duplicate_reports_do_not_render_twice() {
        let mut h = Harness::new();
        h.report(0, 0xAABB, RED, -40).unwrap();
        h.advance_to(900);
        let rendered = h.frames().len();
        h.report(1000, 0xAABB, RED, -40).unwrap();
        h.report(1000, 0xAABB, RED, -40).unwrap();
        assert_eq!(h.frames().len(), rendered);
    }

    #[test]
    fn test_refresh_during_dim_ramps_back_up() {
        let mut h = Harness::new();
        h.report(0, 0xAABB, RED, -40).unwrap();
        // Expires at 1500, two dim frames by 1700.
        h.advance_to(1700);
        assert_eq!(h.dispatcher.phase(0), Phase::Dimming);
        assert_eq!(h.dispatcher.brightness(0), 80);

        h.report(1750, 0xAABB, RED, -40).unwrap();
        assert_eq!(h.dispatcher.phase(0), Phase::Undimming);
        assert_eq!(h.dispatcher.brightness(0), 90);
        h.advance_to(1850);
        assert_eq!(h.dispatcher.phase(0), Phase::Steady);
        assert_eq!(h.last_frame(), Some(RED));
    }

    #[test]
    fn test_stale_liveness_expiry_is_ignored() {
        let mut h = Harness::new();
        h.report(0, 0xAABB, RED, -40).unwrap();
        h.advance_to(1000);
        h.report(1400, 0xAABB, RED, -40).unwrap();
        // An expiry scheduled for the first report arrives late.
        let expired_at = h.at(1500);
        h.dispatcher.handle_timer(
            TimerHandle::Liveness { slot: 0 },
            expired_at,
            &mut h.timers,
        );
        assert_eq!(h.dispatcher.phase(0), Phase::Steady);
    }

    #[test]
    fn test_shutdown_turns_light_off_once() {
        let mut h = Harness::new();
        h.dispatcher.shutdown();
        assert!(h.frames().is_empty());

        h.report(0, 0xAABB, RED, -40).unwrap();
        h.dispatcher.shutdown();
        h.dispatcher.shutdown();
        assert_eq!(h.last_frame(), Some(BLACK));
        assert_eq!(h.frames().len(), 2);
    }
}
