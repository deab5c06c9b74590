//! Servo arms and the color-to-arm mapping.
//!
//! A `Servo` owns its drive primitive through the `ServoDriver` seam and
//! knows only pulse widths and dwell times. The `ServoBank` maps each
//! `ColorCategory` to its arm; there is no pin arithmetic in here, pin
//! addressing belongs to the hardware driver.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::rig::clock::Clock;
use crate::vision::classify::ColorCategory;

/// Pulse width that presses an arm all the way down.
pub const PRESS_PULSE_US: u16 = 500;

/// Neutral midpoint the park sequence moves to before cutting output.
pub const PARK_PULSE_US: u16 = 1500;

/// Valid rest pulse range for the arm-up position.
pub const REST_PULSE_RANGE: std::ops::RangeInclusive<u16> = 500..=2500;

/// Raw positioning primitive. `move_to` only commands the position; all
/// dwell timing is owned by `Servo`. `release` runs the park sequence and
/// cuts output; it is called exactly once, from drop.
pub trait ServoDriver {
    fn move_to(&mut self, pulse_us: u16) -> Result<()>;
    fn release(&mut self) -> Result<()>;
}

/// Shared tap timing, tunable at runtime from the calibration keys.
#[derive(Clone, Copy, Debug)]
pub struct TapTiming {
    pub hold_down: Duration,
    pub hold_up: Duration,
}

impl TapTiming {
    pub fn new(hold_down_ms: u64, hold_up_ms: u64) -> Self {
        Self {
            hold_down: Duration::from_millis(hold_down_ms),
            hold_up: Duration::from_millis(hold_up_ms),
        }
    }

    /// Adds `delta_ms` to the hold-down dwell, floored at 1 ms.
    pub fn adjust_hold_down(&mut self, delta_ms: i64) {
        self.hold_down = adjust(self.hold_down, delta_ms);
    }

    /// Adds `delta_ms` to the hold-up dwell, floored at 1 ms.
    pub fn adjust_hold_up(&mut self, delta_ms: i64) {
        self.hold_up = adjust(self.hold_up, delta_ms);
    }
}

fn adjust(d: Duration, delta_ms: i64) -> Duration {
    let ms = (d.as_millis() as i64 + delta_ms).max(1);
    Duration::from_millis(ms as u64)
}

/// One physical arm: its driver plus its calibrated rest position.
pub struct Servo {
    driver: Box<dyn ServoDriver>,
    rest_pulse_us: u16,
}

impl Servo {
    /// Takes ownership of the driver and raises the arm to its rest
    /// position.
    pub fn new(mut driver: Box<dyn ServoDriver>, rest_pulse_us: u16) -> Result<Self> {
        driver.move_to(rest_pulse_us)?;
        Ok(Self { driver, rest_pulse_us })
    }

    /// One tap cycle: press, dwell, raise, dwell. Strictly blocking; the
    /// next command anywhere in the rig waits for this one.
    pub fn tap(&mut self, timing: &TapTiming, clock: &dyn Clock) -> Result<()> {
        self.driver.move_to(PRESS_PULSE_US)?;
        clock.sleep(timing.hold_down);
        self.driver.move_to(self.rest_pulse_us)?;
        clock.sleep(timing.hold_up);
        Ok(())
    }

    /// Moves the rest position by `delta` pulse units and re-seats the arm.
    pub fn adjust_rest(&mut self, delta: i32) -> Result<u16> {
        let next = (self.rest_pulse_us as i32 + delta)
            .clamp(*REST_PULSE_RANGE.start() as i32, *REST_PULSE_RANGE.end() as i32)
            as u16;
        self.rest_pulse_us = next;
        self.driver.move_to(next)?;
        Ok(next)
    }

    pub fn rest_pulse(&self) -> u16 {
        self.rest_pulse_us
    }
}

impl Drop for Servo {
    fn drop(&mut self) {
        // Park runs on every exit path; a drive error here has nowhere to go.
        let _ = self.driver.release();
    }
}

/// All arms of the rig, keyed by the color each one taps.
pub struct ServoBank {
    servos: BTreeMap<ColorCategory, Servo>,
    pub timing: TapTiming,
}

impl ServoBank {
    pub fn new(timing: TapTiming) -> Self {
        Self { servos: BTreeMap::new(), timing }
    }

    pub fn insert(&mut self, color: ColorCategory, servo: Servo) {
        self.servos.insert(color, servo);
    }

    pub fn tap(&mut self, color: ColorCategory, clock: &dyn Clock) -> Result<()> {
        let timing = self.timing;
        let servo = self
            .servos
            .get_mut(&color)
            .ok_or_else(|| anyhow!("no servo arm is bound to {color}"))?;
        servo.tap(&timing, clock)
    }

    pub fn adjust_rest(&mut self, color: ColorCategory, delta: i32) -> Result<u16> {
        let servo = self
            .servos
            .get_mut(&color)
            .ok_or_else(|| anyhow!("no servo arm is bound to {color}"))?;
        servo.adjust_rest(delta)
    }

    pub fn rest_pulse(&self, color: ColorCategory) -> Option<u16> {
        self.servos.get(&color).map(Servo::rest_pulse)
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum DriveOp {
        Move(u16),
        Release,
    }

    /// Records every drive command; shared so the log survives the drop.
    pub struct FakeDriver {
        pub ops: Arc<Mutex<Vec<DriveOp>>>,
    }

    impl FakeDriver {
        pub fn new() -> (Self, Arc<Mutex<Vec<DriveOp>>>) {
            let ops = Arc::new(Mutex::new(Vec::new()));
            (Self { ops: ops.clone() }, ops)
        }
    }

    impl ServoDriver for FakeDriver {
        fn move_to(&mut self, pulse_us: u16) -> Result<()> {
            self.ops.lock().unwrap().push(DriveOp::Move(pulse_us));
            Ok(())
        }

        fn release(&mut self) -> Result<()> {
            self.ops.lock().unwrap().push(DriveOp::Release);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{DriveOp, FakeDriver};
    use super::*;
    use crate::rig::clock::fake::FakeClock;

    #[test]
    fn construction_raises_the_arm_to_rest() {
        let (driver, ops) = FakeDriver::new();
        let _servo = Servo::new(Box::new(driver), 736).unwrap();
        assert_eq!(ops.lock().unwrap().as_slice(), &[DriveOp::Move(736)]);
    }

    #[test]
    fn tap_is_press_dwell_raise_dwell() {
        let (driver, ops) = FakeDriver::new();
        let mut servo = Servo::new(Box::new(driver), 736).unwrap();
        let clock = FakeClock::new();
        let timing = TapTiming::new(35, 125);

        servo.tap(&timing, &clock).unwrap();

        assert_eq!(
            ops.lock().unwrap().as_slice(),
            &[DriveOp::Move(736), DriveOp::Move(PRESS_PULSE_US), DriveOp::Move(736)]
        );
        assert_eq!(
            clock.slept.borrow().as_slice(),
            &[Duration::from_millis(35), Duration::from_millis(125)]
        );
    }

    #[test]
    fn rest_adjust_clamps_to_the_pulse_range() {
        let (driver, _ops) = FakeDriver::new();
        let mut servo = Servo::new(Box::new(driver), 510).unwrap();
        assert_eq!(servo.adjust_rest(-100).unwrap(), 500);
        assert_eq!(servo.adjust_rest(10_000).unwrap(), 2500);
    }

    #[test]
    fn drop_releases_exactly_once() {
        let (driver, ops) = FakeDriver::new();
        {
            let _servo = Servo::new(Box::new(driver), 736).unwrap();
        }
        let released = ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| **op == DriveOp::Release)
            .count();
        assert_eq!(released, 1);
    }

    #[test]
    fn bank_refuses_an_unbound_color() {
        let mut bank = ServoBank::new(TapTiming::new(35, 125));
        let clock = FakeClock::new();
        assert!(bank.tap(ColorCategory::Red, &clock).is_err());
    }

    #[test]
    fn timing_adjust_floors_at_one_millisecond() {
        let mut timing = TapTiming::new(2, 2);
        timing.adjust_hold_down(-10);
        timing.adjust_hold_up(-10);
        assert_eq!(timing.hold_down, Duration::from_millis(1));
        assert_eq!(timing.hold_up, Duration::from_millis(1));
        timing.adjust_hold_up(4);
        assert_eq!(timing.hold_up, Duration::from_millis(5));
    }
}
