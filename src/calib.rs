//! Interactive calibration commands.
//!
//! Single-key commands, live only while the machine is calibrating. The key
//! layout matches the original rig so an operator's muscle memory survives:
//! i/j/k/l nudge, n cycles focus, 1/2/3 test-fire an arm, 5/t and g/b tune
//! the dwell times, +/- the rest height of the arm last fired.

use anyhow::Result;
use minifb::Key;

use crate::rig::clock::Clock;
use crate::rig::servo::ServoBank;
use crate::vision::classify::ColorCategory;
use crate::vision::target::TargetMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nudge {
    Up,
    Down,
    Left,
    Right,
}

impl Nudge {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Nudge::Up => (0, -1),
            Nudge::Down => (0, 1),
            Nudge::Left => (-1, 0),
            Nudge::Right => (1, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Arm the rig for the next level.
    Start,
    /// Level counter back to base.
    ResetLevel,
    /// Cycle the calibration focus to the next target.
    NextFocus,
    /// Move the focused-and-later targets by one pixel.
    Nudge(Nudge),
    /// Fire one test tap and move the servo focus to that arm.
    TestTap(ColorCategory),
    /// Hold-up dwell, ±1 ms.
    AdjustHoldUp(i64),
    /// Hold-down dwell, ±1 ms.
    AdjustHoldDown(i64),
    /// Rest position of the arm in focus, ±1 pulse unit.
    AdjustRest(i32),
    /// End the run (also dumps the calibration).
    Quit,
}

impl Command {
    pub fn from_key(key: Key) -> Option<Command> {
        match key {
            Key::S => Some(Command::Start),
            Key::R => Some(Command::ResetLevel),
            Key::N => Some(Command::NextFocus),
            Key::I => Some(Command::Nudge(Nudge::Up)),
            Key::K => Some(Command::Nudge(Nudge::Down)),
            Key::J => Some(Command::Nudge(Nudge::Left)),
            Key::L => Some(Command::Nudge(Nudge::Right)),
            Key::Key1 => Some(Command::TestTap(ColorCategory::White)),
            Key::Key2 => Some(Command::TestTap(ColorCategory::Red)),
            Key::Key3 => Some(Command::TestTap(ColorCategory::Blue)),
            Key::Key5 => Some(Command::AdjustHoldUp(1)),
            Key::T => Some(Command::AdjustHoldUp(-1)),
            Key::G => Some(Command::AdjustHoldDown(1)),
            Key::B => Some(Command::AdjustHoldDown(-1)),
            Key::Equal => Some(Command::AdjustRest(1)),
            Key::Minus => Some(Command::AdjustRest(-1)),
            Key::Q | Key::Escape => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Applies calibration commands to the target map and the servo bank.
/// Remembers which arm the tuning keys refer to (the one last test-fired).
pub struct Calibrator {
    servo_focus: ColorCategory,
}

impl Calibrator {
    pub fn new() -> Self {
        Self { servo_focus: ColorCategory::White }
    }

    pub fn servo_focus(&self) -> ColorCategory {
        self.servo_focus
    }

    /// Handles every command except Start/ResetLevel/Quit, which belong to
    /// the control loop.
    pub fn apply(
        &mut self,
        cmd: Command,
        targets: &mut TargetMap,
        bank: &mut ServoBank,
        clock: &dyn Clock,
    ) -> Result<()> {
        match cmd {
            Command::NextFocus => {
                targets.advance_focus();
                let pt = targets.points()[targets.focus()];
                crate::log(&format!("Focus target {} at ({}, {})", targets.focus(), pt.x, pt.y));
            }
            Command::Nudge(n) => {
                let (dx, dy) = n.delta();
                targets.nudge(dx, dy);
                let pt = targets.points()[targets.focus()];
                crate::log(&format!("Target {} at ({}, {})", targets.focus(), pt.x, pt.y));
            }
            Command::TestTap(color) => {
                self.servo_focus = color;
                bank.tap(color, clock)?;
                crate::log(&format!(
                    "Test tap {} (rest {}us)",
                    color,
                    bank.rest_pulse(color).unwrap_or(0)
                ));
            }
            Command::AdjustHoldUp(ms) => {
                bank.timing.adjust_hold_up(ms);
                crate::log(&format!("Hold-up {}ms", bank.timing.hold_up.as_millis()));
            }
            Command::AdjustHoldDown(ms) => {
                bank.timing.adjust_hold_down(ms);
                crate::log(&format!("Hold-down {}ms", bank.timing.hold_down.as_millis()));
            }
            Command::AdjustRest(delta) => {
                let pulse = bank.adjust_rest(self.servo_focus, delta)?;
                crate::log(&format!("{} rest {}us", self.servo_focus, pulse));
            }
            Command::Start | Command::ResetLevel | Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigConfig;
    use crate::rig::clock::fake::FakeClock;
    use crate::rig::servo::fake::FakeDriver;
    use crate::rig::servo::{Servo, TapTiming};

    fn bank() -> ServoBank {
        let mut bank = ServoBank::new(TapTiming::new(35, 125));
        for color in [ColorCategory::White, ColorCategory::Red, ColorCategory::Blue] {
            let (driver, _) = FakeDriver::new();
            bank.insert(color, Servo::new(Box::new(driver), 736).unwrap());
        }
        bank
    }

    #[test]
    fn key_map_matches_the_original_layout() {
        assert_eq!(Command::from_key(Key::S), Some(Command::Start));
        assert_eq!(Command::from_key(Key::N), Some(Command::NextFocus));
        assert_eq!(Command::from_key(Key::I), Some(Command::Nudge(Nudge::Up)));
        assert_eq!(Command::from_key(Key::L), Some(Command::Nudge(Nudge::Right)));
        assert_eq!(Command::from_key(Key::Key2), Some(Command::TestTap(ColorCategory::Red)));
        assert_eq!(Command::from_key(Key::Key5), Some(Command::AdjustHoldUp(1)));
        assert_eq!(Command::from_key(Key::B), Some(Command::AdjustHoldDown(-1)));
        assert_eq!(Command::from_key(Key::Escape), Some(Command::Quit));
        assert_eq!(Command::from_key(Key::Z), None);
    }

    #[test]
    fn nudge_command_moves_the_focused_suffix() {
        let cfg = RigConfig::default();
        let mut targets = TargetMap::from_config(&cfg).unwrap();
        let mut bank = bank();
        let clock = FakeClock::new();
        let mut calib = Calibrator::new();
        let before = targets.points()[0];

        calib
            .apply(Command::Nudge(Nudge::Right), &mut targets, &mut bank, &clock)
            .unwrap();

        assert_eq!(targets.points()[0].x, before.x + 1);
    }

    #[test]
    fn test_tap_moves_the_servo_focus() {
        let cfg = RigConfig::default();
        let mut targets = TargetMap::from_config(&cfg).unwrap();
        let mut bank = bank();
        let clock = FakeClock::new();
        let mut calib = Calibrator::new();

        calib
            .apply(Command::TestTap(ColorCategory::Blue), &mut targets, &mut bank, &clock)
            .unwrap();
        assert_eq!(calib.servo_focus(), ColorCategory::Blue);

        calib
            .apply(Command::AdjustRest(1), &mut targets, &mut bank, &clock)
            .unwrap();
        assert_eq!(bank.rest_pulse(ColorCategory::Blue), Some(737));
        assert_eq!(bank.rest_pulse(ColorCategory::Red), Some(736));
    }

    #[test]
    fn dwell_tuning_adjusts_the_shared_timing() {
        let cfg = RigConfig::default();
        let mut targets = TargetMap::from_config(&cfg).unwrap();
        let mut bank = bank();
        let clock = FakeClock::new();
        let mut calib = Calibrator::new();

        calib.apply(Command::AdjustHoldUp(1), &mut targets, &mut bank, &clock).unwrap();
        calib.apply(Command::AdjustHoldDown(-1), &mut targets, &mut bank, &clock).unwrap();

        assert_eq!(bank.timing.hold_up.as_millis(), 126);
        assert_eq!(bank.timing.hold_down.as_millis(), 34);
    }
}
