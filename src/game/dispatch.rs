//! Per-frame tap dispatch.
//!
//! Button slots are processed strictly in calibrated order. An Unknown slot
//! after earlier confident ones means the whole frame was misread, so the
//! rest of the frame is abandoned rather than tapped partially.

use anyhow::Result;

use crate::game::state::LevelState;
use crate::vision::classify::ColorCategory;
use crate::vision::target::BUTTON_SLOTS;

/// Something that can perform one physical tap for a color. The servo bank
/// implements this for the live rig; tests record instead.
pub trait TapActuator {
    fn tap(&mut self, color: ColorCategory) -> Result<()>;
}

/// What one dispatch pass did.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Colors tapped this frame, in slot order.
    pub taps: Vec<ColorCategory>,
    /// The level's quota was reached on this frame.
    pub quota_met: bool,
}

/// Taps the classified button slots in order against the level's quota.
///
/// Stops early on the first Unknown slot (sanity break) or the moment the
/// quota is met, so at most one completion is ever signalled per frame.
pub fn dispatch_taps(
    level: &mut LevelState,
    buttons: &[ColorCategory; BUTTON_SLOTS],
    actuator: &mut dyn TapActuator,
) -> Result<DispatchOutcome> {
    let mut outcome = DispatchOutcome::default();
    for &color in buttons {
        if color == ColorCategory::Unknown {
            break;
        }
        actuator.tap(color)?;
        level.tapped += 1;
        outcome.taps.push(color);
        if level.tapped >= level.quota {
            outcome.quota_met = true;
            break;
        }
    }
    Ok(outcome)
}

#[cfg(test)]
pub mod fake {
    use super::*;

    /// Records taps; can be told to fail after N taps.
    #[derive(Default)]
    pub struct RecordingActuator {
        pub taps: Vec<ColorCategory>,
        pub fail_after: Option<usize>,
    }

    impl TapActuator for RecordingActuator {
        fn tap(&mut self, color: ColorCategory) -> Result<()> {
            if let Some(limit) = self.fail_after
                && self.taps.len() >= limit
            {
                anyhow::bail!("drive primitive failed");
            }
            self.taps.push(color);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::RecordingActuator;
    use super::*;
    use ColorCategory::{Blue, Red, Unknown, White};

    fn level(quota: u32, tapped: u32) -> LevelState {
        LevelState { level: 1, quota, tapped, started_at: None }
    }

    #[test]
    fn taps_every_slot_in_calibrated_order() {
        let mut lvl = level(30, 0);
        let mut actuator = RecordingActuator::default();
        let buttons = [Red, White, Blue, Red, White, Blue, Red, White];

        let outcome = dispatch_taps(&mut lvl, &buttons, &mut actuator).unwrap();

        assert_eq!(actuator.taps, buttons.to_vec());
        assert_eq!(outcome.taps, buttons.to_vec());
        assert_eq!(lvl.tapped, 8);
        assert!(!outcome.quota_met);
    }

    #[test]
    fn unknown_slot_abandons_the_rest_of_the_frame() {
        let mut lvl = level(30, 0);
        let mut actuator = RecordingActuator::default();
        let buttons = [Red, White, Blue, Unknown, Red, Red, Red, Red];

        let outcome = dispatch_taps(&mut lvl, &buttons, &mut actuator).unwrap();

        assert_eq!(actuator.taps, vec![Red, White, Blue]);
        assert_eq!(lvl.tapped, 3);
        assert!(!outcome.quota_met);
    }

    #[test]
    fn quota_stops_dispatch_mid_frame() {
        let mut lvl = level(30, 28);
        let mut actuator = RecordingActuator::default();
        let buttons = [White; 8];

        let outcome = dispatch_taps(&mut lvl, &buttons, &mut actuator).unwrap();

        assert_eq!(actuator.taps.len(), 2);
        assert_eq!(lvl.tapped, 30);
        assert!(outcome.quota_met);
    }

    #[test]
    fn actuator_errors_propagate() {
        let mut lvl = level(30, 0);
        let mut actuator = RecordingActuator { fail_after: Some(2), ..Default::default() };
        let buttons = [Blue; 8];

        assert!(dispatch_taps(&mut lvl, &buttons, &mut actuator).is_err());
        assert_eq!(lvl.tapped, 2);
    }
}
