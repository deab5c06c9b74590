//! The run state machine.
//!
//! One machine value owns the whole play lifecycle and is advanced once per
//! frame with that frame's classifications. It never touches the camera or
//! the GPIO directly; taps go through the `TapActuator` seam and time
//! through the `Clock` seam, so every transition is testable offline.

use anyhow::Result;
use std::time::Instant;

use crate::game::difficulty::{tap_quota, time_limit_ms};
use crate::game::dispatch::{TapActuator, dispatch_taps};
use crate::rig::clock::Clock;
use crate::vision::classify::ColorCategory;
use crate::vision::target::FrameClassification;

/// Where the run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Safety on: calibration keys are live, frames are never acted on.
    Calibrating,
    /// Armed: waiting for the ready sentinel before tapping begins.
    ArmedWaitingReady,
    /// Live: every eligible frame is dispatched.
    Playing,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Calibrating => write!(f, "calibrating"),
            RunState::ArmedWaitingReady => write!(f, "armed, waiting for ready"),
            RunState::Playing => write!(f, "playing"),
        }
    }
}

/// Bookkeeping for the level in progress.
#[derive(Clone, Copy, Debug)]
pub struct LevelState {
    /// Monotonic level index; first played level is base + 1.
    pub level: u32,
    /// Taps required to clear this level.
    pub quota: u32,
    /// Taps completed so far; resets to 0 when a level is armed.
    pub tapped: u32,
    /// Set the instant the ready sentinel fires, not at arm time.
    pub started_at: Option<Instant>,
}

/// End-of-level report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelSummary {
    pub level: u32,
    pub quota: u32,
    pub elapsed_ms: u64,
    pub ms_per_tap: u64,
    pub time_limit_ms: u64,
}

impl std::fmt::Display for LevelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Level {}. Taps {}. Time {}ms (budget {}ms). Average {}ms/tap.",
            self.level, self.quota, self.elapsed_ms, self.time_limit_ms, self.ms_per_tap
        )
    }
}

/// Lifecycle events surfaced to the caller for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    LevelStarted { level: u32 },
    GameOver { level: u32 },
    LevelComplete(LevelSummary),
}

/// What one frame did, for the caller's snapshot/settle decisions.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub events: Vec<GameEvent>,
    /// Colors tapped this frame, in slot order.
    pub taps: Vec<ColorCategory>,
    /// Taps completed in the level as of the end of this frame, captured
    /// before any completion reset. The audit snapshot is named from this,
    /// so the quota frame reads the full count, not the zeroed counter.
    pub tapped: u32,
    /// True when the frame reached dispatch; the caller writes the audit
    /// snapshot and waits out the camera-settle delay only then.
    pub dispatched: bool,
}

pub struct GameMachine {
    state: RunState,
    base_level: u32,
    level: LevelState,
    ready_color: ColorCategory,
    game_over_color: ColorCategory,
}

impl GameMachine {
    pub fn new(base_level: u32, ready_color: ColorCategory, game_over_color: ColorCategory) -> Self {
        Self {
            state: RunState::Calibrating,
            base_level,
            level: LevelState {
                level: base_level,
                quota: tap_quota(base_level),
                tapped: 0,
                started_at: None,
            },
            ready_color,
            game_over_color,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn level(&self) -> &LevelState {
        &self.level
    }

    /// Operator start command: advances to the next level and arms the rig.
    /// Only meaningful while calibrating.
    pub fn arm(&mut self) {
        if self.state != RunState::Calibrating {
            return;
        }
        self.level.level += 1;
        self.level.quota = tap_quota(self.level.level);
        self.level.tapped = 0;
        self.level.started_at = None;
        self.state = RunState::ArmedWaitingReady;
    }

    /// Operator reset command: level counter back to the configured base.
    pub fn reset_level(&mut self) {
        if self.state != RunState::Calibrating {
            return;
        }
        self.level.level = self.base_level;
    }

    /// Advances the machine with one frame's classifications.
    ///
    /// Calibrating and ineligible frames are skipped outright; that is the
    /// backpressure path, not an error. While armed, the game-over sentinel
    /// is honored before the ready sentinel; the frame that fires ready is
    /// also the first frame dispatched.
    pub fn process_frame(
        &mut self,
        classes: &FrameClassification,
        actuator: &mut dyn TapActuator,
        clock: &dyn Clock,
    ) -> Result<FrameOutcome> {
        let mut outcome = FrameOutcome::default();

        if self.state == RunState::Calibrating || !classes.eligible() {
            return Ok(outcome);
        }

        if classes.game_over == self.game_over_color {
            outcome.events.push(GameEvent::GameOver { level: self.level.level });
            self.disarm();
            return Ok(outcome);
        }

        if self.state == RunState::ArmedWaitingReady {
            if classes.ready != self.ready_color {
                return Ok(outcome);
            }
            self.level.started_at = Some(clock.now());
            self.state = RunState::Playing;
            outcome.events.push(GameEvent::LevelStarted { level: self.level.level });
        }

        let dispatched = dispatch_taps(&mut self.level, &classes.buttons, actuator)?;
        outcome.taps = dispatched.taps;
        outcome.tapped = self.level.tapped;
        outcome.dispatched = true;

        if dispatched.quota_met {
            outcome.events.push(GameEvent::LevelComplete(self.summary(clock)));
            self.disarm();
        }

        Ok(outcome)
    }

    fn summary(&self, clock: &dyn Clock) -> LevelSummary {
        let elapsed_ms = self
            .level
            .started_at
            .map(|t| clock.now().duration_since(t).as_millis() as u64)
            .unwrap_or(0);
        let quota = self.level.quota.max(1);
        LevelSummary {
            level: self.level.level,
            quota: self.level.quota,
            elapsed_ms,
            ms_per_tap: elapsed_ms / quota as u64,
            time_limit_ms: time_limit_ms(self.level.level),
        }
    }

    /// Back to calibration; any in-progress level state is discarded.
    fn disarm(&mut self) {
        self.level.tapped = 0;
        self.level.started_at = None;
        self.state = RunState::Calibrating;
    }
}
