//! The per-frame control loop.
//!
//! Strictly synchronous: pull a frame, classify and mark it, show it, feed
//! it to the state machine, then write the audit snapshot and wait out the
//! camera-settle delay if anything was dispatched. Calibration keys are
//! read only while the safety is on (machine calibrating); during play the
//! only ways out are game over, quota completion, or closing the window.

use anyhow::Result;
use image::RgbImage;
use std::path::PathBuf;
use std::time::Duration;

use crate::calib::{Calibrator, Command};
use crate::capture::CameraSource;
use crate::config::{RigConfig, TargetSpec};
use crate::display::PreviewWindow;
use crate::game::dispatch::TapActuator;
use crate::game::state::{FrameOutcome, GameEvent, GameMachine, RunState};
use crate::rig::clock::Clock;
use crate::rig::servo::ServoBank;
use crate::vision::classify::ColorCategory;
use crate::vision::target::TargetMap;

/// Adapts the servo bank to the dispatcher's tap seam.
struct BankTapper<'a> {
    bank: &'a mut ServoBank,
    clock: &'a dyn Clock,
}

impl TapActuator for BankTapper<'_> {
    fn tap(&mut self, color: ColorCategory) -> Result<()> {
        self.bank.tap(color, self.clock)
    }
}

pub struct Runner {
    config: RigConfig,
    camera: CameraSource,
    window: PreviewWindow,
    targets: TargetMap,
    bank: ServoBank,
    machine: GameMachine,
    calibrator: Calibrator,
    settle: Duration,
    snapshot_dir: PathBuf,
}

impl Runner {
    pub fn new(
        config: RigConfig,
        camera: CameraSource,
        window: PreviewWindow,
        targets: TargetMap,
        bank: ServoBank,
        machine: GameMachine,
    ) -> Self {
        let settle = Duration::from_millis(config.settle_ms);
        let snapshot_dir = PathBuf::from(&config.snapshot_dir);
        Self {
            config,
            camera,
            window,
            targets,
            bank,
            machine,
            calibrator: Calibrator::new(),
            settle,
            snapshot_dir,
        }
    }

    /// Runs until the operator quits or closes the window. A camera failure
    /// propagates and ends the process; servo park still runs on drop.
    pub fn run(&mut self, clock: &dyn Clock) -> Result<()> {
        while self.window.is_open() {
            let mut frame = self.camera.frame()?;
            let classes = self.targets.classify(&frame);
            self.targets.draw_markers(&mut frame, &classes);
            self.window.show(&frame)?;

            if self.machine.state() == RunState::Calibrating {
                for key in self.window.pressed_keys() {
                    let Some(cmd) = Command::from_key(key) else {
                        continue;
                    };
                    match cmd {
                        Command::Start => {
                            self.machine.arm();
                            let lvl = self.machine.level();
                            crate::log(&format!(
                                "Armed for level {} (quota {})",
                                lvl.level, lvl.quota
                            ));
                        }
                        Command::ResetLevel => {
                            self.machine.reset_level();
                            crate::log(&format!("Reset to level {}", self.machine.level().level));
                        }
                        Command::Quit => {
                            crate::log("Quit");
                            self.dump_calibration();
                            return Ok(());
                        }
                        other => {
                            if let Err(e) =
                                self.calibrator.apply(other, &mut self.targets, &mut self.bank, clock)
                            {
                                crate::log(&format!("Calibration command failed: {e}"));
                            }
                        }
                    }
                }
                continue;
            }

            let outcome = {
                let mut tapper = BankTapper { bank: &mut self.bank, clock };
                self.machine.process_frame(&classes, &mut tapper, clock)?
            };
            self.report(&outcome);

            if outcome.dispatched {
                self.save_snapshot(&frame, outcome.tapped);
                // A zero wait could hand back the same scene before anything
                // visibly moved, so always give the game time to redraw.
                clock.sleep(self.settle);
            }
        }

        crate::log("Preview window closed");
        self.dump_calibration();
        Ok(())
    }

    fn report(&self, outcome: &FrameOutcome) {
        if !outcome.taps.is_empty() {
            let trace: String = outcome.taps.iter().map(|c| c.glyph()).collect();
            crate::log(&format!("Tapped {trace}"));
        }
        for event in &outcome.events {
            match event {
                GameEvent::LevelStarted { level } => {
                    crate::log(&format!("Level {level} start"));
                }
                GameEvent::GameOver { level } => {
                    crate::log(&format!("Game Over at level {level}"));
                }
                GameEvent::LevelComplete(summary) => {
                    crate::log(&summary.to_string());
                }
            }
        }
    }

    /// Audit trail only; a failed write is logged and ignored. The tap
    /// count comes from the frame outcome, not the machine, which has
    /// already reset by the time a completion frame lands here.
    fn save_snapshot(&self, frame: &RgbImage, tapped: u32) {
        let path = self
            .snapshot_dir
            .join(format!("level{:02}.{:03}.png", self.machine.level().level, tapped));
        if let Err(e) = frame.save(&path) {
            crate::log(&format!("Failed to write snapshot {}: {e}", path.display()));
        }
    }

    /// Prints the current calibration as the JSON the next run can start
    /// from. Reproducible: two dumps with no changes in between match.
    fn dump_calibration(&self) {
        let mut cfg = self.config.clone();
        cfg.targets = self
            .targets
            .points()
            .iter()
            .map(|p| TargetSpec { x: p.x, y: p.y })
            .collect();
        cfg.hold_down_ms = self.bank.timing.hold_down.as_millis() as u64;
        cfg.hold_up_ms = self.bank.timing.hold_up.as_millis() as u64;
        for spec in &mut cfg.servos {
            if let Some(pulse) = self.bank.rest_pulse(spec.color) {
                spec.rest_pulse_us = pulse;
            }
        }
        match cfg.to_dump() {
            Ok(dump) => {
                crate::log("Calibration for the next run (paste into taptap.json):");
                println!("{dump}");
            }
            Err(e) => crate::log(&format!("Calibration dump failed: {e}")),
        }
    }
}
