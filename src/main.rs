//! taptap-rig
//!
//! Watches a fixed camera view of a tap-rhythm game, classifies calibrated
//! screen regions into color states, and drives servo arms to tap the
//! matching buttons, level after level. Calibrate once with the preview
//! window keys, arm it, and let it play.

mod calib;
mod capture;
mod config;
mod display;
mod game;
mod rig;
mod runner;
mod vision;

use anyhow::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

use crate::capture::CameraSource;
use crate::display::PreviewWindow;
use crate::game::state::GameMachine;
use crate::rig::clock::SystemClock;
use crate::rig::hardware::ServoSubsystem;
use crate::rig::servo::{Servo, ServoBank, TapTiming};
use crate::runner::Runner;
use crate::vision::target::TargetMap;

const LOG_FILE: &str = "taptap.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(LOG_FILE) {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    let cfg = config::load();
    cfg.validate()?;

    // GPIO first: if the rig is not there, fail before touching the camera.
    let subsystem = ServoSubsystem::new()?;
    let mut bank = ServoBank::new(TapTiming::new(cfg.hold_down_ms, cfg.hold_up_ms));
    for spec in &cfg.servos {
        let driver = subsystem.driver(spec.pin)?;
        bank.insert(spec.color, Servo::new(Box::new(driver), spec.rest_pulse_us)?);
        log(&format!(
            "Servo {} on pin {} at rest {}us",
            spec.color, spec.pin, spec.rest_pulse_us
        ));
    }

    let targets = TargetMap::from_config(&cfg)?;
    let machine = GameMachine::new(cfg.base_level, cfg.ready_color, cfg.game_over_color);

    let camera = CameraSource::open(
        cfg.camera_index,
        cfg.frame_width,
        cfg.frame_height,
        cfg.frame_rate,
    )?;
    let window = PreviewWindow::open("taptap rig", cfg.frame_width, cfg.frame_height)?;
    std::fs::create_dir_all(&cfg.snapshot_dir)?;

    log(&format!(
        "Rig up: {} targets, base level {}, settle {}ms",
        cfg.targets.len(),
        cfg.base_level,
        cfg.settle_ms
    ));

    let mut runner = Runner::new(cfg, camera, window, targets, bank, machine);
    runner.run(&SystemClock)
}
