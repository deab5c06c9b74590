//! Rig configuration: calibration constants, servo layout and timing.
//!
//! Defaults carry the literal constants from the last calibrated run. On
//! startup an optional `taptap.json` next to the executable overrides them;
//! on quit the current calibration is dumped in the same JSON shape so the
//! operator can hand-copy it into the next run. That dump/copy cycle is the
//! only persistence there is.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::vision::classify::ColorCategory;

/// GPIO pin, rest pulse and color binding for one servo arm.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ServoSpec {
    /// Button color this arm is responsible for.
    pub color: ColorCategory,
    /// BCM pin number on the Pi header.
    pub pin: u8,
    /// Arm-up pulse width in microseconds (500..=2500).
    pub rest_pulse_us: u16,
}

/// One calibrated sample coordinate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TargetSpec {
    pub x: i32,
    pub y: i32,
}

/// Complete rig configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RigConfig {
    /// V4L2 camera index.
    pub camera_index: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frame_rate: u32,
    /// Level counter starts here; the first played level is base + 1.
    pub base_level: u32,
    /// Sentinel color that means the level is live and tapping may begin.
    pub ready_color: ColorCategory,
    /// Sentinel color that means the game showed its failure screen.
    pub game_over_color: ColorCategory,
    /// Arm dwell at the pressed position, milliseconds.
    pub hold_down_ms: u64,
    /// Arm dwell back at the rest position, milliseconds.
    pub hold_up_ms: u64,
    /// Wait after a dispatched frame before pulling the next one.
    pub settle_ms: u64,
    pub servos: Vec<ServoSpec>,
    /// Eight button slots in tap order, then the game-over sentinel, then
    /// the ready sentinel.
    pub targets: Vec<TargetSpec>,
    /// Directory for the per-frame audit snapshots.
    pub snapshot_dir: String,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_width: 640,
            frame_height: 360,
            frame_rate: 30,
            base_level: 0,
            ready_color: ColorCategory::Blue,
            game_over_color: ColorCategory::White,
            hold_down_ms: 35,
            hold_up_ms: 125,
            settle_ms: 200,
            servos: vec![
                ServoSpec { color: ColorCategory::White, pin: 22, rest_pulse_us: 736 },
                ServoSpec { color: ColorCategory::Red, pin: 23, rest_pulse_us: 733 },
                ServoSpec { color: ColorCategory::Blue, pin: 17, rest_pulse_us: 741 },
            ],
            targets: vec![
                TargetSpec { x: 253, y: 30 },
                TargetSpec { x: 253, y: 69 },
                TargetSpec { x: 250, y: 107 },
                TargetSpec { x: 248, y: 145 },
                TargetSpec { x: 246, y: 189 },
                TargetSpec { x: 244, y: 238 },
                TargetSpec { x: 239, y: 288 },
                TargetSpec { x: 233, y: 317 },
                TargetSpec { x: 226, y: 155 },
                TargetSpec { x: 242, y: 113 },
            ],
            snapshot_dir: "snapshots".to_string(),
        }
    }
}

impl RigConfig {
    pub fn validate(&self) -> Result<()> {
        if self.targets.len() != crate::vision::target::BUTTON_SLOTS + 2 {
            bail!(
                "config must list exactly {} targets, got {}",
                crate::vision::target::BUTTON_SLOTS + 2,
                self.targets.len()
            );
        }
        if self.servos.is_empty() {
            bail!("config must list at least one servo");
        }
        if self.ready_color == ColorCategory::Unknown
            || self.game_over_color == ColorCategory::Unknown
        {
            bail!("sentinel colors must be definite, not unknown");
        }
        if self.servos.iter().any(|s| s.color == ColorCategory::Unknown) {
            bail!("a servo cannot be bound to the unknown category");
        }
        Ok(())
    }

    /// Reproducible textual snapshot of the whole calibration, for the quit
    /// dump. Field order is the struct order, so two dumps with no nudges in
    /// between are byte-identical.
    pub fn to_dump(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize the calibration")
    }
}

/// Loads `taptap.json` from beside the executable, falling back to the
/// built-in calibration constants.
pub fn load() -> RigConfig {
    let path = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("taptap.json")))
        .unwrap_or_else(|| Path::new("taptap.json").to_path_buf());

    if path.exists() {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(cfg) => {
                    crate::log(&format!("Config loaded from {}", path.display()));
                    return cfg;
                }
                Err(e) => {
                    crate::log(&format!("Failed to parse {}: {}. Using defaults.", path.display(), e));
                }
            },
            Err(e) => {
                crate::log(&format!("Failed to read {}: {}. Using defaults.", path.display(), e));
            }
        }
    } else {
        crate::log("taptap.json not found. Using built-in calibration.");
    }

    RigConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        RigConfig::default().validate().unwrap();
    }

    #[test]
    fn missing_sentinel_target_fails_validation() {
        let mut cfg = RigConfig::default();
        cfg.targets.truncate(9);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_sentinel_color_fails_validation() {
        let mut cfg = RigConfig::default();
        cfg.ready_color = ColorCategory::Unknown;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn dump_is_idempotent() {
        let cfg = RigConfig::default();
        assert_eq!(cfg.to_dump().unwrap(), cfg.to_dump().unwrap());
    }

    #[test]
    fn dump_parses_back_to_the_same_calibration() {
        let cfg = RigConfig::default();
        let parsed: RigConfig = serde_json::from_str(&cfg.to_dump().unwrap()).unwrap();
        assert_eq!(parsed.to_dump().unwrap(), cfg.to_dump().unwrap());
    }
}
