//! GPIO servo drive on the Raspberry Pi.
//!
//! Software PWM at the usual 50 Hz hobby-servo frame; positions are pulse
//! widths in microseconds (500 = 0°, 2500 = 180°). The subsystem is an
//! explicit handle created once at startup and asked for one driver per
//! arm, so tests and tools can construct the rig without process-wide
//! state.

use anyhow::{Context, Result};
use rppal::gpio::{Gpio, OutputPin};
use std::time::Duration;

use crate::rig::servo::{PARK_PULSE_US, ServoDriver};

/// 50 Hz servo frame.
const PWM_PERIOD: Duration = Duration::from_millis(20);

/// Dwell at the park midpoint before output is cut.
const PARK_SETTLE: Duration = Duration::from_millis(100);

/// Handle to the GPIO peripheral; hands out one driver per servo pin.
pub struct ServoSubsystem {
    gpio: Gpio,
}

impl ServoSubsystem {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().context("failed to open the GPIO peripheral")?;
        Ok(Self { gpio })
    }

    pub fn driver(&self, pin: u8) -> Result<GpioServoDriver> {
        let pin = self
            .gpio
            .get(pin)
            .with_context(|| format!("failed to claim GPIO pin {pin}"))?
            .into_output();
        Ok(GpioServoDriver { pin })
    }
}

/// One servo arm on one BCM pin.
pub struct GpioServoDriver {
    pin: OutputPin,
}

impl ServoDriver for GpioServoDriver {
    fn move_to(&mut self, pulse_us: u16) -> Result<()> {
        self.pin
            .set_pwm(PWM_PERIOD, Duration::from_micros(pulse_us as u64))
            .with_context(|| format!("failed to drive pin {} to {pulse_us}us", self.pin.pin()))?;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // Park at the midpoint, let the arm arrive, then stop the pulse
        // train so the servo goes slack for maintenance.
        self.pin
            .set_pwm(PWM_PERIOD, Duration::from_micros(PARK_PULSE_US as u64))
            .context("failed to park the servo arm")?;
        std::thread::sleep(PARK_SETTLE);
        self.pin.clear_pwm().context("failed to stop servo output")?;
        Ok(())
    }
}
