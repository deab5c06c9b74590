//! Operator-facing preview window.
//!
//! Shows each frame with the calibration markers drawn in, and doubles as
//! the key-event source. Best effort only; nothing in the control loop
//! depends on what is rendered here.

use anyhow::{Result, anyhow};
use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

pub struct PreviewWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl PreviewWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
        let window = Window::new(title, width as usize, height as usize, WindowOptions::default())
            .map_err(|e| anyhow!("failed to open the preview window: {e}"))?;
        Ok(Self {
            window,
            buffer: Vec::with_capacity((width * height) as usize),
            width: width as usize,
            height: height as usize,
        })
    }

    /// The operator closing the window ends the run like a quit command.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn show(&mut self, frame: &RgbImage) -> Result<()> {
        self.buffer.clear();
        self.buffer.extend(frame.pixels().map(|p| {
            let [r, g, b] = p.0;
            (r as u32) << 16 | (g as u32) << 8 | b as u32
        }));
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow!("failed to present the preview frame: {e}"))?;
        Ok(())
    }

    /// Keys pressed since the last frame. Repeat is on so a held nudge key
    /// keeps walking the target.
    pub fn pressed_keys(&self) -> Vec<Key> {
        self.window.get_keys_pressed(KeyRepeat::Yes)
    }
}
