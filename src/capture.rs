//! Camera frame source.
//!
//! Pull-based: one decoded RGB frame per call, paced by the camera's own
//! frame interval. Any open, stream or decode failure is fatal to the run;
//! there is no reconnect policy for a rig whose camera just died.

use anyhow::{Context, Result, bail};
use image::RgbImage;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};

pub struct CameraSource {
    camera: Camera,
    width: u32,
    height: u32,
}

impl CameraSource {
    /// Opens the camera and starts the stream at the requested geometry.
    pub fn open(index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps),
        ));
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .with_context(|| format!("failed to open camera {index}"))?;
        camera
            .open_stream()
            .context("failed to start the camera stream")?;
        Ok(Self { camera, width, height })
    }

    /// Blocks until the next frame is available and decodes it.
    pub fn frame(&mut self) -> Result<RgbImage> {
        let buffer = self
            .camera
            .frame()
            .context("camera stopped producing frames")?;
        let img = buffer
            .decode_image::<RgbFormat>()
            .context("failed to decode camera frame")?;
        ensure_geometry(&img, self.width, self.height)?;
        Ok(img)
    }
}

/// The camera negotiation is `Closest`, so a stubborn device can hand back
/// a different geometry than requested. Every calibrated coordinate and the
/// preview stride assume the configured size, so a mismatch is fatal.
fn ensure_geometry(frame: &RgbImage, width: u32, height: u32) -> Result<()> {
    let (w, h) = frame.dimensions();
    if (w, h) != (width, height) {
        bail!("camera delivered {w}x{h} frames, calibration expects {width}x{height}");
    }
    Ok(())
}
