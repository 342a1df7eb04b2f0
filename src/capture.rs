//! Screen capture module (Step 1 in the pipeline).
//! Uses `xcap` to grab a whole monitor; the detector finds the board itself, so no cropping.
//! Pixel coordinates produced downstream are relative to the captured image and need the
//! monitor's origin added before clicking.
//! Debug: set `DEBUG_CAPTURE=1` to save each frame to `screenshots/current_frame.png`.
//! Permissions note: on macOS, grant "Screen & System Audio Recording" to the terminal app.

use std::env;
use std::fs;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};
use log::debug;
use xcap::Monitor;

use crate::coords::{ClickPair, Point};

/// One captured monitor image plus where that monitor sits on the virtual screen.
pub struct Frame {
    pub image: DynamicImage,
    pub origin: Point,
}

impl Frame {
    /// Shifts image-space click points into global screen coordinates.
    pub fn to_screen(&self, (from, to): ClickPair) -> ClickPair {
        let shift = |(x, y): Point| (x + self.origin.0, y + self.origin.1);
        (shift(from), shift(to))
    }
}

/// Captures monitor `index` (0-based, in `Monitor::all()` order).
pub fn capture_monitor(index: usize) -> Result<Frame> {
    let start = Instant::now();

    let monitors = Monitor::all().context("Failed to enumerate monitors")?;
    let Some(monitor) = monitors.get(index) else {
        bail!(
            "Monitor {} not found ({} available). Check the --monitor setting.",
            index,
            monitors.len()
        );
    };

    let origin = (
        monitor.x().context("Failed to read monitor x position")?,
        monitor.y().context("Failed to read monitor y position")?,
    );

    let raw = monitor
        .capture_image()
        .context("Failed to capture image. On macOS, ensure Terminal has Screen Recording permission in System Settings > Privacy & Security > Screen & System Audio Recording")?;

    let image = DynamicImage::ImageRgba8(raw);
    if image.dimensions() == (0, 0) {
        bail!("Captured empty screenshot - possible permission issue or no display");
    }

    if env::var_os("DEBUG_CAPTURE").is_some() {
        fs::create_dir_all("screenshots")
            .context("Failed to create screenshots/ debug directory")?;
        image
            .save("screenshots/current_frame.png")
            .context("Failed to save debug frame to screenshots/")?;
    }

    debug!("Capture latency: {:?}", start.elapsed());
    Ok(Frame { image, origin })
}
