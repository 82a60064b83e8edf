//! Deterministic synthetic telescope source.
//!
//! Generates a dim star-field background with a single bright object drifting
//! across the frame. Pixel values are a pure function of position and frame
//! count, so runs are reproducible and the detection pipeline has something
//! real to chew on during demos.

use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::config::SourceSettings;
use crate::frame::Frame;
use crate::ingest::{SourceStats, VideoSource};

/// Side length of the drifting debris square, in pixels.
const DEBRIS_SIZE: u32 = 12;
/// Pixels the debris advances per frame.
const DRIFT_STEP: u32 = 3;

pub struct SyntheticTelescopeSource {
    settings: SourceSettings,
    frame_count: u64,
    released: bool,
}

impl SyntheticTelescopeSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            frame_count: 0,
            released: false,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.settings.width;
        let height = self.settings.height;
        let mut pixels = vec![0u8; width as usize * height as usize];

        // Static star field: sparse fixed bright points over a dark floor.
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = if i % 97 == 0 { 180 } else { 12 };
        }

        // One debris object drifting diagonally, wrapping at the borders.
        let span_x = width.saturating_sub(DEBRIS_SIZE).max(1);
        let span_y = height.saturating_sub(DEBRIS_SIZE).max(1);
        let offset = (self.frame_count as u32).wrapping_mul(DRIFT_STEP);
        let x0 = offset % span_x;
        let y0 = (offset / 2) % span_y;
        for y in y0..(y0 + DEBRIS_SIZE).min(height) {
            for x in x0..(x0 + DEBRIS_SIZE).min(width) {
                pixels[y as usize * width as usize + x as usize] = 230;
            }
        }
        pixels
    }
}

impl VideoSource for SyntheticTelescopeSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "telescope source connected: {} ({}x{}, synthetic)",
            self.settings.url,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.released {
            return Err(anyhow!("source exhausted: device released"));
        }
        if self.settings.target_fps > 0 {
            std::thread::sleep(Duration::from_millis(
                1000 / u64::from(self.settings.target_fps),
            ));
        }
        self.frame_count += 1;
        Frame::new(
            self.generate_pixels(),
            self.settings.width,
            self.settings.height,
        )
    }

    fn release(&mut self) {
        if !self.released {
            log::info!("telescope source released: {}", self.settings.url);
        }
        self.released = true;
    }

    fn is_healthy(&self) -> bool {
        !self.released
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.settings.url.clone(),
        }
    }
}
