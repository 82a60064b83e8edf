//! Adaptive background model.
//!
//! Maintains a per-pixel running mean and running absolute deviation of the
//! scene and scores each new pixel by its normalized distance from the mean.
//! The statistics adapt exponentially toward every frame, so slow scene
//! changes (lighting drift, sensor noise floor) are absorbed while fast
//! changes light up in the output mask.

use anyhow::{anyhow, Result};

use crate::detect::Mask;
use crate::frame::Frame;

/// Exponential adaptation weight applied per frame.
const LEARNING_RATE: f32 = 0.05;

/// Floor on the per-pixel deviation estimate so a perfectly static pixel
/// does not flag on single-count sensor noise.
const MIN_DEVIATION: f32 = 4.0;

/// Deviations of distance that map to full mask intensity.
const FOREGROUND_SPAN: f32 = 3.0;

/// Per-pixel statistical estimate of the static scene.
///
/// Sized lazily from the first frame; every later frame must match those
/// dimensions. Model state lives and dies with one tracker instance.
pub struct BackgroundModel {
    mean: Vec<f32>,
    deviation: Vec<f32>,
    width: u32,
    height: u32,
}

impl BackgroundModel {
    pub fn new() -> Self {
        Self {
            mean: Vec::new(),
            deviation: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    /// Score the frame against the learned background and fold the frame into
    /// the model. Returns a same-size mask where intensity encodes the
    /// likelihood that a pixel differs from the background.
    pub fn update(&mut self, frame: &Frame) -> Result<Mask> {
        if self.mean.is_empty() {
            self.initialize(frame);
            return Ok(Mask::zeroed(frame.width(), frame.height()));
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match learned background {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let mut mask = Mask::zeroed(self.width, self.height);
        let pixels = frame.pixels();
        let out = mask.data_mut();
        for (i, &p) in pixels.iter().enumerate() {
            let px = f32::from(p);
            let diff = (px - self.mean[i]).abs();
            let sigma = self.deviation[i].max(MIN_DEVIATION);
            let score = (diff / (sigma * FOREGROUND_SPAN)).min(1.0);
            out[i] = (score * 255.0) as u8;

            self.mean[i] += LEARNING_RATE * (px - self.mean[i]);
            self.deviation[i] += LEARNING_RATE * (diff - self.deviation[i]);
        }
        Ok(mask)
    }

    fn initialize(&mut self, frame: &Frame) {
        self.width = frame.width();
        self.height = frame.height();
        self.mean = frame.pixels().iter().map(|&p| f32::from(p)).collect();
        self.deviation = vec![MIN_DEVIATION; frame.pixels().len()];
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new()
    }
}
