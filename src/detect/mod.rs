//! Frame-processing pipeline.
//!
//! Each captured frame runs through three stages:
//! 1. `BackgroundModel` - adaptive per-pixel estimate of the static scene,
//!    producing a foreground-likelihood mask.
//! 2. `Segmenter` - median noise suppression plus fixed-threshold
//!    binarization.
//! 3. `BlobExtractor` - connected-component search, area gating, and centroid
//!    computation, emitting one `DetectionRecord` per surviving region.
//!
//! The stages are composed by `DetectionPipeline`, which owns the only
//! stateful stage (the background model) for the lifetime of one tracker
//! instance.

mod background;
mod blobs;
mod segment;

pub use background::BackgroundModel;
pub use blobs::{Blob, BlobExtractor};
pub use segment::Segmenter;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;

use crate::frame::Frame;
use crate::log::DetectionRecord;

/// Single-channel mask raster produced by the pipeline stages.
///
/// Intensity semantics depend on the stage: the background model writes
/// foreground likelihood (0..=255), the segmenter writes strictly two-valued
/// output (0 or 255).
#[derive(Clone, Debug)]
pub struct Mask {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Mask {
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        self.data[y as usize * self.width as usize + x as usize] = value;
    }
}

/// Open interval of acceptable blob pixel-area.
///
/// `min_area < max_area`, both positive. A region whose area lands exactly on
/// either bound is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaThresholds {
    min_area: u32,
    max_area: u32,
}

impl AreaThresholds {
    pub fn new(min_area: u32, max_area: u32) -> Result<Self> {
        if min_area == 0 || max_area == 0 {
            return Err(anyhow!("area thresholds must be positive"));
        }
        if min_area >= max_area {
            return Err(anyhow!(
                "min_area ({}) must be strictly below max_area ({})",
                min_area,
                max_area
            ));
        }
        Ok(Self { min_area, max_area })
    }

    pub fn min_area(&self) -> u32 {
        self.min_area
    }

    pub fn max_area(&self) -> u32 {
        self.max_area
    }

    /// Strict open-interval check: `min_area < area < max_area`.
    pub fn accepts(&self, area: u64) -> bool {
        area > u64::from(self.min_area) && area < u64::from(self.max_area)
    }
}

/// Composition of the three pipeline stages for one tracker instance.
pub struct DetectionPipeline {
    background: BackgroundModel,
    segmenter: Segmenter,
    extractor: BlobExtractor,
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self {
            background: BackgroundModel::new(),
            segmenter: Segmenter::new(),
            extractor: BlobExtractor::new(),
        }
    }

    /// Run one frame through background modeling, segmentation, and blob
    /// extraction. Any stage error surfaces here so the capture loop can
    /// treat the frame as "zero detections" and keep going.
    pub fn process(
        &mut self,
        frame: &Frame,
        thresholds: AreaThresholds,
        frame_number: u64,
        now: NaiveDateTime,
    ) -> Result<Vec<DetectionRecord>> {
        let likelihood = self.background.update(frame)?;
        let binary = self.segmenter.clean(&likelihood);
        Ok(self
            .extractor
            .extract(&binary, thresholds, frame_number, now))
    }
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}
