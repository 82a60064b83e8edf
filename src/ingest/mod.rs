//! Frame ingestion sources.
//!
//! A `VideoSource` yields grayscale `Frame`s to the capture loop, one fetch
//! per loop iteration. In-tree sources:
//! - `SyntheticTelescopeSource` (`stub://<name>`): deterministic star field
//!   with drifting debris, for demos and soak runs.
//! - `ScriptedSource`: a fixed frame sequence, for tests.
//!
//! Real camera backends are integration points behind the same trait; the
//! tracker itself only ever sees `next_frame`. Only the capture-loop thread
//! may read a source, and a released source must report exhaustion
//! deterministically on any further fetch.

mod scripted;
mod synthetic;

pub use scripted::ScriptedSource;
pub use synthetic::SyntheticTelescopeSource;

use anyhow::{anyhow, Result};

use crate::config::SourceSettings;
use crate::frame::Frame;

/// A stream of raster frames owned by one tracker instance.
pub trait VideoSource: Send {
    fn connect(&mut self) -> Result<()>;

    /// Fetch the next frame. Any error means the source is done (exhausted,
    /// released, or failed); the capture loop treats it as terminal.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the underlying device. Idempotent; later fetches fail.
    fn release(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Snapshot of a source's fetch counters.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Build a source from configuration. `stub://<name>` maps to the synthetic
/// telescope; anything else is an unsupported backend.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn VideoSource>> {
    if settings.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticTelescopeSource::new(settings.clone())));
    }
    Err(anyhow!(
        "unsupported video source {:?}: only stub:// sources are built in",
        settings.url
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> SourceSettings {
        SourceSettings {
            url: url.to_string(),
            target_fps: 0,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn stub_urls_open_synthetic_sources() {
        assert!(open_source(&settings("stub://telescope")).is_ok());
    }

    #[test]
    fn unknown_backends_are_rejected() {
        assert!(open_source(&settings("rtsp://camera-1")).is_err());
        assert!(open_source(&settings("device:0")).is_err());
    }
}
