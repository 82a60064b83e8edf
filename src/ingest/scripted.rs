//! Fixed-sequence frame source for tests and demos.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::frame::Frame;
use crate::ingest::{SourceStats, VideoSource};

/// Yields a predetermined frame sequence, then reports exhaustion. Release
/// ends the sequence early; a released or drained source fails every further
/// fetch the same way.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    frames_captured: u64,
    released: bool,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            frames_captured: 0,
            released: false,
        }
    }
}

impl VideoSource for ScriptedSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.released {
            return Err(anyhow!("source exhausted: device released"));
        }
        match self.frames.pop_front() {
            Some(frame) => {
                self.frames_captured += 1;
                Ok(frame)
            }
            None => Err(anyhow!("source exhausted: script finished")),
        }
    }

    fn release(&mut self) {
        self.released = true;
        self.frames.clear();
    }

    fn is_healthy(&self) -> bool {
        !self.released && !self.frames.is_empty()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            source: "scripted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_frame() -> Frame {
        Frame::new(vec![0u8; 16], 4, 4).unwrap()
    }

    #[test]
    fn yields_frames_then_exhausts() {
        let mut src = ScriptedSource::new(vec![blank_frame(), blank_frame()]);
        assert!(src.next_frame().is_ok());
        assert!(src.next_frame().is_ok());
        assert!(src.next_frame().is_err());
        assert_eq!(src.stats().frames_captured, 2);
    }

    #[test]
    fn release_ends_the_sequence() {
        let mut src = ScriptedSource::new(vec![blank_frame(), blank_frame()]);
        src.next_frame().unwrap();
        src.release();
        assert!(src.next_frame().is_err());
    }
}
