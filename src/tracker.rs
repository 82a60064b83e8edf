//! Capture loop and tracker lifecycle.
//!
//! `DebrisTracker` owns the detection log and the shared control state, and
//! drives the frame pipeline on a dedicated thread. Lifecycle is strictly
//! Idle -> Running -> Stopped; a stopped tracker is terminal and a fresh
//! instance is required to track again.
//!
//! Concurrency model: exactly two logical threads. The capture loop owns the
//! video source and the frame counter; the controlling thread issues commands
//! that only touch the shared state (atomics + the log's lock). Cancellation
//! is cooperative through the `active` flag, observed with acquire/release
//! ordering at the top of every iteration.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::crypto::FieldCodec;
use crate::detect::{AreaThresholds, DetectionPipeline};
use crate::frame::Frame;
use crate::ingest::VideoSource;
use crate::log::{now_second, DetectionLog, DetectionRecord};
use crate::storage;

/// Visualization collaborator. Fire-and-forget from the loop's point of view:
/// rendering failures must stay inside the implementation.
pub trait Visualizer: Send {
    fn render(&mut self, frame: &Frame, records: &[DetectionRecord]);

    /// Cooperative quit signal (a UI "q", a closed window). Checked once per
    /// iteration after rendering.
    fn quit_requested(&self) -> bool {
        false
    }

    fn release(&mut self) {}
}

/// Visualizer that drops everything on the floor.
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn render(&mut self, _frame: &Frame, _records: &[DetectionRecord]) {}
}

/// Visualizer that narrates detections through the log facade. Stands in for
/// a real overlay window in headless deployments.
pub struct TraceVisualizer;

impl Visualizer for TraceVisualizer {
    fn render(&mut self, _frame: &Frame, records: &[DetectionRecord]) {
        for record in records {
            log::info!(
                "frame {}: {} at ({}, {})",
                record.frame_number,
                record.label,
                record.x,
                record.y
            );
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct TrackerShared {
    active: AtomicBool,
    visualization_enabled: AtomicBool,
    thresholds: Mutex<AreaThresholds>,
}

impl TrackerShared {
    fn thresholds(&self) -> AreaThresholds {
        *self
            .thresholds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Device and collaborator handed back by the loop thread so `stop` can
/// release them only after the loop has fully wound down.
struct LoopResources {
    source: Box<dyn VideoSource>,
    visualizer: Box<dyn Visualizer>,
}

/// Tracker instance: one capture loop, one log, one video device.
pub struct DebrisTracker {
    shared: Arc<TrackerShared>,
    log: Arc<DetectionLog>,
    handle: Option<JoinHandle<LoopResources>>,
    lifecycle: Lifecycle,
}

impl DebrisTracker {
    pub fn new(thresholds: AreaThresholds, visualization_enabled: bool) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                active: AtomicBool::new(false),
                visualization_enabled: AtomicBool::new(visualization_enabled),
                thresholds: Mutex::new(thresholds),
            }),
            log: Arc::new(DetectionLog::new()),
            handle: None,
            lifecycle: Lifecycle::Idle,
        }
    }

    pub fn log(&self) -> &Arc<DetectionLog> {
        &self.log
    }

    /// Idle -> Running: launch the capture loop on its own thread, taking
    /// ownership of the source and the visualization collaborator.
    pub fn start(
        &mut self,
        source: Box<dyn VideoSource>,
        visualizer: Box<dyn Visualizer>,
    ) -> Result<()> {
        if self.lifecycle != Lifecycle::Idle {
            return Err(anyhow!(
                "tracker already started; a fresh instance is required to track again"
            ));
        }
        self.shared.active.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let log = Arc::clone(&self.log);
        let handle = std::thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || run_capture_loop(source, visualizer, shared, log))
            .context("failed to spawn capture loop thread")?;

        self.handle = Some(handle);
        self.lifecycle = Lifecycle::Running;
        log::info!("tracking started");
        Ok(())
    }

    /// Running -> Stopped: clear the active flag, wait for the loop to finish
    /// its in-flight iteration, then release the device and visualization
    /// resources. The join comes first so a device still being read is never
    /// released out from under the loop.
    pub fn stop(&mut self) -> Result<()> {
        if self.lifecycle != Lifecycle::Running {
            return Err(anyhow!("tracker is not running"));
        }
        self.shared.active.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let mut resources = handle
                .join()
                .map_err(|_| anyhow!("capture loop thread panicked"))?;
            resources.source.release();
            resources.visualizer.release();
        }
        self.lifecycle = Lifecycle::Stopped;
        log::info!("tracking stopped after frame {}", self.log.last_frame());
        Ok(())
    }

    /// Whether the capture loop is still running. Turns false on `stop` and
    /// also when the loop terminates on its own (source exhausted).
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn visualization_enabled(&self) -> bool {
        self.shared.visualization_enabled.load(Ordering::Relaxed)
    }

    /// Flip visualization forwarding; returns the new state.
    pub fn toggle_visualization(&self) -> bool {
        let enabled = !self.shared.visualization_enabled.load(Ordering::Relaxed);
        self.shared
            .visualization_enabled
            .store(enabled, Ordering::Relaxed);
        log::info!(
            "visualization {}",
            if enabled { "enabled" } else { "disabled" }
        );
        enabled
    }

    pub fn thresholds(&self) -> AreaThresholds {
        self.shared.thresholds()
    }

    /// Replace the minimum blob area; the loop picks the new interval up on
    /// its next frame.
    pub fn set_min_area(&self, min_area: u32) -> Result<()> {
        let mut guard = self
            .shared
            .thresholds
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *guard = AreaThresholds::new(min_area, guard.max_area())?;
        log::info!("minimum area set to {}", min_area);
        Ok(())
    }

    /// Replace the maximum blob area, validated against the current minimum.
    pub fn set_max_area(&self, max_area: u32) -> Result<()> {
        let mut guard = self
            .shared
            .thresholds
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *guard = AreaThresholds::new(guard.min_area(), max_area)?;
        log::info!("maximum area set to {}", max_area);
        Ok(())
    }

    /// Persist a snapshot of the log. Returns the number of records written.
    pub fn save(&self, path: &Path, codec: &dyn FieldCodec) -> Result<usize> {
        let snapshot = self.log.snapshot();
        storage::save_records(path, &snapshot, codec)?;
        log::info!("saved {} detections to {}", snapshot.len(), path.display());
        Ok(snapshot.len())
    }

    /// Restore the log from disk. The existing log is only replaced after the
    /// whole file decodes cleanly; on any failure it is left untouched.
    pub fn load(&self, path: &Path, codec: &dyn FieldCodec) -> Result<usize> {
        let records = storage::load_records(path, codec)?;
        let count = records.len();
        self.log.replace_all(records);
        log::info!("loaded {} detections from {}", count, path.display());
        Ok(count)
    }
}

fn run_capture_loop(
    mut source: Box<dyn VideoSource>,
    mut visualizer: Box<dyn Visualizer>,
    shared: Arc<TrackerShared>,
    log: Arc<DetectionLog>,
) -> LoopResources {
    let mut pipeline = DetectionPipeline::new();
    let mut frame_number: u64 = 0;

    while shared.active.load(Ordering::Acquire) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame capture failed: {}", e);
                break;
            }
        };
        frame_number += 1;

        let thresholds = shared.thresholds();
        let records = match pipeline.process(&frame, thresholds, frame_number, now_second()) {
            Ok(records) => records,
            Err(e) => {
                // Transient pipeline failure: this frame counts as zero
                // detections and the loop keeps going.
                log::error!("frame {}: processing failed: {}", frame_number, e);
                Vec::new()
            }
        };

        log.append(frame_number, &records);

        if shared.visualization_enabled.load(Ordering::Relaxed) {
            visualizer.render(&frame, &records);
        }
        if visualizer.quit_requested() {
            log::info!("visualizer requested quit");
            break;
        }
    }

    // Terminal path, reached by stop, source exhaustion, or quit request.
    // Publishing inactive here lets the controller observe self-termination.
    // The device itself stays untouched until `stop` joins and releases it.
    shared.active.store(false, Ordering::Release);
    LoopResources { source, visualizer }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_keep_the_interval_valid() {
        let tracker = DebrisTracker::new(AreaThresholds::new(50, 1000).unwrap(), false);
        assert!(tracker.set_min_area(999).is_ok());
        assert!(tracker.set_min_area(1000).is_err());
        assert!(tracker.set_max_area(999).is_err());
        assert!(tracker.set_max_area(2000).is_ok());
        assert_eq!(tracker.thresholds().min_area(), 999);
        assert_eq!(tracker.thresholds().max_area(), 2000);
    }

    #[test]
    fn toggle_flips_visualization() {
        let tracker = DebrisTracker::new(AreaThresholds::new(50, 1000).unwrap(), true);
        assert!(tracker.visualization_enabled());
        assert!(!tracker.toggle_visualization());
        assert!(tracker.toggle_visualization());
    }

    #[test]
    fn stop_before_start_is_an_error() {
        let mut tracker = DebrisTracker::new(AreaThresholds::new(50, 1000).unwrap(), false);
        assert!(tracker.stop().is_err());
    }
}
