use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use debris_tracker::{
    AreaThresholds, DebrisTracker, Frame, NullVisualizer, ScriptedSource, SourceStats, VideoSource,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const BACKGROUND: u8 = 20;

fn uniform_frame() -> Frame {
    Frame::new(
        vec![BACKGROUND; (WIDTH * HEIGHT) as usize],
        WIDTH,
        HEIGHT,
    )
    .unwrap()
}

/// Background frame with one bright 12x10 rectangle at `(x0, y0)`.
fn frame_with_square(x0: u32, y0: u32) -> Frame {
    let mut data = vec![BACKGROUND; (WIDTH * HEIGHT) as usize];
    for y in y0..y0 + 10 {
        for x in x0..x0 + 12 {
            data[y as usize * WIDTH as usize + x as usize] = 220;
        }
    }
    Frame::new(data, WIDTH, HEIGHT).unwrap()
}

fn thresholds() -> AreaThresholds {
    AreaThresholds::new(50, 1000).unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn source_exhaustion_ends_loop_with_frozen_frame_counter() {
    // Four fetches succeed, the fifth fails: the loop must terminate on its
    // own with the counter frozen at 4 and nothing propagating upward.
    let frames = vec![
        uniform_frame(),
        uniform_frame(),
        uniform_frame(),
        uniform_frame(),
    ];
    let mut tracker = DebrisTracker::new(thresholds(), false);
    tracker
        .start(
            Box::new(ScriptedSource::new(frames)),
            Box::new(NullVisualizer),
        )
        .unwrap();

    assert!(wait_until(|| !tracker.is_active()));
    assert_eq!(tracker.log().last_frame(), 4);
    assert!(tracker.log().is_empty());
    assert!(tracker.stop().is_ok());
}

#[test]
fn detections_accumulate_in_order_and_stay_in_bounds() {
    // First frame teaches the background; the moving square produces one
    // detection in each of the following frames.
    let frames = vec![
        uniform_frame(),
        frame_with_square(4, 4),
        frame_with_square(20, 10),
        frame_with_square(36, 20),
        frame_with_square(4, 30),
    ];
    let mut tracker = DebrisTracker::new(thresholds(), false);
    tracker
        .start(
            Box::new(ScriptedSource::new(frames)),
            Box::new(NullVisualizer),
        )
        .unwrap();
    assert!(wait_until(|| !tracker.is_active()));
    tracker.stop().unwrap();

    let snapshot = tracker.log().snapshot();
    assert_eq!(snapshot.len(), 4);

    // Batch totals line up with per-frame counts.
    let counts = tracker.log().counts_per_frame();
    let total: usize = counts.iter().map(|(_, count)| count).sum();
    assert_eq!(total, snapshot.len());
    assert_eq!(
        counts.iter().map(|&(frame, _)| frame).collect::<Vec<_>>(),
        vec![2, 3, 4, 5]
    );

    let mut previous_frame = 0;
    for record in &snapshot {
        assert!(record.x < WIDTH);
        assert!(record.y < HEIGHT);
        assert!(record.frame_number >= previous_frame);
        previous_frame = record.frame_number;
    }
}

#[test]
fn detections_in_one_frame_share_the_frame_number() {
    let mut two_squares = vec![BACKGROUND; (WIDTH * HEIGHT) as usize];
    for (x0, y0) in [(2u32, 2u32), (40, 30)] {
        for y in y0..y0 + 10 {
            for x in x0..x0 + 12 {
                two_squares[y as usize * WIDTH as usize + x as usize] = 220;
            }
        }
    }
    let frames = vec![
        uniform_frame(),
        Frame::new(two_squares, WIDTH, HEIGHT).unwrap(),
    ];

    let mut tracker = DebrisTracker::new(thresholds(), false);
    tracker
        .start(
            Box::new(ScriptedSource::new(frames)),
            Box::new(NullVisualizer),
        )
        .unwrap();
    assert!(wait_until(|| !tracker.is_active()));
    tracker.stop().unwrap();

    let snapshot = tracker.log().snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].frame_number, 2);
    assert_eq!(snapshot[1].frame_number, 2);
}

/// Endless uniform-frame source that records whether it was released.
struct ProbeSource {
    released: Arc<AtomicBool>,
    frames_captured: Arc<AtomicU64>,
}

impl VideoSource for ProbeSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.released.load(Ordering::SeqCst) {
            return Err(anyhow!("source exhausted: device released"));
        }
        self.frames_captured.fetch_add(1, Ordering::SeqCst);
        Ok(uniform_frame())
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn is_healthy(&self) -> bool {
        !self.released.load(Ordering::SeqCst)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured.load(Ordering::SeqCst),
            source: "probe".to_string(),
        }
    }
}

#[test]
fn stop_releases_the_device_and_forbids_restart() {
    let released = Arc::new(AtomicBool::new(false));
    let frames_captured = Arc::new(AtomicU64::new(0));
    let source = ProbeSource {
        released: Arc::clone(&released),
        frames_captured: Arc::clone(&frames_captured),
    };

    let mut tracker = DebrisTracker::new(thresholds(), false);
    tracker
        .start(Box::new(source), Box::new(NullVisualizer))
        .unwrap();
    assert!(wait_until(|| frames_captured.load(Ordering::SeqCst) > 2));

    tracker.stop().unwrap();
    assert!(released.load(Ordering::SeqCst));
    assert!(!tracker.is_active());

    // A consumed instance cannot be restarted.
    let second = ProbeSource {
        released: Arc::new(AtomicBool::new(false)),
        frames_captured: Arc::new(AtomicU64::new(0)),
    };
    assert!(tracker
        .start(Box::new(second), Box::new(NullVisualizer))
        .is_err());
}
