//! Detection data model.
//!
//! `DetectionRecord` is the immutable value produced once per qualifying blob.
//! `DetectionLog` is the append-only, insertion-ordered accumulation of those
//! records, shared between the capture loop and the controlling thread behind
//! one lock. The lock also publishes the loop's frame counter, so a reader
//! always sees a consistent `(frame_number, records)` pair and never a partial
//! batch.

use chrono::{Local, NaiveDateTime, Timelike};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Fixed classification string stamped on every detection.
pub const DEBRIS_LABEL: &str = "Space Debris";

/// One classified, positioned, timestamped observation of a blob in one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionRecord {
    /// Loop-scoped counter; monotonically non-decreasing across the log.
    pub frame_number: u64,
    /// Always `DEBRIS_LABEL` for this system.
    pub label: String,
    /// Wall-clock capture time, second resolution.
    pub detected_at: NaiveDateTime,
    /// Centroid column, `0 <= x < frame_width`.
    pub x: u32,
    /// Centroid row, `0 <= y < frame_height`.
    pub y: u32,
}

/// Wall-clock "now" truncated to second resolution.
pub fn now_second() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[derive(Default)]
struct LogInner {
    records: Vec<DetectionRecord>,
    last_frame: u64,
}

/// Thread-safe, append-only, insertion-ordered detection log.
///
/// Mutated only by `append` (capture loop) and `replace_all` (load). Readers
/// take consistent snapshots; length only grows during tracking and never
/// shrinks except through an explicit load-replace.
#[derive(Default)]
pub struct DetectionLog {
    inner: Mutex<LogInner>,
}

impl DetectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one frame's batch at the tail, preserving argument order, and
    /// publish the frame counter in the same critical section. An empty batch
    /// still advances the published frame counter.
    pub fn append(&self, frame_number: u64, records: &[DetectionRecord]) {
        let mut inner = self.lock();
        inner.records.extend_from_slice(records);
        inner.last_frame = frame_number;
    }

    /// Consistent copy of the whole log for save/plot/count operations.
    pub fn snapshot(&self) -> Vec<DetectionRecord> {
        self.lock().records.clone()
    }

    /// Atomic full swap; used only by load.
    pub fn replace_all(&self, records: Vec<DetectionRecord>) {
        let mut inner = self.lock();
        inner.last_frame = records.last().map_or(0, |r| r.frame_number);
        inner.records = records;
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Highest frame number published by the capture loop (0 before any
    /// frame). Reads under the log lock, so it is never torn against a
    /// concurrently appended batch.
    pub fn last_frame(&self) -> u64 {
        self.lock().last_frame
    }

    /// Detections per frame number, ascending by frame.
    pub fn counts_per_frame(&self) -> Vec<(u64, usize)> {
        let inner = self.lock();
        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        for record in &inner.records {
            *counts.entry(record.frame_number).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        // A poisoned lock only means a writer panicked mid-batch; the data is
        // still structurally sound, so keep serving it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
