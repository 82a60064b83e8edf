//! Connected-component extraction and centroid computation.
//!
//! Scans the binary mask for maximal 8-connected foreground regions via
//! breadth-first search, gates them by pixel area, and reports each survivor
//! as a `DetectionRecord` positioned at its area-weighted centroid. Discovery
//! order is raster-scan order of each region's first pixel; callers must not
//! rely on it.

use chrono::NaiveDateTime;
use std::collections::VecDeque;

use crate::detect::{AreaThresholds, Mask};
use crate::log::{DetectionRecord, DEBRIS_LABEL};

/// Accumulated zeroth and first moments of one connected region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    pub area: u64,
    pub sum_x: u64,
    pub sum_y: u64,
}

impl Blob {
    /// Area-weighted centroid, truncated to integer pixel coordinates.
    /// `None` for a degenerate zero-area region.
    pub fn centroid(&self) -> Option<(u32, u32)> {
        if self.area == 0 {
            return None;
        }
        Some(((self.sum_x / self.area) as u32, (self.sum_y / self.area) as u32))
    }
}

/// Finds foreground regions and turns them into detection records.
pub struct BlobExtractor;

impl BlobExtractor {
    pub fn new() -> Self {
        Self
    }

    /// One record per region whose area falls strictly inside the threshold
    /// interval. `now` and `frame_number` stamp every record from this call.
    pub fn extract(
        &self,
        binary: &Mask,
        thresholds: AreaThresholds,
        frame_number: u64,
        now: NaiveDateTime,
    ) -> Vec<DetectionRecord> {
        let mut records = Vec::new();
        for blob in find_blobs(binary) {
            if !thresholds.accepts(blob.area) {
                continue;
            }
            let Some((x, y)) = blob.centroid() else {
                continue;
            };
            records.push(DetectionRecord {
                frame_number,
                label: DEBRIS_LABEL.to_string(),
                detected_at: now,
                x,
                y,
            });
        }
        records
    }
}

impl Default for BlobExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Maximal 8-connected foreground regions, in raster-scan discovery order.
pub fn find_blobs(binary: &Mask) -> Vec<Blob> {
    let width = binary.width();
    let height = binary.height();
    let mut visited = vec![false; width as usize * height as usize];
    let mut blobs = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * width as usize + x as usize;
            if visited[idx] || binary.get(x, y) == 0 {
                continue;
            }

            let mut blob = Blob::default();
            visited[idx] = true;
            queue.push_back((x, y));
            while let Some((cx, cy)) = queue.pop_front() {
                blob.area += 1;
                blob.sum_x += u64::from(cx);
                blob.sum_y += u64::from(cy);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = cx as i64 + dx;
                        let ny = cy as i64 + dy;
                        if nx < 0 || nx >= width as i64 || ny < 0 || ny >= height as i64 {
                            continue;
                        }
                        let nidx = ny as usize * width as usize + nx as usize;
                        if !visited[nidx] && binary.get(nx as u32, ny as u32) != 0 {
                            visited[nidx] = true;
                            queue.push_back((nx as u32, ny as u32));
                        }
                    }
                }
            }
            blobs.push(blob);
        }
    }
    blobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn mask_with_rect(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> Mask {
        let mut mask = Mask::zeroed(width, height);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.set(x, y, 255);
            }
        }
        mask
    }

    #[test]
    fn centroid_from_first_moments() {
        let blob = Blob {
            area: 120,
            sum_x: 6000,
            sum_y: 3600,
        };
        assert_eq!(blob.centroid(), Some((50, 30)));
    }

    #[test]
    fn zero_area_blob_has_no_centroid() {
        assert_eq!(Blob::default().centroid(), None);
    }

    #[test]
    fn centroid_truncates_toward_zero() {
        let blob = Blob {
            area: 3,
            sum_x: 10,
            sum_y: 8,
        };
        assert_eq!(blob.centroid(), Some((3, 2)));
    }

    #[test]
    fn finds_separate_regions() {
        let mut mask = mask_with_rect(20, 20, 1, 1, 3, 3);
        for y in 10..13 {
            for x in 14..18 {
                mask.set(x, y, 255);
            }
        }
        let blobs = find_blobs(&mask);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].area, 9);
        assert_eq!(blobs[1].area, 12);
    }

    #[test]
    fn diagonal_pixels_join_one_region() {
        let mut mask = Mask::zeroed(4, 4);
        mask.set(0, 0, 255);
        mask.set(1, 1, 255);
        mask.set(2, 2, 255);
        let blobs = find_blobs(&mask);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 3);
    }

    #[test]
    fn area_exactly_at_min_bound_is_excluded() {
        // 5x10 region: area exactly 50.
        let mask = mask_with_rect(30, 30, 5, 5, 5, 10);
        let extractor = BlobExtractor::new();

        let at_bound = AreaThresholds::new(50, 1000).unwrap();
        assert!(extractor
            .extract(&mask, at_bound, 1, test_time())
            .is_empty());

        let below_bound = AreaThresholds::new(49, 1000).unwrap();
        assert_eq!(
            extractor.extract(&mask, below_bound, 1, test_time()).len(),
            1
        );
    }

    #[test]
    fn area_exactly_at_max_bound_is_excluded() {
        // 40x25 region: area exactly 1000.
        let mask = mask_with_rect(60, 40, 2, 2, 40, 25);
        let extractor = BlobExtractor::new();

        let at_bound = AreaThresholds::new(50, 1000).unwrap();
        assert!(extractor
            .extract(&mask, at_bound, 1, test_time())
            .is_empty());

        let above_bound = AreaThresholds::new(50, 1001).unwrap();
        assert_eq!(
            extractor.extract(&mask, above_bound, 1, test_time()).len(),
            1
        );
    }

    #[test]
    fn record_carries_label_frame_and_centroid() {
        // 12x10 region: area 120, centered on (15, 24).
        let mask = mask_with_rect(64, 48, 10, 20, 12, 10);
        let thresholds = AreaThresholds::new(50, 1000).unwrap();
        let records = BlobExtractor::new().extract(&mask, thresholds, 7, test_time());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.frame_number, 7);
        assert_eq!(record.label, DEBRIS_LABEL);
        assert_eq!(record.detected_at, test_time());
        assert_eq!((record.x, record.y), (15, 24));
        assert!(record.x < 64 && record.y < 48);
    }
}
