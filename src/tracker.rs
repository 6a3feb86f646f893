// src/tracker.rs
//
// Centroid-based multi-object tracker. Detections are associated to
// existing tracks with a greedy nearest-neighbor pass over the pairwise
// distance matrix, ordered by each track's best available distance.
//
// Known limitation: the greedy pass is not a globally optimal assignment
// (no Hungarian step), so crossing trajectories can swap identities.
// Accepted for this accuracy target.

use crate::types::{Detection, TrackedObject, TrackerSettings};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Raw centroid observations kept per track for smoothing
const HISTORY_LEN: usize = 5;

#[derive(Debug, Clone)]
struct Track {
    /// Smoothed centroid: truncated per-axis mean of `history`
    centroid: (i32, i32),
    bbox: crate::types::BoundingBox,
    class_id: u32,
    confidence: f32,
    history: VecDeque<(i32, i32)>,
    disappeared: u32,
}

impl Track {
    fn snapshot(&self, id: u32) -> TrackedObject {
        TrackedObject {
            id,
            centroid: self.centroid,
            bbox: self.bbox,
            class_id: self.class_id,
            confidence: self.confidence,
            zones: BTreeSet::new(),
        }
    }

    fn observe(&mut self, raw: (i32, i32)) {
        self.history.push_back(raw);
        if self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }
        let n = self.history.len() as i32;
        let sum_x: i32 = self.history.iter().map(|p| p.0).sum();
        let sum_y: i32 = self.history.iter().map(|p| p.1).sum();
        self.centroid = (sum_x / n, sum_y / n);
    }
}

/// Result of one frame's tracker update.
///
/// `removed` lists the ids deregistered this frame so downstream per-track
/// state (zone dwell) can be dropped in the same step.
#[derive(Debug, Default)]
pub struct TrackerFrame {
    pub objects: Vec<TrackedObject>,
    pub removed: Vec<u32>,
}

pub struct CentroidTracker {
    // BTreeMap keeps id order, which equals registration order since ids
    // are monotonic. The greedy tie-breaks depend on this ordering.
    tracks: BTreeMap<u32, Track>,
    next_id: u32,
    max_disappeared: u32,
    max_distance: f64,
}

impl CentroidTracker {
    pub fn new(settings: &TrackerSettings) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 0,
            max_disappeared: settings.max_disappeared,
            max_distance: settings.max_distance,
        }
    }

    /// Process one frame of detections.
    ///
    /// An empty detection list increments every disappearance counter and
    /// reports no current objects, even for tracks that survive the frame.
    pub fn update(&mut self, detections: &[Detection]) -> TrackerFrame {
        let mut frame = TrackerFrame::default();

        if detections.is_empty() {
            let ids: Vec<u32> = self.tracks.keys().copied().collect();
            for id in ids {
                let track = self.tracks.get_mut(&id).unwrap();
                track.disappeared += 1;
                if track.disappeared > self.max_disappeared {
                    self.deregister(id);
                    frame.removed.push(id);
                }
            }
            return frame;
        }

        let centroids: Vec<(i32, i32)> = detections.iter().map(|d| d.bbox.centroid()).collect();

        let mut current: BTreeSet<u32> = BTreeSet::new();

        if self.tracks.is_empty() {
            for (det, &centroid) in detections.iter().zip(&centroids) {
                current.insert(self.register(centroid, det));
            }
        } else {
            let ids: Vec<u32> = self.tracks.keys().copied().collect();

            // Per existing track: best detection index and its distance
            let mut best: Vec<(usize, f64)> = Vec::with_capacity(ids.len());
            for id in &ids {
                let tc = self.tracks[id].centroid;
                let mut min_col = 0usize;
                let mut min_dist = f64::INFINITY;
                for (col, &dc) in centroids.iter().enumerate() {
                    let dx = (tc.0 - dc.0) as f64;
                    let dy = (tc.1 - dc.1) as f64;
                    let dist = (dx * dx + dy * dy).sqrt();
                    if dist < min_dist {
                        min_dist = dist;
                        min_col = col;
                    }
                }
                best.push((min_col, min_dist));
            }

            // Walk tracks in order of their best available distance. A track
            // whose best detection was already consumed goes unmatched this
            // frame rather than falling back to its second choice.
            let mut order: Vec<usize> = (0..ids.len()).collect();
            order.sort_by(|&a, &b| {
                best[a]
                    .1
                    .partial_cmp(&best[b].1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut used_cols = vec![false; centroids.len()];
            let mut matched_rows = vec![false; ids.len()];

            for row in order {
                let (col, dist) = best[row];
                if used_cols[col] || dist > self.max_distance {
                    continue;
                }
                used_cols[col] = true;
                matched_rows[row] = true;

                let id = ids[row];
                let track = self.tracks.get_mut(&id).unwrap();
                track.observe(centroids[col]);
                track.bbox = detections[col].bbox;
                track.class_id = detections[col].class_id;
                track.disappeared = 0;
                current.insert(id);
            }

            for (row, matched) in matched_rows.iter().enumerate() {
                if *matched {
                    continue;
                }
                let id = ids[row];
                let track = self.tracks.get_mut(&id).unwrap();
                track.disappeared += 1;
                if track.disappeared > self.max_disappeared {
                    self.deregister(id);
                    frame.removed.push(id);
                } else {
                    // Still reported at its last known position
                    current.insert(id);
                }
            }

            for (col, used) in used_cols.iter().enumerate() {
                if !used {
                    current.insert(self.register(centroids[col], &detections[col]));
                }
            }
        }

        frame.objects = current
            .iter()
            .map(|id| self.tracks[id].snapshot(*id))
            .collect();
        frame
    }

    pub fn live_count(&self) -> usize {
        self.tracks.len()
    }

    fn register(&mut self, centroid: (i32, i32), det: &Detection) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let mut history = VecDeque::with_capacity(HISTORY_LEN);
        history.push_back(centroid);

        self.tracks.insert(
            id,
            Track {
                centroid,
                bbox: det.bbox,
                class_id: det.class_id,
                confidence: det.confidence,
                history,
                disappeared: 0,
            },
        );

        debug!(
            "New track {} registered at ({}, {}) class={}",
            id, centroid.0, centroid.1, det.class_id
        );
        id
    }

    fn deregister(&mut self, id: u32) {
        self.tracks.remove(&id);
        debug!("Track {} deregistered", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Detection};

    fn settings(max_disappeared: u32, max_distance: f64) -> TrackerSettings {
        TrackerSettings {
            max_disappeared,
            max_distance,
        }
    }

    fn det_at(cx: i32, cy: i32) -> Detection {
        Detection {
            bbox: BoundingBox {
                x1: cx - 10,
                y1: cy - 10,
                x2: cx + 10,
                y2: cy + 10,
            },
            class_id: 0,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_register_and_follow() {
        let mut tracker = CentroidTracker::new(&settings(3, 50.0));

        let frame = tracker.update(&[det_at(100, 100)]);
        assert_eq!(frame.objects.len(), 1);
        assert_eq!(frame.objects[0].id, 0);
        assert_eq!(frame.objects[0].centroid, (100, 100));

        // Small move keeps the same identity
        let frame = tracker.update(&[det_at(110, 100)]);
        assert_eq!(frame.objects.len(), 1);
        assert_eq!(frame.objects[0].id, 0);
    }

    #[test]
    fn test_id_monotonicity() {
        let mut tracker = CentroidTracker::new(&settings(0, 50.0));

        let frame = tracker.update(&[det_at(100, 100)]);
        assert_eq!(frame.objects[0].id, 0);

        // Evict track 0, then register a fresh object far away
        tracker.update(&[]);
        let frame = tracker.update(&[det_at(500, 500)]);
        assert_eq!(frame.objects[0].id, 1, "ids are never reused");

        let frame = tracker.update(&[det_at(500, 500), det_at(100, 100)]);
        let mut ids: Vec<u32> = frame.objects.iter().map(|o| o.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_disappearance_eviction_boundary() {
        // max_disappeared=3: registered on frame 1, no detections on
        // frames 2-4 keeps the track, frame 5 removes it.
        let mut tracker = CentroidTracker::new(&settings(3, 50.0));

        tracker.update(&[det_at(100, 100)]);
        for _ in 0..3 {
            let frame = tracker.update(&[]);
            assert!(frame.removed.is_empty());
            assert_eq!(tracker.live_count(), 1);
        }

        let frame = tracker.update(&[]);
        assert_eq!(frame.removed, vec![0]);
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn test_empty_frame_reports_no_objects() {
        let mut tracker = CentroidTracker::new(&settings(3, 50.0));
        tracker.update(&[det_at(100, 100)]);

        let frame = tracker.update(&[]);
        assert!(frame.objects.is_empty());
        assert_eq!(tracker.live_count(), 1, "track survives, just unreported");
    }

    #[test]
    fn test_disappearing_track_still_reported_on_nonempty_frames() {
        let mut tracker = CentroidTracker::new(&settings(3, 50.0));
        tracker.update(&[det_at(100, 100), det_at(400, 400)]);

        // One object vanishes; the frame still has detections, so the
        // unmatched track stays in the output at its stale position.
        let frame = tracker.update(&[det_at(100, 100)]);
        assert_eq!(frame.objects.len(), 2);
        let stale = frame.objects.iter().find(|o| o.id == 1).unwrap();
        assert_eq!(stale.centroid, (400, 400));
    }

    #[test]
    fn test_distance_gating_spawns_new_track() {
        let mut tracker = CentroidTracker::new(&settings(3, 50.0));
        tracker.update(&[det_at(100, 100)]);

        // 300px jump exceeds max_distance: old track coasts, new one spawns
        let frame = tracker.update(&[det_at(400, 100)]);
        assert_eq!(frame.objects.len(), 2);
        assert!(frame.objects.iter().any(|o| o.id == 1));
        assert_eq!(tracker.live_count(), 2);
    }

    #[test]
    fn test_smoothed_centroid_truncated_mean() {
        let mut tracker = CentroidTracker::new(&settings(3, 200.0));

        tracker.update(&[det_at(100, 100)]);
        tracker.update(&[det_at(110, 100)]);
        let frame = tracker.update(&[det_at(123, 100)]);

        // mean of 100, 110, 123 = 111 (truncated)
        assert_eq!(frame.objects[0].centroid, ((100 + 110 + 123) / 3, 100));
    }

    #[test]
    fn test_smoothing_window_drops_oldest_after_five() {
        let mut tracker = CentroidTracker::new(&settings(3, 200.0));

        let xs = [100, 110, 120, 130, 140, 150];
        let mut last = None;
        for x in xs {
            last = Some(tracker.update(&[det_at(x, 100)]));
        }

        // Sixth observation evicts 100: mean of 110..=150 step 10 = 130
        let frame = last.unwrap();
        assert_eq!(frame.objects[0].centroid, (130, 100));
    }

    #[test]
    fn test_greedy_prefers_closest_track() {
        let mut tracker = CentroidTracker::new(&settings(3, 100.0));
        tracker.update(&[det_at(100, 100), det_at(200, 100)]);

        // Single detection near track 1: track 0 must not steal it
        let frame = tracker.update(&[det_at(195, 100)]);
        let matched = frame.objects.iter().find(|o| o.centroid.0 > 150).unwrap();
        assert_eq!(matched.id, 1);
    }

    #[test]
    fn test_bbox_and_class_follow_latest_match() {
        let mut tracker = CentroidTracker::new(&settings(3, 100.0));
        tracker.update(&[det_at(100, 100)]);

        let mut det = det_at(120, 100);
        det.class_id = 5;
        let frame = tracker.update(&[det.clone()]);
        assert_eq!(frame.objects[0].class_id, 5);
        assert_eq!(frame.objects[0].bbox, det.bbox);
    }
}
