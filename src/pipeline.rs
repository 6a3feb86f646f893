// src/pipeline.rs
//
// Per-frame orchestration: detections -> tracker -> zone queries ->
// intrusion state machine -> events. Strictly frame-synchronous; dwell
// timestamps come from a monotonic clock so system-time adjustments can
// never corrupt debounce timing.

use crate::intrusion::IntrusionMonitor;
use crate::tracker::CentroidTracker;
use crate::types::{Config, Detection, IntrusionEvent};
use crate::zones::ZoneStore;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub frames: u64,
    pub entries: usize,
    pub exits: usize,
    pub peak_live_tracks: usize,
}

pub struct FramePipeline {
    tracker: CentroidTracker,
    monitor: IntrusionMonitor,
    zones: ZoneStore,
    started: Instant,
    stats: PipelineStats,
}

impl FramePipeline {
    pub fn new(config: &Config, zones: ZoneStore) -> Self {
        Self {
            tracker: CentroidTracker::new(&config.tracker),
            monitor: IntrusionMonitor::new(&config.intrusion),
            zones,
            started: Instant::now(),
            stats: PipelineStats::default(),
        }
    }

    /// Process one frame's detections and return the zone transitions it
    /// produced, in emission order.
    pub fn process_frame(&mut self, detections: &[Detection]) -> Vec<IntrusionEvent> {
        let now_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.process_at(detections, now_ms)
    }

    fn process_at(&mut self, detections: &[Detection], now_ms: f64) -> Vec<IntrusionEvent> {
        self.stats.frames += 1;

        let mut frame = self.tracker.update(detections);
        let events =
            self.monitor
                .process(&mut frame.objects, &frame.removed, &self.zones, now_ms);

        self.stats.peak_live_tracks = self.stats.peak_live_tracks.max(self.tracker.live_count());
        for event in &events {
            match event.kind {
                crate::types::EventKind::Entry => self.stats.entries += 1,
                crate::types::EventKind::Exit => self.stats.exits += 1,
            }
        }

        if !events.is_empty() {
            debug!(
                "Frame {}: {} object(s), {} event(s)",
                self.stats.frames,
                frame.objects.len(),
                events.len()
            );
        }

        events
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BoundingBox, DetectionSettings, IntrusionSettings, LoggingConfig, ReplaySettings,
        TrackerSettings, ZoneSettings,
    };

    fn config() -> Config {
        Config {
            tracker: TrackerSettings {
                max_disappeared: 3,
                max_distance: 50.0,
            },
            intrusion: IntrusionSettings {
                entry_dwell_ms: 100.0,
            },
            detection: DetectionSettings {
                classes: vec![],
                confidence: 0.25,
            },
            zones: ZoneSettings {
                path: "zones.json".to_string(),
            },
            replay: ReplaySettings {
                input_dir: "input".to_string(),
                output_dir: "output".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
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

    fn gate_pipeline(cfg: &Config) -> FramePipeline {
        let mut zones = ZoneStore::new();
        zones
            .add_zone("Gate", vec![(0, 0), (200, 0), (200, 200), (0, 200)], "#FF0000")
            .unwrap();
        FramePipeline::new(cfg, zones)
    }

    #[test]
    fn test_full_frame_flow_entry_and_exit() {
        // Wider matching radius so the move outside keeps its identity
        let mut cfg = config();
        cfg.tracker.max_distance = 200.0;
        let mut pipeline = gate_pipeline(&cfg);

        let mut stream = Vec::new();
        for now in [0.0, 40.0, 80.0, 120.0] {
            stream.extend(pipeline.process_at(&[det_at(100, 100)], now));
        }
        assert_eq!(stream.len(), 1);
        assert_eq!(stream[0].kind, crate::types::EventKind::Entry);
        assert_eq!(stream[0].track_id, 0);

        // Smoothed centroid lags behind the raw move; keep stepping until
        // the smoothed position leaves the polygon.
        let mut all = Vec::new();
        let mut now = 160.0;
        while all.is_empty() && now < 600.0 {
            all.extend(pipeline.process_at(&[det_at(230, 100)], now));
            now += 40.0;
        }
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, crate::types::EventKind::Exit);
        assert_eq!(all[0].zone, "Gate");
        assert_eq!(all[0].track_id, 0);
    }

    #[test]
    fn test_eviction_flows_through_to_monitor() {
        let mut pipeline = gate_pipeline(&config());

        for now in [0.0, 40.0, 80.0, 120.0] {
            pipeline.process_at(&[det_at(100, 100)], now);
        }
        assert_eq!(pipeline.stats().entries, 1);

        // max_disappeared=3: four empty frames evict the track; no EXIT
        // is emitted for a track that simply vanished.
        let mut evicted_events = Vec::new();
        for now in [160.0, 200.0, 240.0, 280.0] {
            evicted_events.extend(pipeline.process_at(&[], now));
        }
        assert!(evicted_events.is_empty());
        assert_eq!(pipeline.stats().exits, 0);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut pipeline = gate_pipeline(&config());
        for now in [0.0, 120.0] {
            pipeline.process_at(&[det_at(100, 100), det_at(300, 300)], now);
        }
        let stats = pipeline.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.peak_live_tracks, 2);
    }
}
