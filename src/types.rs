use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracker: TrackerSettings,
    pub intrusion: IntrusionSettings,
    pub detection: DetectionSettings,
    pub zones: ZoneSettings,
    pub replay: ReplaySettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Frames a track survives without a matching detection before removal
    pub max_disappeared: u32,
    /// Maximum centroid distance (pixels) for matching a detection to a track
    pub max_distance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrusionSettings {
    /// Minimum continuous containment before an ENTRY event fires
    pub entry_dwell_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Class ids accepted from the detector; empty = accept all
    pub classes: Vec<u32>,
    /// Minimum detection confidence to accept
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSettings {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySettings {
    pub input_dir: String,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Axis-aligned box in integer pixel coordinates, x1 < x2 and y1 < y2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Integer midpoint of the box
    pub fn centroid(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

/// One raw detection from the detector collaborator. Not retained past the
/// frame it arrives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub confidence: f32,
}

/// Identity-stable view of one tracked object for the current frame.
///
/// `zones` is empty when the tracker hands the snapshot out; the intrusion
/// monitor fills it with the labels containing the smoothed centroid.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: u32,
    /// Smoothed centroid (truncated mean of the last 5 raw centroids)
    pub centroid: (i32, i32),
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub confidence: f32,
    pub zones: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Entry,
    Exit,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
        }
    }
}

/// A confirmed zone transition, consumed by the event sink collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct IntrusionEvent {
    pub kind: EventKind,
    pub track_id: u32,
    pub zone: String,
    /// Smoothed centroid at the time of emission
    pub location: (i32, i32),
    pub timestamp_ms: f64,
}
