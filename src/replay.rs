// src/replay.rs
//
// Detector collaborator stand-in. The core never talks to a model
// runtime; it consumes per-frame detection records replayed from JSONL
// files, one frame per line:
//
//   {"frame": 17, "detections": [{"bbox": {"x1":..,"y1":..,"x2":..,"y2":..},
//                                 "class_id": 0, "confidence": 0.91}]}

use crate::types::{Detection, DetectionSettings};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub detections: Vec<Detection>,
}

pub fn find_replay_files(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    info!("Found {} replay file(s) in {}", files.len(), input_dir);
    Ok(files)
}

pub fn read_frames(path: &Path) -> Result<Vec<FrameRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading replay file {}", path.display()))?;

    let mut frames = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed frame record", path.display(), line_no + 1))?;
        frames.push(record);
    }
    Ok(frames)
}

/// Output file name for a replay file's events, derived from its path
/// relative to the input directory so files with the same stem in
/// different subdirectories never collide.
pub fn events_file_name(input_dir: &str, path: &Path) -> String {
    let relative = path.strip_prefix(input_dir).unwrap_or(path);
    let flattened = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("_");
    format!("{}_events.jsonl", flattened)
}

/// The same class/confidence gate the detector config applies at the
/// model boundary, so replay files from any detector behave alike.
pub fn filter_detections(detections: &[Detection], settings: &DetectionSettings) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| {
            d.confidence >= settings.confidence
                && (settings.classes.is_empty() || settings.classes.contains(&d.class_id))
        })
        .cloned()
        .collect()
}
