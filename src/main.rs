// src/main.rs

mod config;
mod intrusion;
mod pipeline;
mod replay;
mod tracker;
mod types;
mod zones;

use anyhow::Result;
use pipeline::FramePipeline;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use types::Config;
use zones::ZoneStore;

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("zone_intrusion={}", config.logging.level))
        .init();

    info!("Zone Intrusion Detection starting");
    info!(
        "Tracker: max_disappeared={}, max_distance={:.0}px | dwell={}ms",
        config.tracker.max_disappeared, config.tracker.max_distance, config.intrusion.entry_dwell_ms
    );

    let mut zone_store = ZoneStore::new();
    zone_store.load(Path::new(&config.zones.path))?;
    if zone_store.zones().is_empty() {
        warn!("No zones configured; no events will be emitted");
    }

    let replay_files = replay::find_replay_files(&config.replay.input_dir)?;
    if replay_files.is_empty() {
        warn!("No replay files found in {}", config.replay.input_dir);
        return Ok(());
    }

    std::fs::create_dir_all(&config.replay.output_dir)?;

    for (idx, path) in replay_files.iter().enumerate() {
        info!(
            "Processing {}/{}: {}",
            idx + 1,
            replay_files.len(),
            path.display()
        );
        match process_replay(path, &config, &zone_store) {
            Ok(()) => info!("Finished {}", path.display()),
            Err(e) => warn!("Failed to process {}: {}", path.display(), e),
        }
    }

    Ok(())
}

fn process_replay(path: &Path, config: &Config, zone_store: &ZoneStore) -> Result<()> {
    let started = Instant::now();
    let frames = replay::read_frames(path)?;

    let mut pipeline = FramePipeline::new(config, zone_store.clone());

    let events_path = Path::new(&config.replay.output_dir)
        .join(replay::events_file_name(&config.replay.input_dir, path));
    let mut events_file = std::fs::File::create(&events_path)?;
    info!("Events will be written to {}", events_path.display());

    for record in &frames {
        if record.frame % 100 == 0 && record.frame > 0 {
            info!(
                "Progress: frame {} | {} entry / {} exit event(s) so far",
                record.frame,
                pipeline.stats().entries,
                pipeline.stats().exits
            );
        }

        let detections = replay::filter_detections(&record.detections, &config.detection);
        for event in pipeline.process_frame(&detections) {
            info!(
                "{} - track {} {} '{}' at ({}, {})",
                event.kind.as_str(),
                event.track_id,
                if event.kind == types::EventKind::Entry {
                    "entered"
                } else {
                    "exited"
                },
                event.zone,
                event.location.0,
                event.location.1
            );
            writeln!(events_file, "{}", serde_json::to_string(&event)?)?;
        }
    }
    events_file.flush()?;

    let stats = pipeline.stats();
    let elapsed = started.elapsed().as_secs_f64();
    info!("Replay report for {}:", path.display());
    info!("  Frames processed: {}", stats.frames);
    info!("  Entry events: {}", stats.entries);
    info!("  Exit events: {}", stats.exits);
    info!("  Peak live tracks: {}", stats.peak_live_tracks);
    info!(
        "  Processing speed: {:.1} FPS",
        stats.frames as f64 / elapsed.max(f64::EPSILON)
    );

    Ok(())
}
