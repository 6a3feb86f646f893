// src/zones.rs
//
// Named polygonal zones with point containment queries and JSON
// persistence. Only label/points/color are persisted; containment works
// directly off the stored vertices.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub label: String,
    /// Ordered polygon vertices, integer pixel coordinates, at least 3
    pub points: Vec<(i32, i32)>,
    /// Opaque display color token, passed through for external rendering
    pub color: String,
}

#[derive(Debug, Default, Clone)]
pub struct ZoneStore {
    zones: Vec<Zone>,
}

impl ZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a zone. Labels are not deduplicated; re-adding a label
    /// produces an independent entry. Degenerate or self-intersecting
    /// polygons are accepted as-is.
    pub fn add_zone(&mut self, label: &str, points: Vec<(i32, i32)>, color: &str) -> Result<()> {
        if points.len() < 3 {
            bail!(
                "zone '{}' needs at least 3 points, got {}",
                label,
                points.len()
            );
        }
        self.zones.push(Zone {
            label: label.to_string(),
            points,
            color: color.to_string(),
        });
        Ok(())
    }

    /// Labels of all zones whose polygon contains the point.
    ///
    /// Containment is boundary-exclusive: a point exactly on a polygon edge
    /// or vertex counts as outside, for every zone, so an object straddling
    /// the shared edge of two adjacent zones is never double-counted.
    pub fn contains(&self, point: (i32, i32)) -> BTreeSet<String> {
        self.zones
            .iter()
            .filter(|z| polygon_contains(&z.points, point))
            .map(|z| z.label.clone())
            .collect()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.zones)?;
        std::fs::write(path, json).with_context(|| format!("writing zones to {}", path.display()))?;
        info!("Saved {} zone(s) to {}", self.zones.len(), path.display());
        Ok(())
    }

    /// Replace the entire zone set from a JSON file. A missing file is a
    /// no-op; a malformed record is an error and leaves the store untouched.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            info!("Zone file {} not found, keeping current set", path.display());
            return Ok(());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading zones from {}", path.display()))?;
        let zones: Vec<Zone> = serde_json::from_str(&contents)
            .with_context(|| format!("parsing zones from {}", path.display()))?;
        for zone in &zones {
            if zone.points.len() < 3 {
                bail!(
                    "zone '{}' in {} has {} points, need at least 3",
                    zone.label,
                    path.display(),
                    zone.points.len()
                );
            }
        }
        info!("Loaded {} zone(s) from {}", zones.len(), path.display());
        self.zones = zones;
        Ok(())
    }
}

/// Even-odd ray casting in pure integer arithmetic. Points on an edge or
/// vertex are reported as outside.
fn polygon_contains(points: &[(i32, i32)], p: (i32, i32)) -> bool {
    let n = points.len();
    let mut inside = false;

    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];

        if on_segment(p, a, b) {
            return false;
        }

        // Half-open vertex rule: each edge covers [min_y, max_y)
        if (a.1 > p.1) != (b.1 > p.1) {
            // Cross-multiplied "p left of the edge at p.y" test, sign
            // flipped for downward edges
            let cross = (b.0 - a.0) as i64 * (p.1 - a.1) as i64
                - (b.1 - a.1) as i64 * (p.0 - a.0) as i64;
            if (b.1 > a.1 && cross > 0) || (b.1 < a.1 && cross < 0) {
                inside = !inside;
            }
        }
    }

    inside
}

fn on_segment(p: (i32, i32), a: (i32, i32), b: (i32, i32)) -> bool {
    let cross =
        (b.0 - a.0) as i64 * (p.1 - a.1) as i64 - (b.1 - a.1) as i64 * (p.0 - a.0) as i64;
    if cross != 0 {
        return false;
    }
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}
