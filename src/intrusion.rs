// src/intrusion.rs
//
// Debounced per-(track, zone) intrusion state machine. Raw containment
// from the zone store is noisy (tracker jitter, objects grazing a zone
// edge); an ENTRY only fires after sustained containment, and an EXIT
// only fires for a confirmed entry. A graze that never clears the dwell
// threshold produces no event pair at all.
//
// States per (track, zone) pair:
//   ABSENT -> PENDING (first observed inside, timer running)
//          -> CONFIRMED (ENTRY emitted)
//          -> back to PENDING on exit (timer restarted)
//          -> ABSENT when the track is deregistered

use crate::types::{EventKind, IntrusionEvent, IntrusionSettings, TrackedObject};
use crate::zones::ZoneStore;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

#[derive(Debug)]
struct DwellState {
    /// ENTRY emitted and no EXIT yet
    confirmed: bool,
    /// When this pair was first observed unconfirmed. Reset only when an
    /// EXIT is emitted; an unconfirmed pair that leaves and later re-enters
    /// keeps the stale timestamp and can confirm immediately.
    first_observed_ms: f64,
}

pub struct IntrusionMonitor {
    entry_dwell_ms: f64,
    dwell: HashMap<u32, HashMap<String, DwellState>>,
    /// Zone membership committed at the end of each frame. A value
    /// snapshot, never a reference into live track state, so exit
    /// detection always compares against the frame that actually preceded
    /// this one.
    prev_zones: HashMap<u32, BTreeSet<String>>,
}

impl IntrusionMonitor {
    pub fn new(settings: &IntrusionSettings) -> Self {
        Self {
            entry_dwell_ms: settings.entry_dwell_ms,
            dwell: HashMap::new(),
            prev_zones: HashMap::new(),
        }
    }

    /// Advance the state machine by one frame.
    ///
    /// `removed` is the set of track ids the tracker deregistered this
    /// frame; their dwell state is discarded with them, without emitting
    /// exit events. `now_ms` must come from a monotonic clock.
    pub fn process(
        &mut self,
        objects: &mut [TrackedObject],
        removed: &[u32],
        zones: &ZoneStore,
        now_ms: f64,
    ) -> Vec<IntrusionEvent> {
        for id in removed {
            if self.dwell.remove(id).is_some() {
                debug!("Dropped dwell state for removed track {}", id);
            }
            self.prev_zones.remove(id);
        }

        let mut events = Vec::new();

        for obj in objects.iter_mut() {
            let current = zones.contains(obj.centroid);
            obj.zones = current.clone();

            let states = self.dwell.entry(obj.id).or_default();

            for zone in &current {
                let state = states.entry(zone.clone()).or_insert(DwellState {
                    confirmed: false,
                    first_observed_ms: now_ms,
                });
                if !state.confirmed && now_ms - state.first_observed_ms > self.entry_dwell_ms {
                    info!("ENTRY: track {} entered '{}'", obj.id, zone);
                    events.push(IntrusionEvent {
                        kind: EventKind::Entry,
                        track_id: obj.id,
                        zone: zone.clone(),
                        location: obj.centroid,
                        timestamp_ms: now_ms,
                    });
                    state.confirmed = true;
                }
            }

            if let Some(prev) = self.prev_zones.get(&obj.id) {
                for zone in prev.difference(&current) {
                    if let Some(state) = states.get_mut(zone) {
                        if state.confirmed {
                            info!("EXIT: track {} left '{}'", obj.id, zone);
                            events.push(IntrusionEvent {
                                kind: EventKind::Exit,
                                track_id: obj.id,
                                zone: zone.clone(),
                                location: obj.centroid,
                                timestamp_ms: now_ms,
                            });
                            state.confirmed = false;
                            // Fresh debounce window on re-entry
                            state.first_observed_ms = now_ms;
                        }
                    }
                }
            }

            self.prev_zones.insert(obj.id, current);
        }

        events
    }

    /// Number of tracks with live dwell state
    pub fn tracked_count(&self) -> usize {
        self.dwell.len()
    }
}
