//! Temporal tracker.
//!
//! Keeps one [`TrackedObjectState`] per identity so the engine can tell
//! parked objects from moving ones. The table is owned by exactly one
//! engine instance and must see frames in arrival order.

mod state;

pub use state::TrackedObjectState;

use serde::Serialize;
use std::collections::HashMap;

use crate::config::TrackingSettings;
use crate::detect::DetectedObject;

/// An object eligible for clustering this frame, with its tracking context.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    pub object: DetectedObject,
    pub stationary_frames: u32,
    pub parked_duration_ms: u64,
}

impl Candidate {
    /// Candidate with no tracking context (crowd mode).
    pub fn untracked(object: DetectedObject) -> Self {
        Self {
            object,
            stationary_frames: 0,
            parked_duration_ms: 0,
        }
    }
}

impl AsRef<DetectedObject> for Candidate {
    fn as_ref(&self) -> &DetectedObject {
        &self.object
    }
}

#[derive(Clone, Debug)]
pub struct TrackerTable {
    settings: TrackingSettings,
    states: HashMap<String, TrackedObjectState>,
}

impl TrackerTable {
    pub fn new(settings: TrackingSettings) -> Self {
        Self {
            settings,
            states: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    /// Forget identities not seen for longer than the history timeout.
    /// Returns how many were removed.
    pub fn purge_stale(&mut self, now_ms: u64) -> usize {
        let timeout_ms = self.settings.history_timeout.as_millis() as u64;
        let before = self.states.len();
        self.states
            .retain(|_, state| now_ms.saturating_sub(state.last_seen_ms) <= timeout_ms);
        let removed = before - self.states.len();
        if removed > 0 {
            log::debug!("tracker purged {} stale identities", removed);
        }
        removed
    }

    /// Record a sighting and return the updated state.
    pub fn observe(&mut self, object: &DetectedObject, now_ms: u64) -> &TrackedObjectState {
        let settings = &self.settings;
        let state = self
            .states
            .entry(object.identity.clone())
            .and_modify(|state| {
                let movement = state
                    .last_center()
                    .map(|prev| prev.distance_to(&object.center))
                    .unwrap_or(0.0);
                state.push_center(object.center, settings.history_capacity);
                state.last_seen_ms = now_ms;

                if movement <= settings.stationary_movement_threshold {
                    state.stationary_frames = state.stationary_frames.saturating_add(1);
                } else {
                    state.stationary_frames = 0;
                    state.is_parked = false;
                }
                if state.stationary_frames >= settings.required_stationary_frames {
                    state.is_parked = true;
                }
            })
            .or_insert_with(|| TrackedObjectState::new(&object.identity, object.center, now_ms));
        state
    }

    pub fn get(&self, identity: &str) -> Option<&TrackedObjectState> {
        self.states.get(identity)
    }

    /// Seed or replace the state for an identity.
    pub fn insert_state(&mut self, state: TrackedObjectState) {
        self.states.insert(state.identity.clone(), state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Rect;
    use std::time::Duration;

    fn settings() -> TrackingSettings {
        TrackingSettings {
            stationary_movement_threshold: 10.0,
            required_stationary_frames: 10,
            history_timeout: Duration::from_millis(5000),
            history_capacity: 20,
        }
    }

    fn car_at(id: &str, x: f64, y: f64) -> DetectedObject {
        DetectedObject::new(id, "car", 0.9, Rect::new(x - 20.0, y - 10.0, 40.0, 20.0))
    }

    #[test]
    fn first_sighting_creates_fresh_state() {
        let mut table = TrackerTable::new(settings());
        let state = table.observe(&car_at("a", 100.0, 100.0), 1_000);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.stationary_frames, 0);
        assert!(!state.is_parked);
        assert_eq!(state.first_seen_ms, 1_000);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn parks_exactly_when_required_frames_reached() {
        let mut table = TrackerTable::new(settings());
        table.observe(&car_at("a", 100.0, 100.0), 0);
        for frame in 1..10u64 {
            let state = table.observe(&car_at("a", 100.0 + (frame % 2) as f64, 100.0), frame * 100);
            assert_eq!(state.stationary_frames, frame as u32);
            assert!(!state.is_parked, "parked too early at frame {}", frame);
        }
        let state = table.observe(&car_at("a", 100.0, 100.0), 1_000);
        assert_eq!(state.stationary_frames, 10);
        assert!(state.is_parked);

        // Continued stillness keeps the latch.
        let state = table.observe(&car_at("a", 100.0, 100.0), 1_100);
        assert!(state.is_parked);
        assert_eq!(state.stationary_frames, 11);
    }

    #[test]
    fn movement_resets_streak_and_unparks() {
        let mut table = TrackerTable::new(settings());
        table.observe(&car_at("a", 0.0, 0.0), 0);
        for frame in 1..=9u64 {
            table.observe(&car_at("a", 0.0, 0.0), frame * 100);
        }
        assert_eq!(table.get("a").unwrap().stationary_frames, 9);

        let state = table.observe(&car_at("a", 20.0, 0.0), 1_000);
        assert_eq!(state.stationary_frames, 0);
        assert!(!state.is_parked);

        let mut parked = table.get("a").unwrap().clone();
        parked.stationary_frames = 30;
        parked.is_parked = true;
        table.insert_state(parked);
        let state = table.observe(&car_at("a", 40.0, 0.0), 1_100);
        assert_eq!(state.stationary_frames, 0);
        assert!(!state.is_parked);
    }

    #[test]
    fn movement_equal_to_threshold_counts_as_stationary() {
        let mut table = TrackerTable::new(settings());
        table.observe(&car_at("a", 0.0, 0.0), 0);
        let state = table.observe(&car_at("a", 6.0, 8.0), 100);
        assert_eq!(state.stationary_frames, 1);
    }

    #[test]
    fn history_is_capped() {
        let mut table = TrackerTable::new(TrackingSettings {
            history_capacity: 3,
            ..settings()
        });
        for i in 0..6u64 {
            table.observe(&car_at("a", i as f64, 0.0), i);
        }
        let state = table.get("a").unwrap();
        assert_eq!(state.history.len(), 3);
        assert_eq!(state.history.front().unwrap().x, 3.0);
        assert_eq!(state.last_center().unwrap().x, 5.0);
    }

    #[test]
    fn purge_removes_only_after_timeout() {
        let mut table = TrackerTable::new(settings());
        table.observe(&car_at("a", 0.0, 0.0), 1_000);
        table.observe(&car_at("b", 50.0, 0.0), 3_000);

        assert_eq!(table.purge_stale(6_000), 0);
        assert_eq!(table.purge_stale(6_001), 1);
        assert!(table.get("a").is_none());
        assert!(table.get("b").is_some());
    }

    #[test]
    fn reappearing_after_purge_starts_over() {
        let mut table = TrackerTable::new(settings());
        table.observe(&car_at("a", 0.0, 0.0), 0);
        for frame in 1..=12u64 {
            table.observe(&car_at("a", 0.0, 0.0), frame * 100);
        }
        assert!(table.get("a").unwrap().is_parked);

        table.purge_stale(1_200 + 5_001);
        let state = table.observe(&car_at("a", 0.0, 0.0), 6_300);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.stationary_frames, 0);
        assert!(!state.is_parked);
        assert_eq!(state.first_seen_ms, 6_300);
    }
}
